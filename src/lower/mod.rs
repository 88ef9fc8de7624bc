// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Lowering from knitout to formal knitout.
//!
//! The pass resolves carrier names to yarn numbers, expands synonyms, walks carriers
//! into place with single-needle misses, splits racking into unit steps, and decays
//! knits and splits on empty needles. Fatal problems stop the pass with a
//! [`FatalError`]; everything else becomes a warning on the result.

pub mod carrier;
pub mod context;
pub mod error;
pub mod header;


pub use carrier::{Carrier, CarrierState, CarrierTable, Location};
pub use context::{Lowered, LoweringContext};
pub use error::{FatalError, LowerError};
pub use header::{parse_header, HeaderBlock, Headers};

use std::sync::Arc;

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, RunError, RunReport};
use crate::core::instruction::{Operation, YarnLength};
use crate::core::needle::{parse_signed_digits, Bed, Direction, Needle};

/// Stitch size written on every knit, tuck and split.
pub const STITCH_SIZE: f64 = 30.0;

/// Needle width used when measuring yarn between loops.
const NEEDLE_WIDTH: f64 = 0.0;

/// Largest needle index magnitude the pass accepts.
pub const MAX_NEEDLE_INDEX: i64 = 1_000_000;

/// Largest racking magnitude the pass accepts.
pub const MAX_RACK: i64 = 10_000;

/// A fatal error plus the warnings raised before it.
#[derive(Debug, Clone, PartialEq)]
pub struct LowerFailure {
    pub error: FatalError,
    pub warnings: Vec<Diagnostic>,
}

impl LowerFailure {
    /// Warnings in order, then the fatal diagnostic.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.warnings.clone();
        diagnostics.push(self.error.to_diagnostic());
        diagnostics
    }

    pub fn into_run_error(self, source_lines: impl Into<Arc<Vec<String>>>) -> RunError {
        let diagnostics = self.diagnostics();
        RunError::new(self.error.to_diagnostic(), diagnostics, source_lines)
    }
}

impl Lowered {
    pub fn into_run_report(self, source_lines: impl Into<Arc<Vec<String>>>) -> RunReport {
        RunReport::new(self.warnings, source_lines)
    }
}

/// Lowers a complete knitout file: magic line, header block, then operations.
pub fn lower(source: &str) -> Result<Lowered, LowerFailure> {
    let lines: Vec<&str> = source.lines().collect();
    let block = parse_header(&lines).map_err(|error| LowerFailure {
        error,
        warnings: Vec::new(),
    })?;

    let mut warnings = block.warnings;
    match lower_with_headers(block.headers, &lines[block.body_start..], block.body_start + 1) {
        Ok(mut lowered) => {
            warnings.append(&mut lowered.warnings);
            lowered.warnings = warnings;
            Ok(lowered)
        }
        Err(mut failure) => {
            warnings.append(&mut failure.warnings);
            failure.warnings = warnings;
            Err(failure)
        }
    }
}

/// Lowers operation lines under already-parsed `headers`.
///
/// `first_line` is the 1-based source line number of `lines[0]`.
pub fn lower_with_headers<S: AsRef<str>>(
    headers: Headers,
    lines: &[S],
    first_line: usize,
) -> Result<Lowered, LowerFailure> {
    let mut ctx = LoweringContext::new(headers).map_err(|error| LowerFailure {
        error: FatalError::new(first_line.saturating_sub(1), error),
        warnings: Vec::new(),
    })?;

    for (offset, line) in lines.iter().enumerate() {
        let line_number = first_line + offset;
        if let Err(error) = lower_line(&mut ctx, line.as_ref(), line_number) {
            tracing::debug!(line = line_number, %error, "lowering stopped");
            return Err(LowerFailure {
                error: FatalError::new(line_number, error),
                warnings: ctx.warnings().to_vec(),
            });
        }
    }
    Ok(ctx.finish())
}

fn lower_line(ctx: &mut LoweringContext, original: &str, line: usize) -> Result<(), LowerError> {
    ctx.begin_line(line, original);

    let (code, has_comment) = match original.find(';') {
        Some(idx) => (&original[..idx], true),
        None => (original, false),
    };
    let mut tokens = code.split_whitespace();
    let Some(op) = tokens.next() else {
        if has_comment {
            ctx.emit("");
        }
        return Ok(());
    };
    let args: Vec<&str> = tokens.collect();

    match op {
        "in" | "inhook" => bring_in(ctx, &args),
        "out" | "outhook" => bring_out(ctx, &args),
        "releasehook" | "pause" => Ok(()),
        "rack" => rack(ctx, &args),
        "stitch" => stitch(&args),
        "x-stitch-number" => stitch_number(&args),
        "x-presser-mode" | "x-speed-number" => {
            tracing::debug!(line, op, "machine setting ignored");
            Ok(())
        }
        "miss" => lower_loop_op(ctx, read_request(op, SourceOp::Miss, None, &args)?, None),
        "tuck" => lower_loop_op(ctx, read_request(op, SourceOp::Tuck, None, &args)?, None),
        "knit" => lower_loop_op(ctx, read_request(op, SourceOp::Knit, None, &args)?, None),
        "split" => lower_loop_op(ctx, read_request(op, SourceOp::Split, None, &args)?, None),
        "amiss" | "drop" | "xfer" => {
            let source = match op {
                "amiss" => SourceOp::Tuck,
                "drop" => SourceOp::Knit,
                _ => SourceOp::Split,
            };
            let request = read_request(op, source, Some(Direction::Increasing), &args)?;
            lower_loop_op(ctx, request, Some(op))
        }
        _ if op.starts_with("x-") => {
            ctx.warn(
                DiagnosticKind::Extension,
                format!("unsupported extension operation '{op}'."),
            );
            Ok(())
        }
        _ => Err(LowerError::UnsupportedOperation(op.to_string())),
    }
}

fn bring_in(ctx: &mut LoweringContext, names: &[&str]) -> Result<(), LowerError> {
    if names.is_empty() {
        return Err(LowerError::NoCarriers("in"));
    }
    for name in names {
        let idx = carrier_index(ctx, name)?;
        match ctx.carriers.get(idx).state {
            CarrierState::Active { .. } => return Err(LowerError::AlreadyIn(name.to_string())),
            CarrierState::Pending { .. } => {
                return Err(LowerError::AlreadyPending(name.to_string()));
            }
            CarrierState::Absent => {
                let slot = ctx.emit_pending_in(idx);
                ctx.carriers.get_mut(idx).state = CarrierState::Pending { slot };
            }
        }
    }
    Ok(())
}

fn bring_out(ctx: &mut LoweringContext, names: &[&str]) -> Result<(), LowerError> {
    if names.is_empty() {
        return Err(LowerError::NoCarriers("out"));
    }
    for name in names {
        let idx = carrier_index(ctx, name)?;
        let carrier = ctx.carriers.get(idx);
        match carrier.state {
            CarrierState::Active { parked, .. } => {
                // one needle past the feeder, facing back toward it, on the front bed
                let column = parked.needle.column(ctx.racking) + parked.direction.step();
                let out = Operation::Out {
                    direction: parked.direction.opposite(),
                    needle: Needle::front(column),
                    yarn: carrier.yarn,
                };
                ctx.emit(out.to_string());
                ctx.carriers.get_mut(idx).state = CarrierState::Absent;
            }
            CarrierState::Pending { .. } => return Err(LowerError::OutPending(name.to_string())),
            CarrierState::Absent => return Err(LowerError::OutAbsent(name.to_string())),
        }
    }
    Ok(())
}

fn carrier_index(ctx: &LoweringContext, name: &str) -> Result<usize, LowerError> {
    ctx.carriers
        .index_of(name)
        .ok_or_else(|| LowerError::UnknownCarrier(name.to_string()))
}

fn rack(ctx: &mut LoweringContext, args: &[&str]) -> Result<(), LowerError> {
    let [value] = args else {
        return Err(LowerError::RackArity);
    };
    let target = parse_rack(value)?;
    if target == ctx.racking {
        ctx.emit("; (rack not needed)");
        return Ok(());
    }
    while ctx.racking != target {
        park_on_front_bed(ctx);
        ctx.racking += (target - ctx.racking).signum();
        ctx.emit(Operation::Rack { rack: ctx.racking }.to_string());
    }
    Ok(())
}

/// Re-expresses back-bed parking spots on the front bed before the beds move.
///
/// A feeder stays put when the back bed racks, so its column must not shift with it.
fn park_on_front_bed(ctx: &mut LoweringContext) {
    let rack = ctx.racking;
    for carrier in ctx.carriers.iter_mut() {
        if let CarrierState::Active { parked, .. } = &mut carrier.state {
            if parked.needle.bed == Bed::Back {
                parked.needle = Needle::front(parked.needle.column(rack));
            }
        }
    }
}

/// Accepts `[+-]?\d*\.?\d+`; only whole numbers can be lowered.
fn parse_rack(token: &str) -> Result<i64, LowerError> {
    let not_number = || LowerError::RackNotNumber(token.to_string());
    let unsigned = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (int, frac) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => ("", unsigned),
    };
    let digits = |text: &str| text.bytes().all(|b| b.is_ascii_digit());
    if frac.is_empty() || !digits(int) || !digits(frac) {
        return Err(not_number());
    }
    let value: f64 = token.parse().map_err(|_| not_number())?;
    if value.fract() != 0.0 {
        return Err(LowerError::FractionalRack);
    }
    if value.abs() > MAX_RACK as f64 {
        return Err(LowerError::RackOutOfRange(token.to_string()));
    }
    Ok(value as i64)
}

fn is_integer(token: &str, allow_minus: bool) -> bool {
    let unsigned = match token.strip_prefix('+') {
        Some(rest) => rest,
        None if allow_minus => token.strip_prefix('-').unwrap_or(token),
        None => token,
    };
    !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit())
}

fn stitch(args: &[&str]) -> Result<(), LowerError> {
    let [leading, size] = args else {
        return Err(LowerError::BadStitch);
    };
    if !is_integer(leading, true) || !is_integer(size, true) {
        return Err(LowerError::BadStitch);
    }
    tracing::debug!(leading, size, "stitch setting parsed; stitch size stays {STITCH_SIZE}");
    Ok(())
}

fn stitch_number(args: &[&str]) -> Result<(), LowerError> {
    let [number] = args else {
        return Err(LowerError::BadStitchNumber);
    };
    if !is_integer(number, false) {
        return Err(LowerError::BadStitchNumber);
    }
    tracing::debug!(number, "stitch number parsed; stitch size stays {STITCH_SIZE}");
    Ok(())
}

/// Operations that form or move loops, after synonym expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceOp {
    Miss,
    Tuck,
    Knit,
    Split,
}

#[derive(Debug)]
struct Request<'a> {
    op: SourceOp,
    direction: Direction,
    needle: Needle,
    target: Option<Needle>,
    carriers: Vec<&'a str>,
}

/// Reads `[direction] needle [target] carriers...`; synonyms supply `implied` direction.
fn read_request<'a>(
    name: &str,
    op: SourceOp,
    implied: Option<Direction>,
    args: &[&'a str],
) -> Result<Request<'a>, LowerError> {
    let op_name = match op {
        SourceOp::Miss => "miss",
        SourceOp::Tuck => "tuck",
        SourceOp::Knit => "knit",
        SourceOp::Split => "split",
    };
    let missing = |expected| LowerError::MissingArgument {
        op: op_name,
        expected,
    };
    let mut args = args.iter().copied();

    let direction = match implied {
        Some(direction) => direction,
        None => {
            let token = args.next().ok_or_else(|| missing("direction"))?;
            Direction::parse(token).ok_or_else(|| LowerError::BadDirection(token.to_string()))?
        }
    };
    let needle = source_needle(args.next().ok_or_else(|| missing("needle"))?)?;
    let target = match op {
        SourceOp::Split => Some(source_needle(
            args.next().ok_or_else(|| missing("target needle"))?,
        )?),
        _ => None,
    };
    tracing::trace!(name, ?op, %direction, %needle, "read loop operation");
    Ok(Request {
        op,
        direction,
        needle,
        target,
        carriers: args.collect(),
    })
}

/// Parses a knitout needle `[fb]s?-?\d+`; slider needles and huge indices are rejected.
fn source_needle(token: &str) -> Result<Needle, LowerError> {
    let bad = || LowerError::BadNeedle(token.to_string());
    let (bed, rest) = if let Some(rest) = token.strip_prefix('f') {
        (Bed::Front, rest)
    } else if let Some(rest) = token.strip_prefix('b') {
        (Bed::Back, rest)
    } else {
        return Err(bad());
    };
    let (slider, digits) = match rest.strip_prefix('s') {
        Some(digits) => (true, digits),
        None => (false, rest),
    };
    let index = parse_signed_digits(digits).ok_or_else(bad)?;
    if slider {
        return Err(LowerError::Slider(token.to_string()));
    }
    if !(-MAX_NEEDLE_INDEX..=MAX_NEEDLE_INDEX).contains(&index) {
        return Err(LowerError::NeedleOutOfRange(token.to_string()));
    }
    Ok(Needle::new(bed, index))
}

/// What a loop operation becomes once loop occupancy is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emitted {
    Miss,
    Tuck,
    Knit,
    Split,
    /// A drop of a needle with no loops.
    EmptyDrop,
}

fn lower_loop_op(
    ctx: &mut LoweringContext,
    request: Request<'_>,
    synonym: Option<&str>,
) -> Result<(), LowerError> {
    let Request {
        op,
        direction,
        needle,
        target,
        carriers,
    } = request;

    if let Some(synonym) = synonym.filter(|_| !carriers.is_empty()) {
        return Err(LowerError::CarriersNotAllowed(synonym.to_string()));
    }
    if op == SourceOp::Miss && carriers.is_empty() {
        return Err(LowerError::MissWithoutCarriers);
    }
    let carriers = ctx.carriers.resolve(&carriers)?;

    let has_loops = ctx.loops.contains_key(&needle);
    let emitted = match op {
        SourceOp::Miss => Emitted::Miss,
        SourceOp::Tuck => Emitted::Tuck,
        SourceOp::Knit if has_loops => Emitted::Knit,
        SourceOp::Knit if carriers.is_empty() => Emitted::EmptyDrop,
        SourceOp::Split if has_loops || carriers.is_empty() => Emitted::Split,
        SourceOp::Knit | SourceOp::Split => {
            tracing::debug!(line = ctx.line(), %needle, "no loops to work, tucking instead");
            Emitted::Tuck
        }
    };
    if emitted == Emitted::Tuck && carriers.len() > 1 {
        return Err(LowerError::MultiCarrierTuck(carriers.len()));
    }
    if let (Emitted::Split, Some(target)) = (emitted, target) {
        check_aligned(needle, target, ctx.racking)?;
    }

    let before = Location::new(Needle::new(needle.bed, needle.index - direction.step()), direction);
    for &idx in &carriers {
        position_carrier(ctx, idx, before)?;
    }

    let rack = ctx.racking;
    let yarns: Vec<YarnLength> = carriers
        .iter()
        .map(|&idx| {
            let carrier = ctx.carriers.get(idx);
            let length = match carrier.state {
                CarrierState::Active { attached, .. } => {
                    yarn_length(needle, direction, attached, rack)
                }
                _ => 0.0,
            };
            YarnLength::new(carrier.yarn, length)
        })
        .collect();

    match emitted {
        Emitted::Miss => {
            for yarn in &yarns {
                let miss = Operation::Miss {
                    direction,
                    needle,
                    yarn: yarn.yarn,
                };
                ctx.emit(miss.to_string());
            }
        }
        Emitted::Tuck if yarns.is_empty() => ctx.emit("; amiss ignored"),
        Emitted::Tuck => {
            let count = yarns.len() as u32;
            let tuck = Operation::Tuck {
                direction,
                needle,
                length: STITCH_SIZE,
                yarns,
            };
            ctx.emit(tuck.to_string());
            ctx.loops
                .entry(needle)
                .and_modify(|loops| *loops += 1)
                .or_insert(count);
        }
        Emitted::EmptyDrop => ctx.emit("; drop of empty needle ignored"),
        Emitted::Knit if yarns.is_empty() => {
            ctx.emit(Operation::Drop { needle }.to_string());
            ctx.loops.remove(&needle);
        }
        Emitted::Knit => {
            let count = yarns.len() as u32;
            let knit = Operation::Knit {
                direction,
                needle,
                length: STITCH_SIZE,
                yarns,
            };
            ctx.emit(knit.to_string());
            ctx.loops.insert(needle, count);
        }
        Emitted::Split => {
            let Some(target) = target else {
                return Err(LowerError::MissingArgument {
                    op: "split",
                    expected: "target needle",
                });
            };
            let count = yarns.len() as u32;
            let text = if yarns.is_empty() {
                Operation::Xfer { needle, target }.to_string()
            } else {
                Operation::Split {
                    direction,
                    needle,
                    target,
                    length: STITCH_SIZE,
                    yarns,
                }
                .to_string()
            };
            ctx.emit(text);
            if let Some(moved) = ctx.loops.remove(&needle) {
                *ctx.loops.entry(target).or_insert(0) += moved;
            }
            if count > 0 {
                ctx.loops.insert(needle, count);
            }
            retarget_carriers(ctx, needle, target);
        }
    }

    let here = Location::new(needle, direction);
    for &idx in &carriers {
        let state = &mut ctx.carriers.get_mut(idx).state;
        *state = match (*state, emitted) {
            (CarrierState::Active { attached, .. }, Emitted::Miss) => CarrierState::Active {
                parked: here,
                attached,
            },
            _ => CarrierState::Active {
                parked: here,
                attached: here,
            },
        };
    }
    Ok(())
}

/// Moves carrier `idx` to `before`, backpatching its `in` if it has not been used yet.
fn position_carrier(ctx: &mut LoweringContext, idx: usize, before: Location) -> Result<(), LowerError> {
    let rack = ctx.racking;
    let carrier = ctx.carriers.get(idx);
    let yarn = carrier.yarn;
    match carrier.state {
        CarrierState::Absent => Err(LowerError::CarrierNotIn(carrier.name.clone())),
        CarrierState::Pending { slot } => {
            let bring_in = Operation::In {
                direction: before.direction,
                needle: Needle::front(before.needle.column(rack)),
                yarn,
            };
            tracing::debug!(line = ctx.line(), yarn, "backpatched '{bring_in}'");
            ctx.resolve_slot(slot, bring_in.to_string());
            ctx.carriers.get_mut(idx).state = CarrierState::Active {
                parked: before,
                attached: before,
            };
            Ok(())
        }
        CarrierState::Active {
            mut parked,
            attached,
        } => {
            let target = before.column(rack);
            let mut heading: Option<Direction> = None;
            loop {
                let step = match parked.column(rack).cmp(&target) {
                    std::cmp::Ordering::Equal => break,
                    std::cmp::Ordering::Less => Direction::Increasing,
                    std::cmp::Ordering::Greater => Direction::Decreasing,
                };
                debug_assert!(
                    heading.is_none_or(|previous| previous == step),
                    "carrier walk reversed"
                );
                heading = Some(step);
                if parked.direction == step {
                    parked.needle.index += step.step();
                } else {
                    parked.direction = step;
                }
                let miss = Operation::Miss {
                    direction: step,
                    needle: parked.needle,
                    yarn,
                };
                ctx.emit(miss.to_string());
            }
            ctx.carriers.get_mut(idx).state = CarrierState::Active { parked, attached };
            Ok(())
        }
    }
}

/// Loops only move between opposite needles that share a column.
fn check_aligned(needle: Needle, target: Needle, rack: i64) -> Result<(), LowerError> {
    if needle.bed == target.bed {
        return Err(LowerError::TransferSameBed { needle, target });
    }
    if needle.column(rack) != target.column(rack) {
        return Err(LowerError::TransferMisaligned {
            needle,
            target,
            rack,
        });
    }
    Ok(())
}

/// Follows loops moved from `from` to `to` for every carrier in action.
fn retarget_carriers(ctx: &mut LoweringContext, from: Needle, to: Needle) {
    for carrier in ctx.carriers.iter_mut() {
        if let CarrierState::Active { parked, attached } = &mut carrier.state {
            if attached.needle == from {
                attached.needle = to;
            }
            if parked.needle == from {
                parked.needle = to;
            }
        }
    }
}

fn yarn_length(needle: Needle, direction: Direction, attached: Location, rack: i64) -> f64 {
    let here = needle.column(rack) as f64 - NEEDLE_WIDTH * direction.step() as f64;
    let there = attached.needle.column(rack) as f64 + NEEDLE_WIDTH * attached.direction.step() as f64;
    (here - there).abs()
}
