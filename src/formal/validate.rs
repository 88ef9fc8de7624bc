// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Replays formal knitout against a simulated machine.
//!
//! Each instruction is checked against a copy of the last good state. Success appends
//! the copy to the trace; failure records an [`InstructionError`] and leaves the trace
//! untouched, so the next instruction sees the same state the failed one did.

use thiserror::Error;

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::core::instruction::{Instruction, Operation, YarnId, YarnLength};
use crate::core::needle::{Direction, Needle};

use super::state::{Attachment, MachineState};

/// A physical rule broken by one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Using yarn {0}, but it is not in action.")]
    YarnNotInAction(YarnId),
    #[error("Expected yarn {yarn} at {expected}, but it is at {actual}.")]
    YarnMisplaced {
        yarn: YarnId,
        expected: i64,
        actual: i64,
    },
    #[error("Needle '{needle}' and target '{target}' are not on opposite beds.")]
    SameBed { needle: Needle, target: Needle },
    #[error("Needle '{needle}' and target '{target}' are not aligned at racking {rack}.")]
    Misaligned {
        needle: Needle,
        target: Needle,
        rack: i64,
    },
    #[error("Can't drop {0} because it contains no loops.")]
    DropEmpty(Needle),
    #[error("Change in racking isn't by +/-1 -- from {from} to {to}.")]
    RackStep { from: i64, to: i64 },
    #[error("Can't bring in yarn {0} because it is already in.")]
    AlreadyIn(YarnId),
    #[error("Needle '{needle}' is out of range at racking {rack}.")]
    OutOfRange { needle: Needle, rack: i64 },
}

/// A validation failure at one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionError {
    /// Index into the validated instruction slice.
    pub instruction: usize,
    /// Source line of that instruction.
    pub line: usize,
    pub error: ValidationError,
}

impl InstructionError {
    pub fn to_diagnostic(&self, instruction: Option<&Instruction>) -> Diagnostic {
        let diag = Diagnostic::new(
            self.line,
            Severity::Error,
            DiagnosticKind::Validation,
            self.error.to_string(),
        );
        match instruction {
            Some(inst) => diag.with_note(format!("instruction {}: {}", self.instruction, inst.op)),
            None => diag.with_note(format!("instruction {}", self.instruction)),
        }
    }
}

/// Machine states and failures produced by [`validate`].
///
/// `trace[0]` is the empty machine; `trace[i + 1]` follows the i-th instruction that
/// validated successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub trace: Vec<MachineState>,
    pub errors: Vec<InstructionError>,
}

impl Validation {
    pub fn final_state(&self) -> &MachineState {
        // trace always starts with the initial state
        &self.trace[self.trace.len() - 1]
    }
}

pub fn validate(instructions: &[Instruction]) -> Validation {
    let mut trace = vec![MachineState::new()];
    let mut errors = Vec::new();

    for (idx, instruction) in instructions.iter().enumerate() {
        let mut state = trace[trace.len() - 1].clone();
        match apply(&mut state, &instruction.op) {
            Ok(()) => trace.push(state),
            Err(error) => {
                tracing::debug!(index = idx, line = instruction.line, %error, "instruction rejected");
                errors.push(InstructionError {
                    instruction: idx,
                    line: instruction.line,
                    error,
                });
            }
        }
    }

    tracing::debug!(
        states = trace.len(),
        errors = errors.len(),
        "validated formal knitout"
    );
    Validation { trace, errors }
}

/// Applies one operation to `state`, which the caller discards on error.
pub fn apply(state: &mut MachineState, op: &Operation) -> Result<(), ValidationError> {
    match op {
        Operation::Tuck {
            direction,
            needle,
            yarns,
            ..
        } => {
            check_carriers(state, *needle, *direction, yarn_ids(yarns))?;
            if !yarns.is_empty() {
                state
                    .loops
                    .entry(*needle)
                    .and_modify(|count| *count += 1)
                    .or_insert(yarns.len() as u32);
            }
            set_attachments(state, *needle, *direction, yarns);
            move_carriers(state, *needle, *direction, yarn_ids(yarns))?;
        }
        Operation::Knit {
            direction,
            needle,
            yarns,
            ..
        } => {
            check_carriers(state, *needle, *direction, yarn_ids(yarns))?;
            state.loops.remove(needle);
            if !yarns.is_empty() {
                state.loops.insert(*needle, yarns.len() as u32);
            }
            set_attachments(state, *needle, *direction, yarns);
            move_carriers(state, *needle, *direction, yarn_ids(yarns))?;
        }
        Operation::Split {
            direction,
            needle,
            target,
            yarns,
            ..
        } => {
            check_aligned(state, *needle, *target)?;
            check_carriers(state, *needle, *direction, yarn_ids(yarns))?;
            state.move_loops(*needle, *target);
            if !yarns.is_empty() {
                state.loops.insert(*needle, yarns.len() as u32);
            }
            state.move_attachments(*needle, *target);
            set_attachments(state, *needle, *direction, yarns);
            move_carriers(state, *needle, *direction, yarn_ids(yarns))?;
        }
        Operation::Miss {
            direction,
            needle,
            yarn,
        } => {
            check_carriers(state, *needle, *direction, [*yarn])?;
            move_carriers(state, *needle, *direction, [*yarn])?;
        }
        Operation::In {
            direction,
            needle,
            yarn,
        } => {
            if state.carriers.contains_key(yarn) {
                return Err(ValidationError::AlreadyIn(*yarn));
            }
            move_carriers(state, *needle, *direction, [*yarn])?;
        }
        Operation::Out {
            direction,
            needle,
            yarn,
        } => {
            // out expects the carrier on the far side, not the approach side
            let expected = state.physical_pos(*needle, *direction)?;
            check_carrier_at(state, *yarn, expected)?;
            state.carriers.remove(yarn);
            state.attachments.remove(yarn);
        }
        Operation::Drop { needle } => {
            if state.loop_count(*needle) == 0 {
                return Err(ValidationError::DropEmpty(*needle));
            }
            state.loops.remove(needle);
        }
        Operation::Xfer { needle, target } => {
            check_aligned(state, *needle, *target)?;
            state.move_loops(*needle, *target);
            state.move_attachments(*needle, *target);
        }
        Operation::Rack { rack } => {
            if state.rack.abs_diff(*rack) != 1 {
                return Err(ValidationError::RackStep {
                    from: state.rack,
                    to: *rack,
                });
            }
            state.rack = *rack;
        }
    }
    Ok(())
}

fn yarn_ids(yarns: &[YarnLength]) -> impl Iterator<Item = YarnId> + '_ {
    yarns.iter().map(|ys| ys.yarn)
}

/// Carriers must sit on the approach side of `needle` for travel in `direction`.
fn check_carriers(
    state: &MachineState,
    needle: Needle,
    direction: Direction,
    yarns: impl IntoIterator<Item = YarnId>,
) -> Result<(), ValidationError> {
    let expected = state.physical_pos(needle, direction.opposite())?;
    for yarn in yarns {
        check_carrier_at(state, yarn, expected)?;
    }
    Ok(())
}

fn check_carrier_at(state: &MachineState, yarn: YarnId, expected: i64) -> Result<(), ValidationError> {
    match state.carriers.get(&yarn) {
        None => Err(ValidationError::YarnNotInAction(yarn)),
        Some(&actual) if actual != expected => Err(ValidationError::YarnMisplaced {
            yarn,
            expected,
            actual,
        }),
        Some(_) => Ok(()),
    }
}

fn check_aligned(state: &MachineState, needle: Needle, target: Needle) -> Result<(), ValidationError> {
    if needle.bed == target.bed {
        return Err(ValidationError::SameBed { needle, target });
    }
    if state.physical_pos(needle, Direction::Decreasing)?
        != state.physical_pos(target, Direction::Decreasing)?
    {
        return Err(ValidationError::Misaligned {
            needle,
            target,
            rack: state.rack,
        });
    }
    Ok(())
}

fn set_attachments(state: &mut MachineState, needle: Needle, direction: Direction, yarns: &[YarnLength]) {
    for ys in yarns {
        state
            .attachments
            .insert(ys.yarn, Attachment { needle, direction });
    }
}

fn move_carriers(
    state: &mut MachineState,
    needle: Needle,
    direction: Direction,
    yarns: impl IntoIterator<Item = YarnId>,
) -> Result<(), ValidationError> {
    let at = state.physical_pos(needle, direction)?;
    for yarn in yarns {
        state.carriers.insert(yarn, at);
    }
    Ok(())
}
