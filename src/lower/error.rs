// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Fatal lowering errors. Any of these stops the pass.

use thiserror::Error;

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::core::needle::Needle;

use super::{MAX_NEEDLE_INDEX, MAX_RACK};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error("No first line to check for magic number.")]
    NoMagicLine,
    #[error("invalid knitout magic string '{0}'")]
    BadMagic(String),
    #[error("Carriers header not included but is required.")]
    MissingCarriers,
    #[error("Gauge header's value ('{0}') should be a number greater than zero.")]
    BadGauge(String),
    #[error("Carrier name '{0}' appears more than once in the Carriers header.")]
    DuplicateCarrierName(String),
    #[error("Can't bring {0} no carriers")]
    NoCarriers(&'static str),
    #[error("Carrier '{0}' not named in Carriers comment header.")]
    UnknownCarrier(String),
    #[error("Carrier '{0}' listed more than once in one operation.")]
    RepeatedCarrier(String),
    #[error("Can't in '{0}' -- it's already in.")]
    AlreadyIn(String),
    #[error("Can't in '{0}' -- it's pending.")]
    AlreadyPending(String),
    #[error("Can't out '{0}' -- it's pending, not in.")]
    OutPending(String),
    #[error("Can't out '{0}' -- it isn't in.")]
    OutAbsent(String),
    #[error("Carrier '{0}' isn't pending or in.")]
    CarrierNotIn(String),
    #[error("racking takes one argument")]
    RackArity,
    #[error("racking must be a number, got '{0}'")]
    RackNotNumber(String),
    #[error("quarter-pitch racking conversion not supported yet")]
    FractionalRack,
    #[error("racking '{0}' is outside -{max}..={max}", max = MAX_RACK)]
    RackOutOfRange(String),
    #[error("stitch takes two integer arguments.")]
    BadStitch,
    #[error("x-stitch-number takes one non-negative integer argument.")]
    BadStitchNumber,
    #[error("{op} is missing its {expected}")]
    MissingArgument {
        op: &'static str,
        expected: &'static str,
    },
    #[error("invalid direction '{0}', expecting + or -")]
    BadDirection(String),
    #[error("invalid needle specification '{0}'")]
    BadNeedle(String),
    #[error("sliders not supported yet by translation code ('{0}')")]
    Slider(String),
    #[error("needle '{0}' is outside -{max}..={max}", max = MAX_NEEDLE_INDEX)]
    NeedleOutOfRange(String),
    #[error("tuck with {0} carriers has no formal equivalent; use one carrier per tuck.")]
    MultiCarrierTuck(usize),
    #[error("can't move loops from {needle} to {target}: both are on the same bed.")]
    TransferSameBed { needle: Needle, target: Needle },
    #[error("can't move loops from {needle} to {target}: not aligned at racking {rack}.")]
    TransferMisaligned {
        needle: Needle,
        target: Needle,
        rack: i64,
    },
    #[error("cannot {0} with carriers (use tuck/knit/split).")]
    CarriersNotAllowed(String),
    #[error("it makes no sense to miss with no yarns.")]
    MissWithoutCarriers,
    #[error("unsupported operation '{0}'.")]
    UnsupportedOperation(String),
}

impl LowerError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::NoMagicLine
            | Self::BadMagic(_)
            | Self::MissingCarriers
            | Self::BadGauge(_)
            | Self::DuplicateCarrierName(_) => DiagnosticKind::Header,
            Self::NoCarriers(_)
            | Self::UnknownCarrier(_)
            | Self::RepeatedCarrier(_)
            | Self::AlreadyIn(_)
            | Self::AlreadyPending(_)
            | Self::OutPending(_)
            | Self::OutAbsent(_)
            | Self::CarrierNotIn(_)
            | Self::CarriersNotAllowed(_)
            | Self::MissWithoutCarriers => DiagnosticKind::Carrier,
            _ => DiagnosticKind::Lowering,
        }
    }
}

/// A fatal error at a 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}: {error}")]
pub struct FatalError {
    pub line: usize,
    pub error: LowerError,
}

impl FatalError {
    pub fn new(line: usize, error: LowerError) -> Self {
        Self { line, error }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            self.line,
            Severity::Fatal,
            self.error.kind(),
            self.error.to_string(),
        )
    }
}
