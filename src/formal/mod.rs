// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Formal knitout: parsing and trace validation.

pub mod parser;
pub mod state;
pub mod validate;

#[cfg(test)]
mod tests;

pub use parser::{parse, parse_line, parse_lines, LineError, ParsedProgram, SyntaxError};
pub use state::{Attachment, MachineState};
pub use validate::{apply, validate, InstructionError, Validation, ValidationError};

use crate::core::diagnostics::Diagnostic;

/// A program that has been parsed and then replayed.
#[derive(Debug, Clone)]
pub struct CheckedProgram {
    pub program: ParsedProgram,
    pub validation: Validation,
}

impl CheckedProgram {
    /// Syntax errors in line order, then validation errors in instruction order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let syntax = self.program.errors.iter().map(LineError::to_diagnostic);
        let semantic = self.validation.errors.iter().map(|err| {
            err.to_diagnostic(self.program.instructions.get(err.instruction))
        });
        syntax.chain(semantic).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.program.errors.is_empty() && self.validation.errors.is_empty()
    }
}

/// Parses `text` and validates every instruction that parsed.
pub fn check(text: &str) -> CheckedProgram {
    let program = parse(text);
    let validation = validate(&program.instructions);
    tracing::info!(
        instructions = program.instructions.len(),
        syntax_errors = program.errors.len(),
        validation_errors = validation.errors.len(),
        states = validation.trace.len(),
        "checked formal knitout"
    );
    CheckedProgram {
        program,
        validation,
    }
}
