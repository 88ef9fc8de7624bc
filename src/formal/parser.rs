// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Line parser for formal knitout.
//!
//! Every line produces exactly one of: an instruction, a [`LineError`], or nothing
//! (blank or comment-only). A bad line never stops the parse.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::core::instruction::{Instruction, Operation, YarnId, YarnLength};
use crate::core::needle::{Direction, Needle};

/// Why a single line failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("Expecting {0} but ran out of tokens.")]
    OutOfTokens(&'static str),
    #[error("Expecting +/- for direction, but got '{0}'.")]
    BadDirection(String),
    #[error("Expecting bed.index but got '{0}'.")]
    BadNeedle(String),
    #[error("Expecting length, got '{0}'.")]
    BadLength(String),
    #[error("Expecting '(yarn,length)' but got '{0}'.")]
    BadYarnTuple(String),
    #[error("Expecting length in yarn but got '{0}'.")]
    BadYarnLength(String),
    #[error("Yarn {0} reused in yarns.")]
    DuplicateYarn(YarnId),
    #[error("Expecting yarn but got '{0}'.")]
    BadYarn(String),
    #[error("Expecting rack but got '{0}'.")]
    BadRack(String),
    #[error("{0} must have at least one yarn.")]
    MissingYarns(&'static str),
    #[error("Tuck must have exactly one yarn, got {0}.")]
    TuckYarnCount(usize),
    #[error("Unrecognized operation '{0}'.")]
    UnknownOperation(String),
    #[error("Extra tokens at end of line: '{0}'.")]
    ExtraTokens(String),
}

/// A syntax error tied to its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub error: SyntaxError,
}

impl LineError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            self.line,
            Severity::Error,
            DiagnosticKind::Syntax,
            self.error.to_string(),
        )
    }
}

/// Result of parsing a whole program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedProgram {
    pub instructions: Vec<Instruction>,
    pub errors: Vec<LineError>,
}

/// Parses formal knitout text, splitting on `\n` or `\r\n`.
pub fn parse(text: &str) -> ParsedProgram {
    let lines: Vec<&str> = text.lines().collect();
    parse_lines(&lines)
}

/// Parses pre-split lines; line numbers are 1-based positions in `lines`.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> ParsedProgram {
    let mut program = ParsedProgram::default();
    for (idx, line) in lines.iter().enumerate() {
        let line_number = idx + 1;
        match parse_line(line.as_ref(), line_number) {
            Ok(Some(instruction)) => program.instructions.push(instruction),
            Ok(None) => {}
            Err(error) => program.errors.push(LineError {
                line: line_number,
                error,
            }),
        }
    }
    tracing::debug!(
        instructions = program.instructions.len(),
        errors = program.errors.len(),
        "parsed formal knitout"
    );
    program
}

/// Parses one line. `Ok(None)` means the line holds no instruction.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<Instruction>, SyntaxError> {
    let (code, comment) = match line.split_once(';') {
        Some((code, comment)) => (code, Some(comment.to_string())),
        None => (line, None),
    };

    let mut tokens = Tokens::new(code);
    let Some(op) = tokens.next() else {
        return Ok(None);
    };

    let op = match op {
        "knit" => {
            let direction = tokens.direction()?;
            let needle = tokens.needle()?;
            let length = tokens.length()?;
            let yarns = tokens.yarns()?;
            if yarns.is_empty() {
                return Err(SyntaxError::MissingYarns("Knit"));
            }
            Operation::Knit {
                direction,
                needle,
                length,
                yarns,
            }
        }
        "tuck" => {
            let direction = tokens.direction()?;
            let needle = tokens.needle()?;
            let length = tokens.length()?;
            let yarns = tokens.yarns()?;
            if yarns.len() != 1 {
                return Err(SyntaxError::TuckYarnCount(yarns.len()));
            }
            Operation::Tuck {
                direction,
                needle,
                length,
                yarns,
            }
        }
        "split" => {
            let direction = tokens.direction()?;
            let needle = tokens.needle()?;
            let target = tokens.needle()?;
            let length = tokens.length()?;
            let yarns = tokens.yarns()?;
            if yarns.is_empty() {
                return Err(SyntaxError::MissingYarns("Split"));
            }
            Operation::Split {
                direction,
                needle,
                target,
                length,
                yarns,
            }
        }
        "miss" | "in" | "out" => {
            let direction = tokens.direction()?;
            let needle = tokens.needle()?;
            let yarn = tokens.yarn()?;
            match op {
                "miss" => Operation::Miss {
                    direction,
                    needle,
                    yarn,
                },
                "in" => Operation::In {
                    direction,
                    needle,
                    yarn,
                },
                _ => Operation::Out {
                    direction,
                    needle,
                    yarn,
                },
            }
        }
        "drop" => Operation::Drop {
            needle: tokens.needle()?,
        },
        "xfer" => {
            let needle = tokens.needle()?;
            let target = tokens.needle()?;
            Operation::Xfer { needle, target }
        }
        "rack" => Operation::Rack {
            rack: tokens.rack()?,
        },
        other => return Err(SyntaxError::UnknownOperation(other.to_string())),
    };

    let rest: Vec<&str> = tokens.collect();
    if !rest.is_empty() {
        return Err(SyntaxError::ExtraTokens(rest.join(" ")));
    }
    Ok(Some(Instruction::new(op, line_number).with_comment(comment)))
}

/// Whitespace-separated field reader over the code part of a line.
struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(code: &'a str) -> Self {
        Self {
            inner: code.split_whitespace(),
        }
    }

    fn require(&mut self, expected: &'static str) -> Result<&'a str, SyntaxError> {
        self.inner.next().ok_or(SyntaxError::OutOfTokens(expected))
    }

    fn direction(&mut self) -> Result<Direction, SyntaxError> {
        let tok = self.require("direction")?;
        Direction::parse(tok).ok_or_else(|| SyntaxError::BadDirection(tok.to_string()))
    }

    fn needle(&mut self) -> Result<Needle, SyntaxError> {
        let tok = self.require("needle")?;
        Needle::parse_formal(tok).ok_or_else(|| SyntaxError::BadNeedle(tok.to_string()))
    }

    fn length(&mut self) -> Result<f64, SyntaxError> {
        let tok = self.require("length")?;
        parse_finite(tok).ok_or_else(|| SyntaxError::BadLength(tok.to_string()))
    }

    /// Consumes every remaining token as a `(yarn,length)` tuple.
    fn yarns(&mut self) -> Result<Vec<YarnLength>, SyntaxError> {
        let mut yarns = Vec::new();
        let mut used = BTreeSet::new();
        for tok in self.inner.by_ref() {
            let (yarn, length) = split_yarn_tuple(tok)
                .ok_or_else(|| SyntaxError::BadYarnTuple(tok.to_string()))?;
            if !used.insert(yarn) {
                return Err(SyntaxError::DuplicateYarn(yarn));
            }
            let length =
                parse_finite(length).ok_or_else(|| SyntaxError::BadYarnLength(length.to_string()))?;
            yarns.push(YarnLength::new(yarn, length));
        }
        Ok(yarns)
    }

    fn yarn(&mut self) -> Result<YarnId, SyntaxError> {
        let tok = self.require("yarn")?;
        parse_yarn_id(tok).ok_or_else(|| SyntaxError::BadYarn(tok.to_string()))
    }

    fn rack(&mut self) -> Result<i64, SyntaxError> {
        let tok = self.require("rack")?;
        let unsigned = tok
            .strip_prefix('-')
            .or_else(|| tok.strip_prefix('+'))
            .unwrap_or(tok);
        if !is_canonical_digits(unsigned) {
            return Err(SyntaxError::BadRack(tok.to_string()));
        }
        tok.parse().map_err(|_| SyntaxError::BadRack(tok.to_string()))
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Splits `(N,L)` into the yarn id and the raw length text.
fn split_yarn_tuple(tok: &str) -> Option<(YarnId, &str)> {
    let inner = tok.strip_prefix('(')?.strip_suffix(')')?;
    let (yarn, length) = inner.split_once(',')?;
    let length_ok = !length.is_empty()
        && length
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'));
    if !length_ok {
        return None;
    }
    Some((parse_yarn_id(yarn)?, length))
}

/// Yarn ids are decimal without leading zeros (`0` itself is allowed).
fn parse_yarn_id(tok: &str) -> Option<YarnId> {
    if !is_canonical_digits(tok) {
        return None;
    }
    tok.parse().ok()
}

fn is_canonical_digits(tok: &str) -> bool {
    !tok.is_empty()
        && tok.bytes().all(|b| b.is_ascii_digit())
        && (tok.len() == 1 || !tok.starts_with('0'))
}

fn parse_finite(tok: &str) -> Option<f64> {
    tok.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(line: &str) -> Result<Option<Instruction>, SyntaxError> {
        parse_line(line, 1)
    }

    #[test]
    fn parses_each_operation() {
        let program = parse(
            "knit + f.1 30 (1,2) (2,0.5)\n\
             tuck - b.-2 10 (3,1)\n\
             split + f.0 b.0 20 (1,1e1)\n\
             miss - f.4 2\n\
             in + f.0 1\n\
             out - f.0 1\n\
             drop b.7\n\
             xfer f.3 b.2\n\
             rack -1\n\
             rack +2\n",
        );
        assert!(program.errors.is_empty(), "{:?}", program.errors);
        let rendered: Vec<String> = program
            .instructions
            .iter()
            .map(|inst| inst.op.to_string())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "knit + f.1 30 (1,2) (2,0.5)",
                "tuck - b.-2 10 (3,1)",
                "split + f.0 b.0 20 (1,10)",
                "miss - f.4 2",
                "in + f.0 1",
                "out - f.0 1",
                "drop b.7",
                "xfer f.3 b.2",
                "rack -1",
                "rack 2",
            ]
        );
        assert_eq!(program.instructions[8].line, 9);
    }

    #[test]
    fn comment_is_stripped_and_kept() {
        let inst = parse_one("  knit + f.1 30 (1,2)  ; first row; again")
            .expect("parses")
            .expect("instruction");
        assert_eq!(inst.comment.as_deref(), Some(" first row; again"));
        assert!(matches!(inst.op, Operation::Knit { .. }));
    }

    #[test]
    fn blank_and_comment_lines_produce_nothing() {
        assert_eq!(parse_one(""), Ok(None));
        assert_eq!(parse_one("   \t "), Ok(None));
        assert_eq!(parse_one("; just a note"), Ok(None));
    }

    #[test]
    fn yarn_count_rules() {
        assert_eq!(
            parse_one("knit + f.1 30"),
            Err(SyntaxError::MissingYarns("Knit"))
        );
        assert_eq!(
            parse_one("split + f.1 b.1 30"),
            Err(SyntaxError::MissingYarns("Split"))
        );
        assert_eq!(
            parse_one("tuck + f.1 30 (1,0) (2,0)"),
            Err(SyntaxError::TuckYarnCount(2))
        );
        assert_eq!(
            parse_one("knit + f.1 30 (1,0) (1,2)"),
            Err(SyntaxError::DuplicateYarn(1))
        );
    }

    #[test]
    fn malformed_fields_report_specific_errors() {
        assert_eq!(
            parse_one("knit"),
            Err(SyntaxError::OutOfTokens("direction"))
        );
        assert_eq!(
            parse_one("knit x f.1 30 (1,0)"),
            Err(SyntaxError::BadDirection("x".to_string()))
        );
        assert_eq!(
            parse_one("knit + f3 30 (1,0)"),
            Err(SyntaxError::BadNeedle("f3".to_string()))
        );
        assert_eq!(
            parse_one("knit + f.3 abc (1,0)"),
            Err(SyntaxError::BadLength("abc".to_string()))
        );
        assert_eq!(
            parse_one("knit + f.3 30 1,0"),
            Err(SyntaxError::BadYarnTuple("1,0".to_string()))
        );
        assert_eq!(
            parse_one("knit + f.3 30 (1,1e)"),
            Err(SyntaxError::BadYarnLength("1e".to_string()))
        );
        assert_eq!(
            parse_one("miss + f.3 01"),
            Err(SyntaxError::BadYarn("01".to_string()))
        );
        assert_eq!(
            parse_one("rack 1.5"),
            Err(SyntaxError::BadRack("1.5".to_string()))
        );
        assert_eq!(
            parse_one("purl + f.1"),
            Err(SyntaxError::UnknownOperation("purl".to_string()))
        );
        assert_eq!(
            parse_one("drop f.1 f.2"),
            Err(SyntaxError::ExtraTokens("f.2".to_string()))
        );
        assert_eq!(parse_one("xfer f.1"), Err(SyntaxError::OutOfTokens("needle")));
        assert_eq!(parse_one("in + f.1"), Err(SyntaxError::OutOfTokens("yarn")));
    }

    #[test]
    fn errors_are_collected_per_line() {
        let program = parse("in + f.0 1\nbogus\n\nknit - f.0 30 (1,0)\nrack\n");
        assert_eq!(program.instructions.len(), 2);
        assert_eq!(
            program.errors,
            vec![
                LineError {
                    line: 2,
                    error: SyntaxError::UnknownOperation("bogus".to_string()),
                },
                LineError {
                    line: 5,
                    error: SyntaxError::OutOfTokens("rack"),
                },
            ]
        );
        assert_eq!(program.errors[0].to_diagnostic().code(), "fnp001");
    }

    #[test]
    fn parse_lines_accepts_owned_lines() {
        let lines = vec!["rack 1".to_string(), "rack 0".to_string()];
        let program = parse_lines(&lines);
        assert_eq!(program.instructions.len(), 2);
        assert_eq!(program.instructions[1].line, 2);
    }
}
