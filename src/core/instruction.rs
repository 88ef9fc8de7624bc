// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Formal knitout instruction model.

use std::fmt;

use super::needle::{Direction, Needle};

/// Yarn identifier as written in formal knitout.
pub type YarnId = u32;

/// One entry of a `(yarn,length)` list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YarnLength {
    pub yarn: YarnId,
    pub length: f64,
}

impl YarnLength {
    pub fn new(yarn: YarnId, length: f64) -> Self {
        Self { yarn, length }
    }
}

impl fmt::Display for YarnLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.yarn, self.length)
    }
}

/// A formal knitout operation with exactly the fields legal for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Knit {
        direction: Direction,
        needle: Needle,
        length: f64,
        yarns: Vec<YarnLength>,
    },
    Tuck {
        direction: Direction,
        needle: Needle,
        length: f64,
        yarns: Vec<YarnLength>,
    },
    Split {
        direction: Direction,
        needle: Needle,
        target: Needle,
        length: f64,
        yarns: Vec<YarnLength>,
    },
    Miss {
        direction: Direction,
        needle: Needle,
        yarn: YarnId,
    },
    In {
        direction: Direction,
        needle: Needle,
        yarn: YarnId,
    },
    Out {
        direction: Direction,
        needle: Needle,
        yarn: YarnId,
    },
    Drop {
        needle: Needle,
    },
    Xfer {
        needle: Needle,
        target: Needle,
    },
    Rack {
        rack: i64,
    },
}

impl Operation {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Knit { .. } => "knit",
            Self::Tuck { .. } => "tuck",
            Self::Split { .. } => "split",
            Self::Miss { .. } => "miss",
            Self::In { .. } => "in",
            Self::Out { .. } => "out",
            Self::Drop { .. } => "drop",
            Self::Xfer { .. } => "xfer",
            Self::Rack { .. } => "rack",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Self::Knit {
                direction,
                needle,
                length,
                yarns,
            }
            | Self::Tuck {
                direction,
                needle,
                length,
                yarns,
            } => {
                write!(f, " {direction} {needle} {length}")?;
                write_yarns(f, yarns)
            }
            Self::Split {
                direction,
                needle,
                target,
                length,
                yarns,
            } => {
                write!(f, " {direction} {needle} {target} {length}")?;
                write_yarns(f, yarns)
            }
            Self::Miss {
                direction,
                needle,
                yarn,
            }
            | Self::In {
                direction,
                needle,
                yarn,
            }
            | Self::Out {
                direction,
                needle,
                yarn,
            } => write!(f, " {direction} {needle} {yarn}"),
            Self::Drop { needle } => write!(f, " {needle}"),
            Self::Xfer { needle, target } => write!(f, " {needle} {target}"),
            Self::Rack { rack } => write!(f, " {rack}"),
        }
    }
}

fn write_yarns(f: &mut fmt::Formatter<'_>, yarns: &[YarnLength]) -> fmt::Result {
    for yarn in yarns {
        write!(f, " {yarn}")?;
    }
    Ok(())
}

/// A parsed instruction along with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Operation,
    pub line: usize,
    pub comment: Option<String>,
}

impl Instruction {
    pub fn new(op: Operation, line: usize) -> Self {
        Self {
            op,
            line,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if let Some(comment) = &self.comment {
            write!(f, " ;{comment}")?;
        }
        Ok(())
    }
}
