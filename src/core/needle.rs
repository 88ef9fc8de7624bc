// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Needle addressing shared by the parser, validator and lowering pass.

use std::fmt;

/// One of the two needle beds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bed {
    Front,
    Back,
}

impl Bed {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "f",
            Self::Back => "b",
        }
    }
}

impl fmt::Display for Bed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Carriage travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Increasing,
    Decreasing,
}

impl Direction {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "+" => Some(Self::Increasing),
            "-" => Some(Self::Decreasing),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increasing => "+",
            Self::Decreasing => "-",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Increasing => Self::Decreasing,
            Self::Decreasing => Self::Increasing,
        }
    }

    /// Column offset of a feeder travelling this way relative to the needle it just passed.
    pub fn feeder_offset(self) -> i64 {
        match self {
            Self::Increasing => 1,
            Self::Decreasing => 0,
        }
    }

    /// Unit index step in this direction.
    pub fn step(self) -> i64 {
        match self {
            Self::Increasing => 1,
            Self::Decreasing => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loop-holding position on one bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Needle {
    pub bed: Bed,
    pub index: i64,
}

impl Needle {
    pub const fn new(bed: Bed, index: i64) -> Self {
        Self { bed, index }
    }

    pub const fn front(index: i64) -> Self {
        Self::new(Bed::Front, index)
    }

    pub const fn back(index: i64) -> Self {
        Self::new(Bed::Back, index)
    }

    /// Parses the formal `bed.index` form, e.g. `f.3` or `b.-2`.
    pub fn parse_formal(token: &str) -> Option<Self> {
        let (bed, index) = token.split_once('.')?;
        let bed = match bed {
            "f" => Bed::Front,
            "b" => Bed::Back,
            _ => return None,
        };
        Some(Self::new(bed, parse_signed_digits(index)?))
    }

    /// Column this needle occupies at `rack`; back-bed columns shift with racking.
    pub fn column(self, rack: i64) -> i64 {
        match self.bed {
            Bed::Front => self.index,
            Bed::Back => self.index + rack,
        }
    }

    /// [`Needle::column`] for untrusted indices; `None` when the column overflows.
    pub fn checked_column(self, rack: i64) -> Option<i64> {
        match self.bed {
            Bed::Front => Some(self.index),
            Bed::Back => self.index.checked_add(rack),
        }
    }
}

impl fmt::Display for Needle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bed, self.index)
    }
}

/// Parses `-?\d+` into an index; anything else (signs, dots, spaces) is rejected.
pub(crate) fn parse_signed_digits(text: &str) -> Option<i64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
