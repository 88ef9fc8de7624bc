// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Machine-state snapshots recorded in a trace.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::json;

use crate::core::instruction::YarnId;
use crate::core::needle::{Direction, Needle};

use super::validate::ValidationError;

/// Last loop a yarn was worked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub needle: Needle,
    pub direction: Direction,
}

/// Complete physical snapshot of the machine.
///
/// `loops` never holds a zero count; a needle without loops has no entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineState {
    pub rack: i64,
    pub loops: BTreeMap<Needle, u32>,
    pub carriers: BTreeMap<YarnId, i64>,
    pub attachments: BTreeMap<YarnId, Attachment>,
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column of a feeder that just passed `needle` travelling in `direction`.
    ///
    /// With [`Direction::Decreasing`] this is the needle's own column, which is how
    /// alignment between beds is checked.
    pub fn physical_pos(
        &self,
        needle: Needle,
        direction: Direction,
    ) -> Result<i64, ValidationError> {
        needle
            .checked_column(self.rack)
            .and_then(|column| column.checked_add(direction.feeder_offset()))
            .ok_or(ValidationError::OutOfRange {
                needle,
                rack: self.rack,
            })
    }

    pub fn loop_count(&self, needle: Needle) -> u32 {
        self.loops.get(&needle).copied().unwrap_or(0)
    }

    /// Moves every loop at `from` onto `to`, stacking onto what `to` already holds.
    pub(crate) fn move_loops(&mut self, from: Needle, to: Needle) {
        if let Some(count) = self.loops.remove(&from) {
            *self.loops.entry(to).or_insert(0) += count;
        }
    }

    /// Retargets attachments that point at `from` so they follow the moved loops.
    pub(crate) fn move_attachments(&mut self, from: Needle, to: Needle) {
        for attachment in self.attachments.values_mut() {
            if attachment.needle == from {
                attachment.needle = to;
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "rack": self.rack,
            "loops": self
                .loops
                .iter()
                .map(|(needle, count)| (needle.to_string(), json!(count)))
                .collect::<serde_json::Map<_, _>>(),
            "carriers": self
                .carriers
                .iter()
                .map(|(yarn, pos)| (yarn.to_string(), json!(pos)))
                .collect::<serde_json::Map<_, _>>(),
            "attachments": self
                .attachments
                .iter()
                .map(|(yarn, a)| {
                    (
                        yarn.to_string(),
                        json!({
                            "needle": a.needle.to_string(),
                            "direction": a.direction.as_str(),
                        }),
                    )
                })
                .collect::<serde_json::Map<_, _>>(),
        })
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rack:{}", self.rack)?;
        for (yarn, pos) in &self.carriers {
            match self.attachments.get(yarn) {
                Some(a) => write!(f, " y{yarn}:[{pos} / {}{}]", a.needle, a.direction)?,
                None => write!(f, " y{yarn}:[{pos} / x]")?,
            }
        }
        for (needle, count) in &self.loops {
            write!(f, " {needle}:{count}")?;
        }
        Ok(())
    }
}
