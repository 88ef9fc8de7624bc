// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! State threaded through the lowering pass.

use std::collections::BTreeMap;

use crate::core::diagnostics::{Diagnostic, DiagnosticKind};
use crate::core::needle::Needle;

use super::carrier::{CarrierState, CarrierTable};
use super::error::LowerError;
use super::header::Headers;

/// Column the emitted instruction text is padded to before the source annotation.
const ANNOTATION_COLUMN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotText {
    Line(String),
    /// An `in` whose location is fixed by the carrier's first use.
    PendingIn { carrier: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    text: SlotText,
    annotation: Option<String>,
}

impl Slot {
    fn render(&self, text: &str) -> String {
        match &self.annotation {
            Some(original) => format!("{text:<ANNOTATION_COLUMN$}; {original}"),
            None => text.to_string(),
        }
    }
}

/// Carrier table, loop table, racking, and output slots for one lowering run.
#[derive(Debug, Clone)]
pub struct LoweringContext {
    pub(crate) headers: Headers,
    pub(crate) carriers: CarrierTable,
    pub(crate) loops: BTreeMap<Needle, u32>,
    pub(crate) racking: i64,
    slots: Vec<Slot>,
    /// Source text waiting to annotate the first line emitted for it.
    annotation: Option<String>,
    line: usize,
    warnings: Vec<Diagnostic>,
}

impl LoweringContext {
    pub fn new(headers: Headers) -> Result<Self, LowerError> {
        let carriers = CarrierTable::from_names(&headers.carriers)?;
        if carriers.remapped() {
            tracing::info!(
                "Carrier names were not integers in order, so using position-based remapping: {}",
                carriers.describe_mapping()
            );
        } else if !carriers.is_empty() {
            tracing::info!(
                "Will use carrier names ({}) directly as yarn numbers.",
                headers.carriers.join(" ")
            );
        }
        Ok(Self {
            headers,
            carriers,
            loops: BTreeMap::new(),
            racking: 0,
            slots: Vec::new(),
            annotation: None,
            line: 0,
            warnings: Vec::new(),
        })
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Starts a new source line; its text annotates the first slot it emits.
    pub(crate) fn begin_line(&mut self, line: usize, original: &str) {
        self.line = line;
        self.annotation = (!original.is_empty()).then(|| original.to_string());
    }

    pub(crate) fn emit(&mut self, text: impl Into<String>) {
        let annotation = self.annotation.take();
        self.slots.push(Slot {
            text: SlotText::Line(text.into()),
            annotation,
        });
    }

    /// Reserves a slot for carrier `carrier`'s `in`; returns the slot index.
    pub(crate) fn emit_pending_in(&mut self, carrier: usize) -> usize {
        let annotation = self.annotation.take();
        self.slots.push(Slot {
            text: SlotText::PendingIn { carrier },
            annotation,
        });
        self.slots.len() - 1
    }

    pub(crate) fn resolve_slot(&mut self, slot: usize, text: String) {
        if let Some(slot) = self.slots.get_mut(slot) {
            slot.text = SlotText::Line(text);
        }
    }

    pub(crate) fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(line = self.line, "{message}");
        self.warnings.push(Diagnostic::warning(self.line, kind, message));
    }

    /// Resolves leftover placeholders and renders the output lines.
    pub fn finish(mut self) -> Lowered {
        let mut lines = Vec::with_capacity(self.slots.len());
        let mut unused = Vec::new();
        for slot in &self.slots {
            let text = match &slot.text {
                SlotText::Line(text) => text.clone(),
                SlotText::PendingIn { carrier } => {
                    let name = self.carriers.get(*carrier).name.clone();
                    let text = format!("; (carrier '{name}' brought in but never used)");
                    unused.push(name);
                    text
                }
            };
            lines.push(slot.render(&text));
        }
        for name in unused {
            self.line = 0;
            self.warn(
                DiagnosticKind::Carrier,
                format!("Carrier '{name}' was brought in but never used; its 'in' was dropped."),
            );
            if let Some(idx) = self.carriers.index_of(&name) {
                self.carriers.get_mut(idx).state = CarrierState::Absent;
            }
        }
        Lowered {
            lines,
            warnings: self.warnings,
            headers: self.headers,
            loops: self.loops,
            racking: self.racking,
        }
    }
}

/// Output of a completed lowering run.
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    pub lines: Vec<String>,
    pub warnings: Vec<Diagnostic>,
    pub headers: Headers,
    /// Loop table after the last operation.
    pub loops: BTreeMap<Needle, u32>,
    pub racking: i64,
}

impl Lowered {
    /// Output as newline-terminated text.
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}
