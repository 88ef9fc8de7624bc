// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostics and run reports shared by the parser, validator and lowering pass.

use std::fmt;
use std::sync::Arc;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    /// Recoverable: the offending line or instruction is skipped, the run continues.
    Error,
    /// The run stopped at this point.
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

/// Which stage raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Syntax,
    Validation,
    Header,
    Extension,
    Carrier,
    Lowering,
    Io,
    Cli,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub(crate) line: usize,
    pub(crate) severity: Severity,
    pub(crate) kind: DiagnosticKind,
    pub(crate) code: String,
    pub(crate) message: String,
    pub(crate) file: Option<String>,
    pub(crate) notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        line: usize,
        severity: Severity,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            severity,
            kind,
            code: default_diagnostic_code(kind, severity).to_string(),
            message: message.into(),
            file: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(line: usize, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(line, Severity::Warning, kind, message)
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn format(&self) -> String {
        format!(
            "{}: {} [{}] - {}",
            self.line,
            self.severity.label(),
            self.code,
            self.message
        )
    }

    pub fn format_with_context(&self, lines: Option<&[String]>) -> String {
        let sev = self.severity.label();
        let header = match &self.file {
            Some(file) => format!("{file}:{}: {sev} [{}]", self.line, self.code),
            None => format!("{}: {sev} [{}]", self.line, self.code),
        };

        let mut out = header;
        out.push('\n');
        if let Some(context) = build_context_line(self.line, lines) {
            out.push_str(&context);
            out.push('\n');
        }
        for note in &self.notes {
            out.push_str("note: ");
            out.push_str(note);
            out.push('\n');
        }
        out.push_str(&format!("{sev}: {}", self.message));
        out
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Report from a run that reached the end of its input.
#[derive(Debug, Clone)]
pub struct RunReport {
    diagnostics: Vec<Diagnostic>,
    source_lines: Arc<Vec<String>>,
}

impl RunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, source_lines: impl Into<Arc<Vec<String>>>) -> Self {
        Self {
            diagnostics,
            source_lines: source_lines.into(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

/// Error from a run stopped by a fatal diagnostic.
#[derive(Debug, Clone)]
pub struct RunError {
    error: Diagnostic,
    diagnostics: Vec<Diagnostic>,
    source_lines: Arc<Vec<String>>,
}

impl RunError {
    pub fn new(
        error: Diagnostic,
        diagnostics: Vec<Diagnostic>,
        source_lines: impl Into<Arc<Vec<String>>>,
    ) -> Self {
        Self {
            error,
            diagnostics,
            source_lines: source_lines.into(),
        }
    }

    /// The fatal diagnostic that stopped the run.
    pub fn error(&self) -> &Diagnostic {
        &self.error
    }

    /// Warnings gathered before the failure, followed by the fatal diagnostic.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error.message)
    }
}

impl std::error::Error for RunError {}

/// Renders the `    N | text` line shown under a diagnostic header.
pub fn build_context_line(line_num: usize, lines: Option<&[String]>) -> Option<String> {
    if line_num == 0 {
        return None;
    }
    let text = lines
        .and_then(|lines| lines.get(line_num - 1))
        .map(String::as_str)
        .unwrap_or("<source unavailable>");
    Some(format!("{line_num:>5} | {text}"))
}

fn default_diagnostic_code(kind: DiagnosticKind, severity: Severity) -> &'static str {
    match (kind, severity) {
        (DiagnosticKind::Io, _) => "fio001",
        (DiagnosticKind::Cli, _) => "cli001",
        // lowering problems are always fatal
        (DiagnosticKind::Lowering, _) | (_, Severity::Fatal) => "k2f101",
        (DiagnosticKind::Syntax, _) => "fnp001",
        (DiagnosticKind::Validation, _) => "fnv001",
        (DiagnosticKind::Header, _) => "k2f001",
        (DiagnosticKind::Extension, _) => "k2f002",
        (DiagnosticKind::Carrier, _) => "k2f003",
    }
}
