// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Diagnostic routing and logging setup shared by the binaries.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::diagnostics::Diagnostic;

use super::args::{DiagnosticsSinkConfig, OutputFormat};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn,fnitout=info";

/// Installs the stderr log subscriber; `quiet` lowers the default filter to errors.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { DEFAULT_LOG_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Destination for rendered diagnostics.
pub struct DiagnosticsSink {
    writer: Option<Box<dyn Write>>,
}

impl DiagnosticsSink {
    pub fn from_config(config: &DiagnosticsSinkConfig) -> io::Result<Self> {
        match config {
            DiagnosticsSinkConfig::Disabled => Ok(Self { writer: None }),
            DiagnosticsSinkConfig::Stderr => Ok(Self {
                writer: Some(Box::new(io::stderr())),
            }),
            DiagnosticsSinkConfig::File { path, append } => {
                let mut opts = OpenOptions::new();
                opts.create(true).write(true);
                if *append {
                    opts.append(true);
                } else {
                    opts.truncate(true);
                }
                let file = opts.open(path)?;
                Ok(Self {
                    writer: Some(Box::new(file)),
                })
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn emit_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writeln!(writer, "{line}");
        }
    }

    pub fn emit_diagnostics(
        &mut self,
        diagnostics: &[Diagnostic],
        source_lines: Option<&[String]>,
        format: OutputFormat,
    ) {
        for diag in diagnostics {
            self.emit_line(&format_diagnostic_line(diag, source_lines, format));
        }
    }
}

pub fn format_diagnostic_line(
    diag: &Diagnostic,
    source_lines: Option<&[String]>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => json!({
            "code": diag.code(),
            "severity": diag.severity().as_str(),
            "message": diag.message(),
            "file": diag.file(),
            "line": diag.line(),
            "notes": diag.notes(),
        })
        .to_string(),
        OutputFormat::Text => diag.format_with_context(source_lines),
    }
}

/// Attaches `path` to every diagnostic that has no file yet.
pub fn with_fallback_file(diagnostics: Vec<Diagnostic>, path: &Path) -> Vec<Diagnostic> {
    let fallback = path.to_string_lossy().to_string();
    diagnostics
        .into_iter()
        .map(|diag| {
            if diag.file().is_none() {
                diag.with_file(Some(fallback.clone()))
            } else {
                diag
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::{DiagnosticKind, Severity};

    #[test]
    fn json_line_has_expected_keys_with_nulls() {
        let diag = Diagnostic::new(7, Severity::Error, DiagnosticKind::Syntax, "boom");
        let line = format_diagnostic_line(&diag, None, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).expect("valid json");
        assert_eq!(value["code"], "fnp001");
        assert_eq!(value["severity"], "error");
        assert_eq!(value["message"], "boom");
        assert_eq!(value["line"], 7);
        assert!(value["file"].is_null());
        assert!(value["notes"].as_array().is_some_and(Vec::is_empty));
    }

    #[test]
    fn text_line_uses_context_format() {
        let diag = Diagnostic::warning(2, DiagnosticKind::Header, "odd header");
        let lines = vec![";!knitout-2".to_string(), ";;Colour: red".to_string()];
        let line = format_diagnostic_line(&diag, Some(&lines), OutputFormat::Text);
        assert_eq!(
            line,
            "2: WARNING [k2f001]\n    2 | ;;Colour: red\nWARNING: odd header"
        );
    }

    #[test]
    fn fallback_file_fills_only_missing_files() {
        let named = Diagnostic::warning(1, DiagnosticKind::Header, "a").with_file(Some("x.k".into()));
        let bare = Diagnostic::warning(2, DiagnosticKind::Header, "b");
        let diags = with_fallback_file(vec![named, bare], Path::new("in.k"));
        assert_eq!(diags[0].file(), Some("x.k"));
        assert_eq!(diags[1].file(), Some("in.k"));
    }
}
