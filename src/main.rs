// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for the formal knitout checker.

use std::fs;
use std::path::Path;

use clap::Parser;
use serde_json::json;

use fnitout::cli::{
    init_logging, validate_fnitout_cli, with_fallback_file, DiagnosticsSink, FnitoutCli,
    FnitoutConfig, OutputFormat,
};
use fnitout::core::diagnostics::{Diagnostic, DiagnosticKind, RunReport, Severity};
use fnitout::formal::{check, CheckedProgram};

fn read_input(path: &Path) -> Result<String, Diagnostic> {
    fs::read_to_string(path).map_err(|err| {
        Diagnostic::new(
            0,
            Severity::Fatal,
            DiagnosticKind::Io,
            format!("Failed to read {}: {err}", path.display()),
        )
        .with_file(Some(path.to_string_lossy().to_string()))
    })
}

/// Diagnostics to print, keeping at most `max_errors` errors.
fn limit_errors(diagnostics: &[Diagnostic], max_errors: Option<usize>) -> (Vec<Diagnostic>, usize) {
    let Some(limit) = max_errors else {
        return (diagnostics.to_vec(), 0);
    };
    let mut shown = Vec::new();
    let mut errors = 0usize;
    let mut hidden = 0usize;
    for diag in diagnostics {
        if diag.severity() >= Severity::Error {
            errors += 1;
            if errors > limit {
                hidden += 1;
                continue;
            }
        }
        shown.push(diag.clone());
    }
    (shown, hidden)
}

fn print_trace(checked: &CheckedProgram, format: OutputFormat) {
    if format == OutputFormat::Json {
        let states: Vec<serde_json::Value> = checked
            .validation
            .trace
            .iter()
            .map(|state| state.to_json())
            .collect();
        println!("{}", json!({ "trace": states }));
    } else {
        for (idx, state) in checked.validation.trace.iter().enumerate() {
            println!("{idx:>5} | {state}");
        }
    }
}

fn print_summary(config: &FnitoutConfig, checked: &CheckedProgram, report: &RunReport) {
    let input = config.input.to_string_lossy();
    let instructions = checked.program.instructions.len();
    let syntax_errors = checked.program.errors.len();
    let validation_errors = checked.validation.errors.len();
    let states = checked.validation.trace.len();
    if config.output_format == OutputFormat::Json {
        println!(
            "{}",
            json!({
                "file": input,
                "instructions": instructions,
                "syntax_errors": syntax_errors,
                "validation_errors": validation_errors,
                "states": states,
                "ok": report.error_count() == 0,
            })
        );
    } else {
        println!(
            "{input}: {instructions} instructions, {syntax_errors} syntax errors, {validation_errors} validation errors, {states} states"
        );
    }
}

fn main() {
    let cli = FnitoutCli::parse();
    let config = match validate_fnitout_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(config.quiet);

    let mut sink = match DiagnosticsSink::from_config(&config.diagnostics_sink) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open diagnostics sink: {err}");
            std::process::exit(1);
        }
    };

    let text = match read_input(&config.input) {
        Ok(text) => text,
        Err(diag) => {
            sink.emit_diagnostics(&[diag], None, config.output_format);
            std::process::exit(1);
        }
    };

    let checked = check(&text);
    let source_lines: Vec<String> = text.lines().map(String::from).collect();
    let diagnostics = with_fallback_file(checked.diagnostics(), &config.input);
    let report = RunReport::new(diagnostics, source_lines);

    let (shown, hidden) = limit_errors(report.diagnostics(), config.max_errors);
    sink.emit_diagnostics(&shown, Some(report.source_lines()), config.output_format);
    if hidden > 0 && config.output_format != OutputFormat::Json {
        sink.emit_line(&format!("... {hidden} more errors not shown"));
    }

    if config.print_trace {
        print_trace(&checked, config.output_format);
    }
    if !config.quiet {
        print_summary(&config, &checked, &report);
    }

    if report.error_count() > 0 {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(line: usize) -> Diagnostic {
        Diagnostic::new(line, Severity::Error, DiagnosticKind::Syntax, "bad")
    }

    #[test]
    fn limit_errors_keeps_first_errors_and_all_warnings() {
        let diags = vec![
            error(1),
            Diagnostic::warning(2, DiagnosticKind::Header, "odd"),
            error(3),
            error(4),
        ];
        let (shown, hidden) = limit_errors(&diags, Some(1));
        assert_eq!(hidden, 2);
        let lines: Vec<usize> = shown.iter().map(Diagnostic::line).collect();
        assert_eq!(lines, vec![1, 2]);

        let (shown, hidden) = limit_errors(&diags, None);
        assert_eq!(shown.len(), 4);
        assert_eq!(hidden, 0);
    }

    #[test]
    fn read_input_reports_missing_file_as_io_error() {
        let diag = read_input(Path::new("/nonexistent/fnitout-input.f")).unwrap_err();
        assert_eq!(diag.kind(), DiagnosticKind::Io);
        assert_eq!(diag.code(), "fio001");
        assert!(diag.message().starts_with("Failed to read"));
    }
}
