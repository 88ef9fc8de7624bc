// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for the knitout to formal knitout converter.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use fnitout::cli::{
    init_logging, validate_k2f_cli, with_fallback_file, DiagnosticsSink, K2fCli, K2fConfig,
    OutputFormat, OutputTarget,
};
use fnitout::core::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use fnitout::formal::check;
use fnitout::lower::{lower, Lowered};

fn io_error(path: &Path, action: &str, err: io::Error) -> Diagnostic {
    Diagnostic::new(
        0,
        Severity::Fatal,
        DiagnosticKind::Io,
        format!("Failed to {action} {}: {err}", path.display()),
    )
    .with_file(Some(path.to_string_lossy().to_string()))
}

fn output_name(target: &OutputTarget) -> String {
    match target {
        OutputTarget::Stdout => "<stdout>".to_string(),
        OutputTarget::File(path) => path.to_string_lossy().to_string(),
    }
}

fn write_output(target: &OutputTarget, text: &str) -> Result<(), Diagnostic> {
    match target {
        OutputTarget::Stdout => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|err| io_error(Path::new("<stdout>"), "write", err))
        }
        OutputTarget::File(path) => {
            fs::write(path, text).map_err(|err| io_error(path, "write", err))?;
            tracing::info!("Wrote to {}", path.display());
            Ok(())
        }
    }
}

/// Re-checks converted output; returns whether it is clean.
fn check_output(sink: &mut DiagnosticsSink, config: &K2fConfig, lowered: &Lowered) -> bool {
    let checked = check(&lowered.text());
    let name = output_name(&config.output);
    let diagnostics = with_fallback_file(checked.diagnostics(), Path::new(&name));
    sink.emit_diagnostics(&diagnostics, Some(&lowered.lines), config.output_format);
    tracing::info!(
        errors = diagnostics.len(),
        states = checked.validation.trace.len(),
        "checked converted output"
    );
    checked.is_clean()
}

fn main() {
    let cli = K2fCli::parse();
    let config = match validate_k2f_cli(&cli) {
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

    tracing::info!(
        "Will convert {} (knitout) to {} (formal knitout).",
        config.input.display(),
        output_name(&config.output)
    );
    let text = match fs::read_to_string(&config.input) {
        Ok(text) => text,
        Err(err) => {
            let diag = io_error(&config.input, "read", err);
            sink.emit_diagnostics(&[diag], None, config.output_format);
            std::process::exit(1);
        }
    };
    let source_lines: Arc<Vec<String>> = Arc::new(text.lines().map(String::from).collect());
    let policy = config.warning_policy;

    match lower(&text) {
        Ok(lowered) => {
            let report = lowered.clone().into_run_report(Arc::clone(&source_lines));
            if policy.emit_warnings {
                let warnings = with_fallback_file(report.diagnostics().to_vec(), &config.input);
                sink.emit_diagnostics(&warnings, Some(report.source_lines()), config.output_format);
            }

            if let Err(diag) = write_output(&config.output, &lowered.text()) {
                sink.emit_diagnostics(&[diag], None, config.output_format);
                std::process::exit(1);
            }

            let mut failed = policy.treat_warnings_as_errors && report.warning_count() > 0;
            if config.check_output && !check_output(&mut sink, &config, &lowered) {
                failed = true;
            }
            if failed {
                std::process::exit(1);
            }
        }
        Err(failure) => {
            let err = failure.into_run_error(Arc::clone(&source_lines));
            let diagnostics: Vec<Diagnostic> = err
                .diagnostics()
                .iter()
                .filter(|diag| policy.emit_warnings || diag.severity() != Severity::Warning)
                .cloned()
                .collect();
            let diagnostics = with_fallback_file(diagnostics, &config.input);
            sink.emit_diagnostics(&diagnostics, Some(err.source_lines()), config.output_format);

            if config.output_format != OutputFormat::Json && sink.is_enabled() {
                sink.emit_line(&format!(
                    "{}: conversion stopped, no output written",
                    config.input.display()
                ));
            }
            std::process::exit(1);
        }
    }
}
