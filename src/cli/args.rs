// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, RunError, Severity};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const FNITOUT_LONG_ABOUT: &str = "Parse and validate a formal knitout program.

Every line is parsed; every instruction that parses is replayed against a simulated
machine. Syntax and validation errors are reported with their line, and replay
continues from the last good machine state. The exit status is non-zero when any
error was found.";

const K2F_LONG_ABOUT: &str = "Convert knitout to formal knitout.

Carrier names are resolved to yarn numbers, carriers are walked into place with
single-needle misses, racking is split into unit steps, and knits or splits on empty
needles are decayed. Use - as OUTPUT to write to stdout.";

#[derive(Parser, Debug)]
#[command(
    name = "fnitout",
    version = VERSION,
    about = "Formal knitout parser and machine-state validator",
    long_about = FNITOUT_LONG_ABOUT
)]
pub struct FnitoutCli {
    #[arg(value_name = "INPUT", long_help = "Formal knitout file to check.")]
    pub input: PathBuf,
    #[arg(
        long = "format",
        value_enum,
        long_help = "Select output format. text is default; json prints one object per diagnostic and a JSON summary."
    )]
    pub format: Option<OutputFormat>,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress the summary line and informational logging. Errors are still reported unless --no-error is set."
    )]
    pub quiet: bool,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append diagnostics to --error FILE instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["error_file", "error_append"],
        long_help = "Disable all diagnostic output routing."
    )]
    pub no_error: bool,
    #[arg(
        long = "trace",
        action = ArgAction::SetTrue,
        long_help = "Print every machine state of the trace to stdout."
    )]
    pub trace: bool,
    #[arg(
        long = "max-errors",
        value_name = "N",
        default_value_t = 0,
        long_help = "Print at most N error diagnostics. 0 prints all of them."
    )]
    pub max_errors: usize,
}

#[derive(Parser, Debug)]
#[command(
    name = "k2f",
    version = VERSION,
    about = "Knitout to formal knitout converter",
    long_about = K2F_LONG_ABOUT
)]
pub struct K2fCli {
    #[arg(value_name = "INPUT", long_help = "Knitout file to convert.")]
    pub input: PathBuf,
    #[arg(
        value_name = "OUTPUT",
        long_help = "Formal knitout file to write, or - for stdout."
    )]
    pub output: String,
    #[arg(
        long = "format",
        value_enum,
        long_help = "Select diagnostic format. text is default; json prints one object per diagnostic."
    )]
    pub format: Option<OutputFormat>,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress warnings, the summary line and informational logging. Fatal errors are still reported unless --no-error is set."
    )]
    pub quiet: bool,
    #[arg(
        short = 'w',
        long = "no-warn",
        action = ArgAction::SetTrue,
        conflicts_with = "warn_error",
        long_help = "Suppress warning diagnostics."
    )]
    pub no_warn: bool,
    #[arg(
        long = "Werror",
        action = ArgAction::SetTrue,
        conflicts_with = "no_warn",
        long_help = "Treat warnings as errors (non-zero exit status)."
    )]
    pub warn_error: bool,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append diagnostics to --error FILE instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["error_file", "error_append"],
        long_help = "Disable all diagnostic output routing."
    )]
    pub no_error: bool,
    #[arg(
        long = "check",
        action = ArgAction::SetTrue,
        long_help = "Parse and validate the converted program and report its errors."
    )]
    pub check: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticsSinkConfig {
    Stderr,
    File { path: PathBuf, append: bool },
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningPolicy {
    pub emit_warnings: bool,
    pub treat_warnings_as_errors: bool,
}

impl Default for WarningPolicy {
    fn default() -> Self {
        Self {
            emit_warnings: true,
            treat_warnings_as_errors: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where `k2f` writes the converted program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Validated `fnitout` configuration.
#[derive(Debug)]
pub struct FnitoutConfig {
    pub input: PathBuf,
    pub quiet: bool,
    pub output_format: OutputFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub print_trace: bool,
    pub max_errors: Option<usize>,
}

/// Validated `k2f` configuration.
#[derive(Debug)]
pub struct K2fConfig {
    pub input: PathBuf,
    pub output: OutputTarget,
    pub quiet: bool,
    pub output_format: OutputFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub warning_policy: WarningPolicy,
    pub check_output: bool,
}

fn cli_error(message: impl Into<String>) -> RunError {
    RunError::new(
        Diagnostic::new(0, Severity::Fatal, DiagnosticKind::Cli, message),
        Vec::new(),
        Vec::new(),
    )
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, RunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(cli_error(format!(
                "Invalid boolean value for {var_name}: {value}"
            )));
        }
    };
    Ok(parsed)
}

fn parse_env_path(var_name: &str) -> Result<Option<PathBuf>, RunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(value)))
}

fn parse_env_format(var_name: &str) -> Result<Option<OutputFormat>, RunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    match value.as_str() {
        "" => Ok(None),
        "text" => Ok(Some(OutputFormat::Text)),
        "json" => Ok(Some(OutputFormat::Json)),
        other => Err(cli_error(format!(
            "Invalid {var_name} value: {other}. Expected one of: text, json"
        ))),
    }
}

/// Settings shared by both tools once flags and environment are merged.
struct CommonSettings {
    quiet: bool,
    output_format: OutputFormat,
    diagnostics_sink: DiagnosticsSinkConfig,
}

fn resolve_common(
    quiet: bool,
    format: Option<OutputFormat>,
    error_file: Option<&PathBuf>,
    error_append: bool,
    no_error: bool,
) -> Result<CommonSettings, RunError> {
    let env_quiet = parse_env_bool("FNITOUT_QUIET")?;
    let env_format = parse_env_format("FNITOUT_FORMAT")?;
    let env_error_file = parse_env_path("FNITOUT_ERROR_FILE")?;

    let effective_quiet = if quiet {
        true
    } else {
        env_quiet.unwrap_or(false)
    };
    let effective_format = format.or(env_format).unwrap_or_default();
    let effective_error_file = match error_file {
        Some(path) => Some(path.clone()),
        None => env_error_file,
    };

    let diagnostics_sink = if no_error {
        DiagnosticsSinkConfig::Disabled
    } else if let Some(path) = effective_error_file {
        DiagnosticsSinkConfig::File {
            path,
            append: error_append,
        }
    } else {
        DiagnosticsSinkConfig::Stderr
    };

    Ok(CommonSettings {
        quiet: effective_quiet,
        output_format: effective_format,
        diagnostics_sink,
    })
}

/// Validate `fnitout` arguments and return parsed configuration.
pub fn validate_fnitout_cli(cli: &FnitoutCli) -> Result<FnitoutConfig, RunError> {
    let common = resolve_common(
        cli.quiet,
        cli.format,
        cli.error_file.as_ref(),
        cli.error_append,
        cli.no_error,
    )?;
    if cli.input.as_os_str().is_empty() {
        return Err(cli_error("INPUT must not be empty"));
    }

    Ok(FnitoutConfig {
        input: cli.input.clone(),
        quiet: common.quiet,
        output_format: common.output_format,
        diagnostics_sink: common.diagnostics_sink,
        print_trace: cli.trace,
        max_errors: (cli.max_errors > 0).then_some(cli.max_errors),
    })
}

/// Validate `k2f` arguments and return parsed configuration.
pub fn validate_k2f_cli(cli: &K2fCli) -> Result<K2fConfig, RunError> {
    let common = resolve_common(
        cli.quiet,
        cli.format,
        cli.error_file.as_ref(),
        cli.error_append,
        cli.no_error,
    )?;
    let env_no_warn = parse_env_bool("FNITOUT_NO_WARN")?;
    let env_warn_error = parse_env_bool("FNITOUT_WERROR")?;

    let effective_no_warn = if cli.no_warn {
        true
    } else if cli.warn_error {
        false
    } else {
        env_no_warn.unwrap_or(false)
    };
    let effective_warn_error = if cli.warn_error {
        true
    } else if effective_no_warn {
        false
    } else {
        env_warn_error.unwrap_or(false)
    };

    let output = match cli.output.as_str() {
        "" => return Err(cli_error("OUTPUT must not be empty")),
        "-" => OutputTarget::Stdout,
        path => OutputTarget::File(PathBuf::from(path)),
    };
    if output == OutputTarget::File(cli.input.clone()) {
        return Err(cli_error("OUTPUT must differ from INPUT"));
    }

    Ok(K2fConfig {
        input: cli.input.clone(),
        output,
        quiet: common.quiet,
        output_format: common.output_format,
        diagnostics_sink: common.diagnostics_sink,
        warning_policy: WarningPolicy {
            emit_warnings: !effective_no_warn && !common.quiet,
            treat_warnings_as_errors: effective_warn_error,
        },
        check_output: cli.check,
    })
}
