// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared command-line plumbing for the `fnitout` and `k2f` binaries.

pub mod args;
pub mod sink;

pub use args::{
    validate_fnitout_cli, validate_k2f_cli, DiagnosticsSinkConfig, FnitoutCli, FnitoutConfig,
    K2fCli, K2fConfig, OutputFormat, OutputTarget, WarningPolicy,
};
pub use sink::{format_diagnostic_line, init_logging, with_fallback_file, DiagnosticsSink};
