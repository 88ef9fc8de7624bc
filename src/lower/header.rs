// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Knitout magic line and comment-header block.

use crate::core::diagnostics::{Diagnostic, DiagnosticKind};

use super::carrier::CarrierTable;
use super::error::{FatalError, LowerError};

/// Highest knitout version this code knows about.
pub const KNOWN_VERSION: u32 = 2;

/// Needles per inch assumed when no `Gauge` header is given.
pub const DEFAULT_GAUGE: f64 = 15.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Headers {
    pub version: u32,
    pub carriers: Vec<String>,
    pub gauge: f64,
    pub gauge_specified: bool,
}

impl Headers {
    /// Headers for a version-2 file naming `carriers` with the default gauge.
    pub fn with_carriers<S: Into<String>>(carriers: impl IntoIterator<Item = S>) -> Self {
        Self {
            version: KNOWN_VERSION,
            carriers: carriers.into_iter().map(Into::into).collect(),
            gauge: DEFAULT_GAUGE,
            gauge_specified: false,
        }
    }
}

/// Parsed header block plus where the operation lines begin.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBlock {
    pub headers: Headers,
    /// 0-based index of the first line after the header block.
    pub body_start: usize,
    pub warnings: Vec<Diagnostic>,
}

/// Reads the magic line and the contiguous `;;Key: value` lines after it.
pub fn parse_header<S: AsRef<str>>(lines: &[S]) -> Result<HeaderBlock, FatalError> {
    let mut warnings = Vec::new();

    let magic = lines
        .first()
        .map(AsRef::as_ref)
        .ok_or_else(|| FatalError::new(1, LowerError::NoMagicLine))?;
    let version = parse_magic(magic).ok_or_else(|| {
        FatalError::new(1, LowerError::BadMagic(magic.to_string()))
    })?;
    if version > KNOWN_VERSION {
        warnings.push(header_warning(
            1,
            format!(
                "File is version {version}, but this code only knows about versions up to {KNOWN_VERSION}."
            ),
        ));
    }

    let mut carriers: Option<Vec<String>> = None;
    let mut gauge: Option<f64> = None;
    let mut seen: Vec<String> = Vec::new();
    let mut idx = 1;
    while idx < lines.len() {
        let line = lines[idx].as_ref();
        let line_number = idx + 1;
        let Some(rest) = line.strip_prefix(";;") else {
            break;
        };
        let Some((key, value)) = rest.split_once(": ") else {
            warnings.push(header_warning(
                line_number,
                format!(
                    "Comment-header-like line '{line}' does not contain string ': ' -- interpreting as regular comment."
                ),
            ));
            break;
        };

        if seen.iter().any(|k| k == key) {
            warnings.push(header_warning(
                line_number,
                format!("header '{key}' specified more than once. Will use last value."),
            ));
        } else {
            seen.push(key.to_string());
        }

        match key {
            "Carriers" => {
                let names: Vec<String> = value
                    .split(' ')
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect();
                CarrierTable::from_names(&names)
                    .map_err(|error| FatalError::new(line_number, error))?;
                carriers = Some(names);
            }
            "Gauge" => {
                let parsed = parse_gauge(value).ok_or_else(|| {
                    FatalError::new(line_number, LowerError::BadGauge(value.to_string()))
                })?;
                gauge = Some(parsed);
            }
            "Machine" | "Width" | "Position" => {}
            _ if key.starts_with("Yarn-") => {}
            _ => warnings.push(header_warning(
                line_number,
                format!("File contains unknown comment header '{key}'."),
            )),
        }
        idx += 1;
    }

    let carriers = carriers.ok_or_else(|| FatalError::new(idx, LowerError::MissingCarriers))?;
    let headers = Headers {
        version,
        carriers,
        gauge: gauge.unwrap_or(DEFAULT_GAUGE),
        gauge_specified: gauge.is_some(),
    };
    if headers.gauge_specified {
        tracing::info!(
            "Gauge header indicates needles are 1 / {} inches apart.",
            headers.gauge
        );
    } else {
        tracing::info!(
            "Gauge header not specified. Assuming needles are 1 / {} inches apart.",
            headers.gauge
        );
    }

    Ok(HeaderBlock {
        headers,
        body_start: idx,
        warnings,
    })
}

/// `;!knitout-N` gives `N`; versions too large for `u32` count as newer than known.
fn parse_magic(line: &str) -> Option<u32> {
    let digits = line.strip_prefix(";!knitout-")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.parse().unwrap_or(u32::MAX))
}

/// Gauge is `\d+\.?\d*` and strictly positive.
fn parse_gauge(value: &str) -> Option<f64> {
    let (int, frac) = value.split_once('.').unwrap_or((value, ""));
    let well_formed = !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return None;
    }
    value.parse::<f64>().ok().filter(|g| *g > 0.0)
}

fn header_warning(line: usize, message: String) -> Diagnostic {
    tracing::warn!(line, "{message}");
    Diagnostic::warning(line, DiagnosticKind::Header, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_carriers_and_gauge() {
        let block = parse_header(&[
            ";!knitout-2",
            ";;Machine: SWGXYZ",
            ";;Gauge: 7.5",
            ";;Carriers: 1 2  3",
            ";;Yarn-1: red",
            "in 1",
        ])
        .expect("header");
        assert_eq!(block.headers.carriers, vec!["1", "2", "3"]);
        assert_eq!(block.headers.gauge, 7.5);
        assert!(block.headers.gauge_specified);
        assert_eq!(block.headers.version, 2);
        assert_eq!(block.body_start, 5);
        assert!(block.warnings.is_empty());
    }

    #[test]
    fn gauge_defaults_to_fifteen() {
        let block = parse_header(&[";!knitout-2", ";;Carriers: A"]).expect("header");
        assert_eq!(block.headers.gauge, DEFAULT_GAUGE);
        assert!(!block.headers.gauge_specified);
        assert_eq!(block.body_start, 2);
    }

    #[test]
    fn structural_problems_are_fatal() {
        let empty: [&str; 0] = [];
        assert_eq!(parse_header(&empty).unwrap_err().error, LowerError::NoMagicLine);
        assert_eq!(
            parse_header(&[";!knitout-x", ";;Carriers: 1"]).unwrap_err().error,
            LowerError::BadMagic(";!knitout-x".to_string())
        );
        assert_eq!(
            parse_header(&[";!knitout-2", ";;Gauge: 15"]).unwrap_err().error,
            LowerError::MissingCarriers
        );
        let err = parse_header(&[";!knitout-2", ";;Carriers: A B A"]).unwrap_err();
        assert_eq!(err.error, LowerError::DuplicateCarrierName("A".to_string()));
        assert_eq!(err.line, 2);
        for bad in ["0", "-3", "abc", "1.5.2", ".5"] {
            let line = format!(";;Gauge: {bad}");
            let err = parse_header(&[";!knitout-2", line.as_str(), ";;Carriers: 1"]).unwrap_err();
            assert_eq!(err.error, LowerError::BadGauge(bad.to_string()));
            assert_eq!(err.line, 2);
        }
    }

    #[test]
    fn oddities_are_warnings() {
        let block = parse_header(&[
            ";!knitout-3",
            ";;Carriers: 1",
            ";;Carriers: 1 2",
            ";;Colour: blue",
            ";;not a header",
            ";;Gauge: 5",
        ])
        .expect("header");
        let messages: Vec<&str> = block.warnings.iter().map(|w| w.message()).collect();
        assert_eq!(messages.len(), 4, "{messages:?}");
        assert!(messages[0].contains("version 3"));
        assert!(messages[1].contains("more than once"));
        assert!(messages[2].contains("unknown comment header 'Colour'"));
        assert!(messages[3].contains("interpreting as regular comment"));
        assert_eq!(block.headers.carriers, vec!["1", "2"]);
        // the malformed line ends the block, so Gauge is never read
        assert_eq!(block.body_start, 4);
        assert!(!block.headers.gauge_specified);
    }
}
