//! Tabular format resolution
//!
//! The record format (csv, psv, json, ...) is independent of the
//! compression/encryption pipeline: it is not a stage, it decides how the
//! row layer renders and parses lines. Resolution precedence: an explicit
//! format always wins; otherwise the final extension of the stage-stripped
//! resource name is consulted; otherwise there is no tabular
//! interpretation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamStackError};
use crate::pipeline::extensions;
use crate::registry::Registry;

/// Supported tabular record formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Comma-separated values, quote-aware, header line first
    Csv,
    /// Pipe-separated values, header line first
    Psv,
    /// One JSON object per line
    Json,
    /// One JSON object per line (alias semantics of `Json` for callers
    /// that think in records rather than documents)
    Hash,
    /// One JSON array per line; the first array carries the columns when
    /// none were supplied
    Array,
    /// Fixed-width columns described by an externally supplied layout
    Fixed,
}

impl Format {
    /// Canonical lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Psv => "psv",
            Format::Json => "json",
            Format::Hash => "hash",
            Format::Array => "array",
            Format::Fixed => "fixed",
        }
    }

    /// Whether this format writes a header line ahead of the data rows
    pub(crate) fn renders_header_line(&self) -> bool {
        matches!(self, Format::Csv | Format::Psv | Format::Fixed)
    }

    /// Whether reading consumes the first line as a header when columns
    /// were not supplied
    pub(crate) fn parses_header_line(&self) -> bool {
        matches!(self, Format::Csv | Format::Psv)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = StreamStackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "psv" => Ok(Format::Psv),
            "json" => Ok(Format::Json),
            "hash" => Ok(Format::Hash),
            "array" => Ok(Format::Array),
            "fixed" => Ok(Format::Fixed),
            other => Err(StreamStackError::Configuration(format!(
                "unknown format '{other}' (expected csv, psv, json, hash, array or fixed)"
            ))),
        }
    }
}

/// Resolve the effective format for a resource
///
/// `explicit` wins outright. Otherwise the resource name, with all
/// recognized stage extensions stripped, is inspected: `.csv`, `.psv` and
/// `.json` map to their formats; anything else yields `None` (raw
/// line/byte semantics).
///
/// # Example
///
/// ```
/// use streamstack::format::{resolve_format, Format};
/// use streamstack::registry::Registry;
///
/// let registry = Registry::with_builtins();
/// assert_eq!(resolve_format(None, Some("a.csv.gz"), &registry), Some(Format::Csv));
/// assert_eq!(resolve_format(Some(Format::Json), Some("a.csv"), &registry), Some(Format::Json));
/// assert_eq!(resolve_format(None, Some("a.dat"), &registry), None);
/// ```
pub fn resolve_format(
    explicit: Option<Format>,
    resource_name: Option<&str>,
    registry: &Registry,
) -> Option<Format> {
    if explicit.is_some() {
        return explicit;
    }
    let name = resource_name?;
    let base = extensions::base_name(name, registry);
    match base.rsplit_once('.')?.1.to_ascii_lowercase().as_str() {
        "csv" => Some(Format::Csv),
        "psv" => Some(Format::Psv),
        "json" => Some(Format::Json),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("csv".parse::<Format>().unwrap(), Format::Csv);
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert!(matches!(
            "tsv".parse::<Format>(),
            Err(StreamStackError::Configuration(_))
        ));
    }

    #[test]
    fn test_explicit_wins_over_inferred() {
        let registry = Registry::with_builtins();
        assert_eq!(
            resolve_format(Some(Format::Json), Some("a.csv"), &registry),
            Some(Format::Json)
        );
    }

    #[test]
    fn test_inference_skips_stage_extensions() {
        let registry = Registry::with_builtins();
        assert_eq!(
            resolve_format(None, Some("a.psv.gz.pgp"), &registry),
            Some(Format::Psv)
        );
    }

    #[test]
    fn test_no_format() {
        let registry = Registry::with_builtins();
        assert_eq!(resolve_format(None, Some("a.dat"), &registry), None);
        assert_eq!(resolve_format(None, Some("bare"), &registry), None);
        assert_eq!(resolve_format(None, None, &registry), None);
    }
}
