//! Common types used throughout streamstack

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

/// Direction of a pipeline invocation
///
/// Stages register separate factories per direction; a read-only format
/// (e.g. a spreadsheet stage) registers no writer factory and lookups for
/// [`Direction::Write`] fail with `UnknownStage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Reading: data flows from the raw byte source towards the caller
    Read,
    /// Writing: data flows from the caller towards the raw byte sink
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => write!(f, "reading"),
            Direction::Write => write!(f, "writing"),
        }
    }
}

/// A structured row: column values in column order
pub type Row = Vec<Value>;

/// A structured record: column name to value, in insertion order
pub type Record = serde_json::Map<String, Value>;

/// Options attached to a single pipeline stage
///
/// An insertion-ordered map from option key to JSON value. Stage
/// implementations read the options they understand and ignore the rest.
///
/// # Example
///
/// ```
/// use streamstack::StageOptions;
///
/// let options = StageOptions::new()
///     .set("level", 9)
///     .set("passphrase", "correct horse");
/// assert_eq!(options.u64("level"), Some(9));
/// assert_eq!(options.str("passphrase"), Some("correct horse"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOptions {
    entries: IndexMap<String, Value>,
}

impl StageOptions {
    /// Create an empty option map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, returning the map for chaining
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Look up a raw option value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Look up a string option
    pub fn str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    /// Look up an unsigned integer option
    pub fn u64(&self, key: &str) -> Option<u64> {
        self.entries.get(key).and_then(Value::as_u64)
    }

    /// Look up a boolean option
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.entries.get(key).and_then(Value::as_bool)
    }

    /// Whether no options are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of options set
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
