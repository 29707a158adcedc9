//! Error types for streamstack

use thiserror::Error;

use crate::types::Direction;

/// Result type alias for streamstack operations
pub type Result<T> = std::result::Result<T, StreamStackError>;

/// Error types that can occur in streamstack
#[derive(Debug, Error)]
pub enum StreamStackError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration: bad stage name, conflicting stream/option
    /// registration, missing required stage option, or invalid format
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Lookup of a stage that is not registered, or that has no factory
    /// for the requested direction
    #[error("Unknown stage '{name}' for {direction}")]
    UnknownStage {
        /// Requested stage name
        name: String,
        /// Direction the lookup was for
        direction: Direction,
    },

    /// Header failed to parse, cleansed to zero columns, or is missing
    /// required columns
    #[error("Invalid header: {reason}")]
    InvalidHeader {
        /// What went wrong with the header
        reason: String,
    },

    /// Malformed fixed-width layout, or a fixed-format operation attempted
    /// without a supplied layout
    #[error("Invalid layout: {reason}")]
    InvalidLayout {
        /// What went wrong with the layout
        reason: String,
    },

    /// A row parser received input of the wrong shape
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Shape the parser expected
        expected: &'static str,
        /// Description of what it received instead
        actual: String,
    },

    /// A value cannot be rendered into a fixed-width column without
    /// truncation, and truncation is disallowed
    #[error("Value in column '{column}' is {actual} characters, exceeds width {width}")]
    ValueTooLong {
        /// Column the value was destined for
        column: String,
        /// Column width from the layout
        width: usize,
        /// Length of the offending value
        actual: usize,
    },

    /// Compression/decompression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// Encryption/decryption error
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// External command invocation error (e.g. GnuPG)
    #[error("Command error: {0}")]
    Command(String),

    /// JSON parse/render error from the row layer
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
