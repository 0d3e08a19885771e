//! Error types for the table engine
//!
//! Malformed-input variants are normally logged and skipped by the caller;
//! `ForeignRowRef`, `StaleRowRef` and `UnknownTagType` signal a programming
//! error in a collaborator and are meant to be propagated.

use thiserror::Error;

/// Table engine error
#[derive(Error, Debug)]
pub enum TableError {
    /// Input had no content after comments were skipped
    #[error("No contents in {0}")]
    EmptyInput(String),

    /// An entry could not be split into `key = value` fields
    #[error("Malformed entry at line {line}: {reason}")]
    MalformedEntry { line: usize, reason: String },

    /// A regex criterion failed to compile
    #[error("Invalid regex \"{pattern}\": {message}")]
    RegexSyntax { pattern: String, message: String },

    /// Column name outside the canonical schema
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Comparison operator outside the supported set
    #[error("Unsupported operator: {0}")]
    UnknownOperator(String),

    /// Tag type other than skip/flag
    #[error("Unknown tag: {0}. Valid set: skip, flag")]
    UnknownTagType(String),

    /// Row reference derived from a different table instance
    #[error("Row reference belongs to a different table")]
    ForeignRowRef,

    /// Row reference names no record of this table
    #[error("Row reference does not name a record of this table")]
    StaleRowRef,

    /// Row reference points past the end of the table
    #[error("Row {index} out of range for table of {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for the table engine
pub type Result<T> = std::result::Result<T, TableError>;
