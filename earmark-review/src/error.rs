//! Error types for earmark-review

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the review runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Shared configuration/store errors
    #[error(transparent)]
    Common(#[from] earmark_common::Error),

    /// Table engine errors
    #[error(transparent)]
    Table(#[from] earmark_table::TableError),

    /// Tag store query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Directory scan errors
    #[error(transparent)]
    Scan(#[from] crate::scanner::ScanError),

    /// Tag store exists but is not a usable SQLite file
    #[error("Tag store {} is corrupt: {reason}", path.display())]
    TagStoreCorrupt { path: PathBuf, reason: String },

    /// Tagging requested before any import located a tag store
    #[error("No tag store for the current table")]
    NoTagStore,

    /// Write access to the tag store was refused
    #[error("No write permission for {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// A background worker stopped or dropped its reply
    #[error("Worker error: {0}")]
    Worker(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using earmark-review Error
pub type Result<T> = std::result::Result<T, Error>;
