//! Centralized error types for mailkeep.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailkeep library.
///
/// Decode ambiguities, corrupt images and failed PDFs never surface here:
/// they are absorbed by the pipeline and logged. What remains is the
/// short list of conditions a caller genuinely has to act on.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A message identifier cannot be used as a filename stem.
    #[error("Invalid message UID {0:?}")]
    InvalidUid(String),

    /// A record or index document could not be (de)serialized.
    #[error("Serialization error for '{path}': {source}")]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Serialization` variant from a path and a `serde_json::Error`.
    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}
