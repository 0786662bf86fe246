//! Centralized error types for eml2pdf.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the eml2pdf library.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("EML file not found: {0}")]
    FileNotFound(PathBuf),

    /// The message could not be parsed as MIME at all.
    #[error("Cannot parse '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The rendering backend failed to produce a document.
    #[error("Render error: {0}")]
    Render(String),

    /// The page size/orientation string is not recognised.
    #[error("Invalid page specification '{0}' (expected e.g. 'a4' or 'letter landscape')")]
    InvalidPageSpec(String),

    /// The worker pool could not be started.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `ConvertError::io`).
impl From<std::io::Error> for ConvertError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
