//! Centralized error types for buildmail.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the buildmail library.
#[derive(Error, Debug)]
pub enum AttachError {
    /// I/O error with the associated file path.
    #[error("I/O error accessing '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No workspace was resolved for the build.
    #[error("No workspace found")]
    NoWorkspace,

    /// A glob pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The MIME wrapper around an attachment could not be built.
    #[error("{0}")]
    Messaging(String),

    /// Archiving the build log failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Collection was interrupted by an external cancellation.
    #[error("Operation interrupted")]
    Interrupted,

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, AttachError>`.
pub type Result<T> = std::result::Result<T, AttachError>;

impl AttachError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (prefer `AttachError::io`).
impl From<std::io::Error> for AttachError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

impl From<zip::result::ZipError> for AttachError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Compression(e.to_string())
    }
}
