//! Error types for analysis sessions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that end an analysis session.
///
/// Per-entry problems never surface here; they are recorded as
/// [`SkipWarning`]s and the walk continues.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Root path does not exist.
    #[error("Path not found: {path}")]
    PathNotFound { path: PathBuf },

    /// Root path exists but is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Permission denied on the root itself.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// I/O failure on the root itself.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The consumer went away or the session was cancelled.
    #[error("Analysis session aborted")]
    SessionAborted,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl AnalysisError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::PathNotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error means the consumer is gone and nothing more should be sent.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::SessionAborted)
    }
}

/// Errors raised while persisting a finished result.
///
/// These never invalidate the computed result; they only change the
/// session's terminal outcome from "saved" to "not saved".
#[derive(Debug, Error)]
pub enum PersistError {
    /// Writing to the results directory failed.
    #[error("Failed to write results at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the summary failed.
    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Persistence did not finish in time.
    #[error("Persisting results timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl PersistError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Kind of skipped entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading file contents or a directory listing.
    ReadError,
    /// Error reading metadata.
    MetadataError,
    /// Entry disappeared during the walk.
    Vanished,
}

/// Non-fatal problem with a single entry; the entry contributes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl SkipWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning from an I/O error, picking the kind from the error.
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::PermissionDenied => WarningKind::PermissionDenied,
            std::io::ErrorKind::NotFound => WarningKind::Vanished,
            _ => WarningKind::ReadError,
        };
        Self::new(path, error.to_string(), kind)
    }
}
