//! Error types for codesync-core

use std::path::PathBuf;

/// Result type for codesync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or running a sync session
///
/// Transfer failures are deliberately absent: they are rendered as output
/// lines and never stop a session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source directory does not exist or cannot be resolved
    #[error("Source path {path} could not be resolved: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The recursive watch subscription could not be established
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Settings file is missing
    #[error("Settings file {path} not found")]
    SettingsNotFound { path: PathBuf },

    /// Settings file exists but is not a valid settings record
    #[error("Invalid settings file format in {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Exit signal listeners could not be registered
    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
