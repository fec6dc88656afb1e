//! Error types for snapshot providers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors a snapshot provider can report.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backing source could not be reached or is not ready.
    #[error("snapshot source unavailable: {message}")]
    Unavailable {
        /// Human-readable reason.
        message: String,
    },

    /// I/O error while reading a snapshot file.
    #[error("failed to read library snapshot '{path}': {source}")]
    Io {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Snapshot file contents were not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        ProviderError::Unavailable {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }
}
