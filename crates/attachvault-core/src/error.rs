//! Error types for the sync engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::service::ServiceError;

/// Errors that can occur during a sync run.
#[derive(Debug, Error)]
pub enum Error {
    /// A message-source or file-store call failed.
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// An upload kept failing until the retry bound was exhausted.
    #[error("Upload of {filename} failed after {attempts} attempts: {source}")]
    Transfer {
        /// Name of the file being uploaded.
        filename: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: ServiceError,
    },

    /// Writing the dedup ledger failed.
    #[error("Failed to write ledger {}: {source}", path.display())]
    Ledger {
        /// Ledger file being written.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
