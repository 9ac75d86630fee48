//! Error types for the extraction and export engine
//!
//! Only request-level failures surface here. Per-table and per-file problems
//! during extraction are carried as [`ExtractionDiagnostic`](crate::models::ExtractionDiagnostic)
//! values and never become an `EngineError`.

use std::io;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while ingesting evidence or producing an export
#[derive(Debug, Error)]
pub enum EngineError {
    /// Referenced case or evidence set does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// Unsupported export format, unknown record class, or nothing to export
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// A digest did not reproduce over the bytes it was advertised for
    #[error("Integrity check failed: {0}")]
    Integrity(String),
    /// I/O error (temp storage, artifact files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// SQLite error from the ledger
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// ZIP read/write error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
    /// Ledger collaborator failure
    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl EngineError {
    /// True for failures caused by the caller's request rather than the engine
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::NotFound(_) | EngineError::InvalidFormat(_))
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for EngineError {
    fn from(err: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        EngineError::Io(err.into_error())
    }
}
