//! Error types for loam-core

use thiserror::Error;

/// Result type alias using loam-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in loam-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote store error
    #[error("Remote store error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    /// Field translation error
    #[error("Translation error: {0}")]
    Translate(#[from] crate::sync::TranslateError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
