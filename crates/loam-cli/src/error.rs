use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] loam_core::Error),
    #[error(transparent)]
    Remote(#[from] loam_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note not found for server id: {0}")]
    NoteNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Set LOAM_SERVER_URL, LOAM_IDENTITY and LOAM_PASSWORD (an .env file works too)."
    )]
    SyncNotConfigured,
}
