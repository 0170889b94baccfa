use blockdrive_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recovery task failed: {0}")]
    Task(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
