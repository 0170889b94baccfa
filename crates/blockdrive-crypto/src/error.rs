use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    #[error("Proof integrity verification failed: data may be tampered")]
    IntegrityFailure,

    #[error("Failed to decrypt proof: wrong key or corrupted data")]
    ProofDecryptionFailed,

    #[error("Decrypted payload too short: {got} bytes, expected >= {expected}")]
    PayloadTooShort { expected: usize, got: usize },

    #[error("Commitment mismatch: expected {expected}, got {actual}")]
    CommitmentMismatch { expected: String, actual: String },

    #[error("AES-GCM authentication failed: wrong key or nonce, or corrupted content")]
    DecryptionFailed,

    #[error("Content hash verification failed: expected {expected}, got {actual}")]
    ContentHashMismatch { expected: String, actual: String },

    #[error("Metadata decryption failed: {0}")]
    MetadataFailed(String),
}

/// Failure classes, coarse enough for callers to branch on without matching
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    MalformedProof,
    IntegrityFailure,
    DecryptionFailure,
    CommitmentMismatch,
    ContentHashMismatch,
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) | Self::InvalidKeyLength { .. } => ErrorKind::InvalidParameter,
            Self::MalformedProof(_) => ErrorKind::MalformedProof,
            Self::IntegrityFailure => ErrorKind::IntegrityFailure,
            // A short payload authenticated fine, so the envelope itself is malformed.
            Self::PayloadTooShort { .. } => ErrorKind::MalformedProof,
            Self::ProofDecryptionFailed | Self::DecryptionFailed | Self::MetadataFailed(_) => {
                ErrorKind::DecryptionFailure
            }
            Self::CommitmentMismatch { .. } => ErrorKind::CommitmentMismatch,
            Self::ContentHashMismatch { .. } => ErrorKind::ContentHashMismatch,
        }
    }
}
