use std::fmt;

use blockdrive_crypto::{CryptoError, ErrorKind, FileMetadata};

/// Where a recovery attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    KeyLookup,
    Download,
    ProofParse,
    Integrity,
    Decryption,
    Commitment,
    ContentHash,
    OnChain,
    Metadata,
}

impl FailureStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::KeyLookup => "key lookup",
            Self::Download => "download",
            Self::ProofParse => "proof parse",
            Self::Integrity => "integrity check",
            Self::Decryption => "decryption",
            Self::Commitment => "commitment check",
            Self::ContentHash => "content hash check",
            Self::OnChain => "on-chain verification",
            Self::Metadata => "metadata",
        }
    }

    pub fn from_crypto(err: &CryptoError) -> Self {
        match err.kind() {
            ErrorKind::InvalidParameter | ErrorKind::MalformedProof => Self::ProofParse,
            ErrorKind::IntegrityFailure => Self::Integrity,
            ErrorKind::DecryptionFailure => Self::Decryption,
            ErrorKind::CommitmentMismatch => Self::Commitment,
            ErrorKind::ContentHashMismatch => Self::ContentHash,
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one file recovery. `data` is empty unless `success`.
#[derive(Clone, Default, PartialEq)]
pub struct RecoveryResult {
    pub success: bool,
    pub data: Vec<u8>,
    pub commitment: String,
    /// Proof and commitment checks passed (and the content hash, if given).
    pub verified: bool,
    /// The commitment was corroborated by an on-chain record.
    pub chain_verified: bool,
    /// Stage-qualified description, e.g. `"download failed: ..."`.
    pub error: Option<String>,
    pub stage: Option<FailureStage>,
    pub metadata: Option<FileMetadata>,
    /// Suggested output name, when a pointer or metadata supplied one.
    pub file_name: Option<String>,
    pub download_ms: u64,
    pub decryption_ms: u64,
}

impl RecoveryResult {
    pub fn ok(data: Vec<u8>, commitment: String) -> Self {
        Self {
            success: true,
            data,
            commitment,
            verified: true,
            ..Self::default()
        }
    }

    pub fn failed(stage: FailureStage, message: impl fmt::Display) -> Self {
        Self {
            error: Some(format!("{} failed: {}", stage.label(), message)),
            stage: Some(stage),
            ..Self::default()
        }
    }

    pub(crate) fn from_crypto(err: &CryptoError) -> Self {
        Self::failed(FailureStage::from_crypto(err), err)
    }

    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        if self.file_name.is_none() {
            self.file_name = Some(metadata.file_name.clone());
        }
        self.metadata = Some(metadata);
        self
    }

    pub fn with_timing(mut self, download_ms: u64, decryption_ms: u64) -> Self {
        self.download_ms = download_ms;
        self.decryption_ms = decryption_ms;
        self
    }
}

// Plaintext stays out of logs.
impl fmt::Debug for RecoveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryResult")
            .field("success", &self.success)
            .field("data_len", &self.data.len())
            .field("commitment", &self.commitment)
            .field("verified", &self.verified)
            .field("chain_verified", &self.chain_verified)
            .field("error", &self.error)
            .field("stage", &self.stage)
            .field("file_name", &self.file_name)
            .finish()
    }
}
