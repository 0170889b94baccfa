//! Recover BlockDrive files without the BlockDrive platform.
//!
//! A [`Recovery`] holds keys derived from wallet signatures, fetches the
//! stored ciphertext and its proof package through [`ContentStore`]s, and
//! hands both to the `blockdrive-crypto` pipeline.

pub mod chain;
pub mod config;
pub mod error;
pub mod filebase;
pub mod recovery;
pub mod result;
pub mod storage;

pub use blockdrive_crypto::{FileMetadata, SecurityLevel};
pub use chain::{
    ChainVerification, ChainVerifier, FileId, FileRecord, FileStatus, InMemoryChain,
    NoChainVerifier, Pubkey,
};
#[cfg(feature = "solana")]
pub use chain::{find_program_address, SolanaRpcVerifier};
pub use config::{FilebaseCredentials, Network, RecoveryConfig, StorageProvider};
pub use error::{RecoveryError, Result};
#[cfg(feature = "s3")]
pub use filebase::FilebaseS3;
pub use filebase::{build_object_key, parse_object_key, KeyScope, StorageContext};
pub use recovery::{Recovery, RecoveryBuilder, RecoveryRequest};
pub use result::{FailureStage, RecoveryResult};
pub use storage::{
    ContentStore, Download, DownloadError, FallbackProofStore, InMemoryStore, IpfsGateways,
    ProofStoreHttp,
};
