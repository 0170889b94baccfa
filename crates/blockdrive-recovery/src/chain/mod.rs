//! Optional on-chain corroboration of proof commitments.
//!
//! Recovery never requires a chain. [`NoChainVerifier`] is the default and
//! reports itself unavailable; the RPC client is compiled in only with the
//! `solana` feature.

mod record;
#[cfg(feature = "solana")]
mod rpc;

use parking_lot::RwLock;

pub use record::{FileId, FileRecord, FileStatus, Pubkey};
#[cfg(feature = "solana")]
pub use rpc::{find_program_address, SolanaRpcVerifier};

use crate::error::{RecoveryError, Result};

/// Outcome of comparing a commitment with the on-chain record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub verified: bool,
    pub on_chain: bool,
    pub commitment_matches: bool,
    pub record: Option<FileRecord>,
    pub error: Option<String>,
}

impl ChainVerification {
    fn failed(on_chain: bool, error: String) -> Self {
        Self {
            verified: false,
            on_chain,
            commitment_matches: false,
            record: None,
            error: Some(error),
        }
    }
}

#[async_trait::async_trait]
pub trait ChainVerifier: Send + Sync {
    /// Whether this verifier can reach a chain at all.
    fn is_available(&self) -> bool {
        true
    }

    async fn fetch_file_record(&self, owner: &Pubkey, file_id: &FileId) -> Result<Option<FileRecord>>;

    /// Every file record in the owner's vault.
    async fn fetch_file_records(&self, owner: &Pubkey) -> Result<Vec<FileRecord>>;

    /// Compare `expected` (hex, any case) with the record's critical-bytes
    /// commitment. Never fails; problems are reported in the result.
    async fn verify_commitment(
        &self,
        owner: &Pubkey,
        file_id: &FileId,
        expected: &str,
    ) -> ChainVerification {
        match self.fetch_file_record(owner, file_id).await {
            Ok(Some(record)) => {
                let matches = record.critical_bytes_commitment.eq_ignore_ascii_case(expected);
                ChainVerification {
                    verified: matches,
                    on_chain: true,
                    commitment_matches: matches,
                    record: Some(record),
                    error: None,
                }
            }
            Ok(None) => ChainVerification::failed(false, "File not found on-chain".to_string()),
            Err(e) => ChainVerification::failed(false, e.to_string()),
        }
    }
}

/// Verifier used when no chain client is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoChainVerifier;

fn unavailable() -> RecoveryError {
    RecoveryError::Chain("on-chain verification unavailable".to_string())
}

#[async_trait::async_trait]
impl ChainVerifier for NoChainVerifier {
    fn is_available(&self) -> bool {
        false
    }

    async fn fetch_file_record(&self, _owner: &Pubkey, _file_id: &FileId) -> Result<Option<FileRecord>> {
        Err(unavailable())
    }

    async fn fetch_file_records(&self, _owner: &Pubkey) -> Result<Vec<FileRecord>> {
        Err(unavailable())
    }
}

/// Fixed set of records, for offline use and tests.
#[derive(Default)]
pub struct InMemoryChain {
    records: RwLock<Vec<FileRecord>>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: FileRecord) {
        let mut records = self.records.write();
        records.retain(|r| !(r.owner == record.owner && r.file_id == record.file_id));
        records.push(record);
    }
}

#[async_trait::async_trait]
impl ChainVerifier for InMemoryChain {
    async fn fetch_file_record(&self, owner: &Pubkey, file_id: &FileId) -> Result<Option<FileRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| &r.owner == owner && &r.file_id == file_id)
            .cloned())
    }

    async fn fetch_file_records(&self, owner: &Pubkey) -> Result<Vec<FileRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| &r.owner == owner)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockdrive_crypto::SecurityLevel;

    fn record(owner: Pubkey, file_id: FileId, commitment: &str) -> FileRecord {
        FileRecord {
            vault: Pubkey([0; 32]),
            owner,
            file_id,
            filename_hash: [0; 32],
            file_size: 0,
            encrypted_size: 0,
            mime_type_hash: [0; 32],
            security_level: SecurityLevel::Standard,
            encryption_commitment: String::new(),
            critical_bytes_commitment: commitment.to_string(),
            primary_cid: String::new(),
            redundancy_cid: String::new(),
            provider_count: 1,
            created_at: 0,
            accessed_at: 0,
            status: FileStatus::Active,
            is_shared: false,
            delegation_count: 0,
        }
    }

    #[tokio::test]
    async fn no_chain_is_unavailable() {
        let verifier = NoChainVerifier;
        assert!(!verifier.is_available());
        let result = verifier
            .verify_commitment(&Pubkey([1; 32]), &FileId([2; 16]), "00")
            .await;
        assert!(!result.verified);
        assert!(result.error.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn commitment_comparison_ignores_case() {
        let chain = InMemoryChain::new();
        let owner = Pubkey([1; 32]);
        let id = FileId([2; 16]);
        chain.insert(record(owner, id, &"ab".repeat(32)));

        let ok = chain.verify_commitment(&owner, &id, &"AB".repeat(32)).await;
        assert!(ok.verified && ok.on_chain && ok.commitment_matches);

        let bad = chain.verify_commitment(&owner, &id, &"00".repeat(32)).await;
        assert!(!bad.verified);
        assert!(bad.on_chain);
        assert!(bad.record.is_some());
    }

    #[tokio::test]
    async fn missing_record_is_not_on_chain() {
        let chain = InMemoryChain::new();
        let result = chain.verify_commitment(&Pubkey([1; 32]), &FileId([2; 16]), "00").await;
        assert!(!result.on_chain);
        assert_eq!(result.error.as_deref(), Some("File not found on-chain"));
    }

    #[tokio::test]
    async fn records_are_listed_per_owner() {
        let chain = InMemoryChain::new();
        chain.insert(record(Pubkey([1; 32]), FileId([1; 16]), "00"));
        chain.insert(record(Pubkey([1; 32]), FileId([2; 16]), "00"));
        chain.insert(record(Pubkey([3; 32]), FileId([3; 16]), "00"));
        assert_eq!(chain.fetch_file_records(&Pubkey([1; 32])).await.unwrap().len(), 2);
    }
}
