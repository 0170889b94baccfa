//! The recovery orchestrator.
//!
//! Holds one cipher per security level and drives a recovery: download the
//! content remainder and proof package concurrently, verify the proof,
//! unseal the critical bytes and decrypt the reassembled ciphertext.
//!
//! Cryptographic and download failures come back as an unsuccessful
//! [`RecoveryResult`] naming the failed stage. Only a missing key (or a
//! misconfigured chain) is returned as an `Err`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use blockdrive_crypto::{
    derive_key, parse_proof_json, sha256_hex, DerivedKey, FileMetadata, MetadataEnvelope,
    ProofPackage, RecoveryCipher, SecurityLevel,
};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::chain::{ChainVerifier, FileId, FileRecord, FileStatus, NoChainVerifier, Pubkey};
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::result::{FailureStage, RecoveryResult};
use crate::storage::{ContentStore, FallbackProofStore, IpfsGateways, ProofStoreHttp};

/// One file to recover in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRequest {
    pub content_id: String,
    pub proof_id: String,
    pub level: SecurityLevel,
    pub expected_hash: Option<String>,
}

impl RecoveryRequest {
    pub fn new(content_id: &str, proof_id: &str, level: SecurityLevel) -> Self {
        Self {
            content_id: content_id.to_string(),
            proof_id: proof_id.to_string(),
            level,
            expected_hash: None,
        }
    }

    pub fn with_expected_hash(mut self, hash: &str) -> Self {
        self.expected_hash = Some(hash.to_string());
        self
    }
}

/// JSON stored at a file record's primary CID.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilePointer {
    #[serde(default)]
    content_cid: String,
    #[serde(default)]
    proof_cid: String,
    file_name: Option<String>,
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Default)]
pub struct RecoveryBuilder {
    config: RecoveryConfig,
    signatures: Vec<(SecurityLevel, Zeroizing<Vec<u8>>)>,
    content: Option<Arc<dyn ContentStore>>,
    proofs: Option<Arc<dyn ContentStore>>,
    chain: Option<Arc<dyn ChainVerifier>>,
}

impl RecoveryBuilder {
    pub fn config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Wallet signature over [`SecurityLevel::sign_message`] for `level`.
    pub fn signature(mut self, level: SecurityLevel, signature: &[u8]) -> Self {
        self.signatures.push((level, Zeroizing::new(signature.to_vec())));
        self
    }

    /// Store for encrypted content. Defaults to the configured IPFS gateways.
    pub fn content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.content = Some(store);
        self
    }

    /// Store for proof packages. Defaults to the proof store, falling back
    /// to the content store.
    pub fn proof_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.proofs = Some(store);
        self
    }

    pub fn chain_verifier(mut self, chain: Arc<dyn ChainVerifier>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn build(self) -> Result<Recovery> {
        self.config.validate()?;

        let content: Arc<dyn ContentStore> = match self.content {
            Some(store) => store,
            None => Arc::new(IpfsGateways::from_config(&self.config)?),
        };
        let proofs: Arc<dyn ContentStore> = match self.proofs {
            Some(store) => store,
            None => Arc::new(FallbackProofStore::new(
                Arc::new(ProofStoreHttp::from_config(&self.config)?),
                Arc::clone(&content),
            )),
        };

        let recovery = Recovery {
            keys: RwLock::new(HashMap::new()),
            content,
            proofs,
            chain: self.chain.unwrap_or_else(|| Arc::new(NoChainVerifier)),
            config: self.config,
        };
        for (level, signature) in &self.signatures {
            recovery.add_signature(*level, signature)?;
        }
        Ok(recovery)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Recovery {
    keys: RwLock<HashMap<SecurityLevel, Arc<RecoveryCipher>>>,
    content: Arc<dyn ContentStore>,
    proofs: Arc<dyn ContentStore>,
    chain: Arc<dyn ChainVerifier>,
    config: RecoveryConfig,
}

impl Recovery {
    pub fn builder() -> RecoveryBuilder {
        RecoveryBuilder::default()
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Derive and install the key for `level`, replacing any previous one.
    pub fn add_signature(&self, level: SecurityLevel, signature: &[u8]) -> Result<()> {
        let key = derive_key(signature, level)?;
        self.add_key(level, &key);
        debug!(level = level.as_u8(), "installed key");
        Ok(())
    }

    pub fn add_key(&self, level: SecurityLevel, key: &DerivedKey) {
        self.keys.write().insert(level, Arc::new(RecoveryCipher::new(key)));
    }

    pub fn has_key(&self, level: SecurityLevel) -> bool {
        self.keys.read().contains_key(&level)
    }

    /// Levels with an installed key, ascending.
    pub fn levels(&self) -> Vec<SecurityLevel> {
        let mut levels: Vec<_> = self.keys.read().keys().copied().collect();
        levels.sort();
        levels
    }

    fn cipher(&self, level: SecurityLevel) -> Result<Arc<RecoveryCipher>> {
        self.keys.read().get(&level).cloned().ok_or_else(|| {
            RecoveryError::InvalidState(format!(
                "no key for security level {}; add a signature first",
                level
            ))
        })
    }

    /// Recover one file.
    ///
    /// # Arguments
    /// * `content_id` - Identifier of the stored ciphertext remainder
    /// * `proof_id` - Identifier of the proof package
    /// * `level` - Security level the file was encrypted under
    /// * `expected_hash` - Optional SHA-256 hex of the plaintext
    pub async fn recover_file(
        &self,
        content_id: &str,
        proof_id: &str,
        level: SecurityLevel,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryResult> {
        let cipher = self.cipher(level)?;
        info!(content_id, proof_id, level = level.as_u8(), "recovering file");

        let (content, proof, download_ms) = match self.download_pair(content_id, proof_id).await {
            Ok(downloaded) => downloaded,
            Err(failed) => return Ok(failed),
        };
        let proof = match parse_proof_json(&proof) {
            Ok(proof) => proof,
            Err(e) => return Ok(RecoveryResult::from_crypto(&e).with_timing(download_ms, 0)),
        };
        Ok(decrypt(&cipher, &content, &proof, expected_hash, download_ms))
    }

    /// Blocking form of [`Recovery::recover_file`]. Must not be called from
    /// inside a Tokio runtime.
    pub fn recover_file_blocking(
        &self,
        content_id: &str,
        proof_id: &str,
        level: SecurityLevel,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.recover_file(content_id, proof_id, level, expected_hash))
    }

    /// Recover from bytes already on hand, skipping the stores.
    pub fn recover_from_bytes(
        &self,
        content: &[u8],
        proof: &[u8],
        level: SecurityLevel,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryResult> {
        let cipher = self.cipher(level)?;
        Ok(match parse_proof_json(proof) {
            Ok(proof) => decrypt(&cipher, content, &proof, expected_hash, 0),
            Err(e) => RecoveryResult::from_crypto(&e),
        })
    }

    /// Recover a file after corroborating its proof commitment with the
    /// on-chain record. Without a chain the check is skipped with a warning.
    pub async fn recover_with_verification(
        &self,
        content_id: &str,
        proof_id: &str,
        level: SecurityLevel,
        owner: &Pubkey,
        file_id: &FileId,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryResult> {
        let cipher = self.cipher(level)?;
        if !self.chain.is_available() {
            warn!("on-chain verification unavailable, recovering without it");
            return self.recover_file(content_id, proof_id, level, expected_hash).await;
        }

        let (content, proof, download_ms) = match self.download_pair(content_id, proof_id).await {
            Ok(downloaded) => downloaded,
            Err(failed) => return Ok(failed),
        };
        let proof = match parse_proof_json(&proof) {
            Ok(proof) => proof,
            Err(e) => return Ok(RecoveryResult::from_crypto(&e).with_timing(download_ms, 0)),
        };

        let check = self.chain.verify_commitment(owner, file_id, &proof.commitment).await;
        if !check.verified {
            let reason = check
                .error
                .unwrap_or_else(|| "commitment does not match on-chain record".to_string());
            warn!(%file_id, %reason, "on-chain verification failed");
            return Ok(RecoveryResult::failed(FailureStage::OnChain, reason).with_timing(download_ms, 0));
        }
        if let Some(record) = &check.record {
            if record.security_level != level {
                return Ok(RecoveryResult::failed(
                    FailureStage::OnChain,
                    format!(
                        "security level mismatch: on-chain {}, requested {}",
                        record.security_level, level
                    ),
                )
                .with_timing(download_ms, 0));
            }
        }
        debug!(%file_id, "commitment corroborated on-chain");

        let mut result = decrypt(&cipher, &content, &proof, expected_hash, download_ms);
        result.chain_verified = result.success;
        Ok(result)
    }

    /// Download and decrypt a metadata envelope.
    pub async fn recover_metadata(&self, metadata_id: &str, level: SecurityLevel) -> Result<FileMetadata> {
        let cipher = self.cipher(level)?;
        let download = self
            .content
            .download(metadata_id)
            .await
            .map_err(|e| RecoveryError::Download(e.to_string()))?;
        let envelope = MetadataEnvelope::from_json(&download.data)?;
        Ok(cipher.decrypt_metadata_envelope(&envelope)?)
    }

    /// Recover a file and attach its decrypted metadata.
    ///
    /// Metadata never decides the outcome: a metadata failure is logged and
    /// the recovery result is returned without it. A `contentHash` in the
    /// metadata that disagrees with the plaintext is only logged.
    pub async fn recover_with_metadata(
        &self,
        content_id: &str,
        proof_id: &str,
        metadata_id: &str,
        level: SecurityLevel,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryResult> {
        let metadata = match self.recover_metadata(metadata_id, level).await {
            Ok(metadata) => Some(metadata),
            Err(RecoveryError::InvalidState(msg)) => return Err(RecoveryError::InvalidState(msg)),
            Err(e) => {
                warn!(metadata_id, error = %e, "metadata unavailable");
                None
            }
        };

        let result = self
            .recover_file(content_id, proof_id, level, expected_hash)
            .await?;

        Ok(match metadata {
            Some(metadata) if result.success => {
                if let Some(recorded) = metadata.expected_hash() {
                    let actual = sha256_hex(&result.data);
                    if !actual.eq_ignore_ascii_case(recorded) {
                        warn!(
                            metadata_id,
                            recorded,
                            actual = %actual,
                            "metadata content hash differs from recovered file"
                        );
                    }
                }
                result.with_metadata(metadata)
            }
            _ => result,
        })
    }

    /// Recover the file an on-chain record points at.
    ///
    /// The record's primary CID holds a small JSON pointer with the content
    /// and proof identifiers. The recovered commitment must match the
    /// record's critical-bytes commitment.
    pub async fn recover_file_record(&self, record: &FileRecord) -> Result<RecoveryResult> {
        let level = record.security_level;
        self.cipher(level)?;

        let pointer = match self.content.download(&record.primary_cid).await {
            Ok(download) => download,
            Err(e) => {
                return Ok(RecoveryResult::failed(
                    FailureStage::Download,
                    format!("file pointer {}: {}", record.primary_cid, e),
                ))
            }
        };
        let pointer: FilePointer = match serde_json::from_slice(&pointer.data) {
            Ok(pointer) => pointer,
            Err(e) => {
                return Ok(RecoveryResult::failed(
                    FailureStage::Metadata,
                    format!("invalid file pointer: {}", e),
                ))
            }
        };
        if pointer.content_cid.is_empty() || pointer.proof_cid.is_empty() {
            return Ok(RecoveryResult::failed(
                FailureStage::Metadata,
                "file pointer missing contentCid or proofCid",
            ));
        }

        let mut result = self
            .recover_file(&pointer.content_cid, &pointer.proof_cid, level, None)
            .await?;
        if result.success
            && !result
                .commitment
                .eq_ignore_ascii_case(&record.critical_bytes_commitment)
        {
            return Ok(RecoveryResult::failed(
                FailureStage::OnChain,
                format!(
                    "proof commitment {} does not match on-chain {}",
                    result.commitment, record.critical_bytes_commitment
                ),
            ));
        }
        result.chain_verified = result.success;
        result.file_name = Some(
            pointer
                .file_name
                .unwrap_or_else(|| format!("file_{}", record.file_id)),
        );
        Ok(result)
    }

    /// Recover every non-deleted file in the owner's vault, one result per
    /// record. A record whose level has no key yields a failed result.
    pub async fn recover_all_files(&self, owner: &Pubkey) -> Result<Vec<RecoveryResult>> {
        if !self.chain.is_available() {
            return Err(RecoveryError::Chain(
                "on-chain verification unavailable; cannot list vault files".to_string(),
            ));
        }
        let records = self.chain.fetch_file_records(owner).await?;
        info!(%owner, count = records.len(), "recovering vault");

        let mut results = Vec::with_capacity(records.len());
        for record in &records {
            if record.status == FileStatus::Deleted {
                debug!(file_id = %record.file_id, "skipping deleted file");
                continue;
            }
            let result = match self.recover_file_record(record).await {
                Ok(result) => result,
                Err(RecoveryError::InvalidState(msg)) => {
                    RecoveryResult::failed(FailureStage::KeyLookup, msg)
                }
                Err(e) => return Err(e),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Run many recoveries concurrently. Results come back in request order.
    pub async fn recover_batch(self: &Arc<Self>, requests: Vec<RecoveryRequest>) -> Vec<Result<RecoveryResult>> {
        let count = requests.len();
        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let this = Arc::clone(self);
            tasks.spawn(async move {
                let result = this
                    .recover_file(
                        &request.content_id,
                        &request.proof_id,
                        request.level,
                        request.expected_hash.as_deref(),
                    )
                    .await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<Result<RecoveryResult>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "recovery task did not complete"),
            }
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(RecoveryError::Task("recovery task did not complete".to_string())))
            })
            .collect()
    }

    async fn download_pair(
        &self,
        content_id: &str,
        proof_id: &str,
    ) -> std::result::Result<(Vec<u8>, Vec<u8>, u64), RecoveryResult> {
        let start = Instant::now();
        let (content, proof) = tokio::join!(
            self.content.download(content_id),
            self.proofs.download(proof_id)
        );
        let download_ms = elapsed_ms(start);

        let content = content.map_err(|e| {
            warn!(content_id, error = %e, "content download failed");
            RecoveryResult::failed(FailureStage::Download, format!("content {}: {}", content_id, e))
                .with_timing(download_ms, 0)
        })?;
        let proof = proof.map_err(|e| {
            warn!(proof_id, error = %e, "proof download failed");
            RecoveryResult::failed(FailureStage::Download, format!("proof {}: {}", proof_id, e))
                .with_timing(download_ms, 0)
        })?;
        debug!(
            content_provider = %content.provider,
            proof_provider = %proof.provider,
            content_bytes = content.data.len(),
            download_ms,
            "downloads complete"
        );
        Ok((content.data, proof.data, download_ms))
    }
}

fn decrypt(
    cipher: &RecoveryCipher,
    content: &[u8],
    proof: &ProofPackage,
    expected_hash: Option<&str>,
    download_ms: u64,
) -> RecoveryResult {
    let start = Instant::now();
    let outcome = cipher
        .verify_and_decrypt_proof(proof)
        .and_then(|(critical, nonce)| {
            cipher.decrypt_file(content, &critical, &nonce, &proof.commitment, expected_hash)
        });
    let decryption_ms = elapsed_ms(start);

    match outcome {
        Ok(data) => {
            info!(bytes = data.len(), decryption_ms, "file recovered");
            RecoveryResult::ok(data, proof.commitment.clone()).with_timing(download_ms, decryption_ms)
        }
        Err(e) => {
            warn!(error = %e, "recovery failed");
            RecoveryResult::from_crypto(&e).with_timing(download_ms, decryption_ms)
        }
    }
}
