//! Proof extraction and split-ciphertext reconstruction.
//!
//! Content storage holds the file ciphertext minus its first 16 bytes. Those
//! critical bytes and the file IV are sealed inside the proof package:
//!
//! sealed payload: [critical bytes:16][file IV:12]
//! file ciphertext: [critical bytes:16][remainder ... tag:16]

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::{b64decode, sha256_hex, verify_commitment};
use crate::metadata::{FileMetadata, MetadataEnvelope};
use crate::proof::{verify_proof_integrity, ProofPackage};
use crate::types::{
    CriticalBytes, DerivedKey, FileNonce, AES_GCM_IV_LENGTH, CRITICAL_BYTES_LENGTH,
    PROOF_PAYLOAD_LENGTH,
};

/// AES-256-GCM cipher bound to one derived key.
pub struct RecoveryCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for RecoveryCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryCipher { .. }")
    }
}

/// Payload shape sealed by older producers: `{"bytes": "<base64>"}`.
#[derive(Deserialize)]
struct LegacyPayload {
    bytes: String,
}

impl RecoveryCipher {
    pub fn new(key: &DerivedKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes())),
        }
    }

    /// Create a cipher from raw key bytes.
    ///
    /// # Arguments
    /// * `key` - 32-byte (256-bit) raw key material
    pub fn from_slice(key: &[u8]) -> Result<Self, CryptoError> {
        DerivedKey::from_slice(key).map(|k| Self::new(&k))
    }

    /// Verify a proof package and unseal its critical bytes and file IV.
    ///
    /// Checks run in a fixed order: proof hash, payload decryption, payload
    /// length, commitment. Nothing is decrypted for a package whose hash
    /// does not match.
    pub fn verify_and_decrypt_proof(
        &self,
        proof: &ProofPackage,
    ) -> Result<(CriticalBytes, FileNonce), CryptoError> {
        if !verify_proof_integrity(proof) {
            return Err(CryptoError::IntegrityFailure);
        }

        let sealed = b64decode(&proof.encrypted_critical_bytes)
            .map_err(|_| CryptoError::ProofDecryptionFailed)?;
        let iv = b64decode(&proof.encryption_iv).map_err(|_| CryptoError::ProofDecryptionFailed)?;
        if iv.len() != AES_GCM_IV_LENGTH {
            return Err(CryptoError::ProofDecryptionFailed);
        }
        let payload = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
                .map_err(|_| CryptoError::ProofDecryptionFailed)?,
        );

        let (critical, nonce) = match legacy_split(&payload, proof)? {
            Some(split) => split,
            None => split_payload(&payload)?,
        };

        if !verify_commitment(critical.as_bytes(), &proof.commitment) {
            return Err(CryptoError::CommitmentMismatch {
                expected: proof.commitment.clone(),
                actual: sha256_hex(critical.as_bytes()),
            });
        }
        Ok((critical, nonce))
    }

    /// Reassemble `critical || remainder` and decrypt it.
    ///
    /// # Arguments
    /// * `remainder` - Stored ciphertext, everything after the first 16 bytes
    /// * `critical` - The 16 bytes unsealed from the proof
    /// * `nonce` - The file IV unsealed from the proof
    /// * `commitment` - Expected SHA-256 hex of `critical`
    /// * `expected_hash` - Optional SHA-256 hex of the plaintext
    pub fn decrypt_file(
        &self,
        remainder: &[u8],
        critical: &CriticalBytes,
        nonce: &FileNonce,
        commitment: &str,
        expected_hash: Option<&str>,
    ) -> Result<Vec<u8>, CryptoError> {
        if !verify_commitment(critical.as_bytes(), commitment) {
            return Err(CryptoError::CommitmentMismatch {
                expected: commitment.to_string(),
                actual: sha256_hex(critical.as_bytes()),
            });
        }

        let mut full = Vec::with_capacity(CRITICAL_BYTES_LENGTH + remainder.len());
        full.extend_from_slice(critical.as_bytes());
        full.extend_from_slice(remainder);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce.as_bytes()), full.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        if let Some(expected) = expected_hash.filter(|h| !h.is_empty()) {
            let actual = sha256_hex(&plaintext);
            if actual != expected.to_ascii_lowercase() {
                return Err(CryptoError::ContentHashMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(plaintext)
    }

    /// Decrypt a base64 metadata blob into [`FileMetadata`].
    pub fn decrypt_metadata(
        &self,
        encrypted_b64: &str,
        iv_b64: &str,
    ) -> Result<FileMetadata, CryptoError> {
        let fail = |msg: &str| CryptoError::MetadataFailed(msg.to_string());
        let sealed = b64decode(encrypted_b64).map_err(|_| fail("invalid base64 ciphertext"))?;
        let iv = b64decode(iv_b64).map_err(|_| fail("invalid base64 IV"))?;
        if iv.len() != AES_GCM_IV_LENGTH {
            return Err(fail("IV must be 12 bytes"));
        }
        let json = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
                .map_err(|_| fail("wrong key or corrupted data"))?,
        );
        serde_json::from_slice(&json)
            .map_err(|e| CryptoError::MetadataFailed(format!("invalid metadata JSON: {}", e)))
    }

    pub fn decrypt_metadata_envelope(
        &self,
        envelope: &MetadataEnvelope,
    ) -> Result<FileMetadata, CryptoError> {
        self.decrypt_metadata(&envelope.encrypted_metadata, &envelope.metadata_iv)
    }
}

fn split_payload(payload: &[u8]) -> Result<(CriticalBytes, FileNonce), CryptoError> {
    if payload.len() < PROOF_PAYLOAD_LENGTH {
        return Err(CryptoError::PayloadTooShort {
            expected: PROOF_PAYLOAD_LENGTH,
            got: payload.len(),
        });
    }
    let mut critical = [0u8; CRITICAL_BYTES_LENGTH];
    critical.copy_from_slice(&payload[..CRITICAL_BYTES_LENGTH]);
    let nonce = FileNonce::from_slice(&payload[CRITICAL_BYTES_LENGTH..PROOF_PAYLOAD_LENGTH])?;
    Ok((CriticalBytes(critical), nonce))
}

/// Older packages seal only the critical bytes (raw or JSON-wrapped) and
/// carry the file IV in `encryptedIv`. Returns `None` for the sealed layout.
fn legacy_split(
    payload: &[u8],
    proof: &ProofPackage,
) -> Result<Option<(CriticalBytes, FileNonce)>, CryptoError> {
    let Some(file_iv) = proof.encrypted_iv.as_deref() else {
        return Ok(None);
    };

    let critical = if payload.len() == CRITICAL_BYTES_LENGTH {
        Zeroizing::new(payload.to_vec())
    } else if payload.first() == Some(&b'{') {
        match serde_json::from_slice::<LegacyPayload>(payload) {
            Ok(wrapped) => Zeroizing::new(b64decode(&wrapped.bytes)?),
            Err(_) => return Ok(None),
        }
    } else {
        return Ok(None);
    };

    let critical: [u8; CRITICAL_BYTES_LENGTH] =
        critical.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedProof("legacy payload must hold 16 critical bytes".to_string())
        })?;
    let nonce = FileNonce::from_slice(&b64decode(file_iv)?)?;
    Ok(Some((CriticalBytes(critical), nonce)))
}

/// Verify `proof` and unseal it with `key`. See
/// [`RecoveryCipher::verify_and_decrypt_proof`].
pub fn verify_and_decrypt_proof(
    key: &DerivedKey,
    proof: &ProofPackage,
) -> Result<(CriticalBytes, FileNonce), CryptoError> {
    RecoveryCipher::new(key).verify_and_decrypt_proof(proof)
}

/// Reassemble and decrypt a file with `key`. See
/// [`RecoveryCipher::decrypt_file`].
pub fn decrypt_file(
    key: &DerivedKey,
    remainder: &[u8],
    critical: &CriticalBytes,
    nonce: &FileNonce,
    commitment: &str,
    expected_hash: Option<&str>,
) -> Result<Vec<u8>, CryptoError> {
    RecoveryCipher::new(key).decrypt_file(remainder, critical, nonce, commitment, expected_hash)
}
