//! HKDF-SHA256 key derivation from wallet signatures.

use std::collections::HashMap;

use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;
use crate::types::{DerivedKey, SecurityLevel, AES_KEY_LENGTH, HKDF_SALT};

/// Derive a 256-bit key using HKDF-SHA256.
///
/// # Arguments
/// * `ikm` - Input keying material (any non-empty length)
/// * `salt` - Salt for domain separation
/// * `info` - Context and application-specific info
///
/// # Returns
/// 32-byte derived key
pub fn hkdf_derive(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; AES_KEY_LENGTH], CryptoError> {
    if ikm.is_empty() {
        return Err(CryptoError::InvalidParameter(
            "key material must not be empty".to_string(),
        ));
    }
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = [0u8; AES_KEY_LENGTH];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::InvalidParameter(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Derive the AES-256 key for a security level from a wallet signature.
///
/// The signature is the HKDF input key material; salt is fixed and the
/// info string is `blockdrive-level-{N}-encryption`.
pub fn derive_key(signature: &[u8], level: SecurityLevel) -> Result<DerivedKey, CryptoError> {
    hkdf_derive(signature, HKDF_SALT, level.hkdf_info()).map(DerivedKey::from_bytes)
}

/// Same as [`derive_key`] but takes the level as a raw number, rejecting
/// anything outside 1..=3 before touching HKDF.
pub fn derive_key_from_raw_level(signature: &[u8], level: u8) -> Result<DerivedKey, CryptoError> {
    let level = SecurityLevel::try_from(level)?;
    derive_key(signature, level)
}

/// Derive one key per supplied (level, signature) pair.
pub fn derive_all_keys<'a, I>(signatures: I) -> Result<HashMap<SecurityLevel, DerivedKey>, CryptoError>
where
    I: IntoIterator<Item = (SecurityLevel, &'a [u8])>,
{
    signatures
        .into_iter()
        .map(|(level, sig)| derive_key(sig, level).map(|key| (level, key)))
        .collect()
}

/// Fingerprint a signature for out-of-band key verification.
///
/// `sha256(signature || "-level-{N}-hash")` as lowercase hex. Reveals
/// nothing about the derived key.
pub fn generate_key_hash(signature: &[u8], level: SecurityLevel) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature);
    hasher.update(format!("-level-{}-hash", level.as_u8()).as_bytes());
    hex::encode(hasher.finalize())
}

/// The message a wallet must sign to produce key material for `level`.
pub fn sign_message(level: SecurityLevel) -> &'static str {
    level.sign_message()
}
