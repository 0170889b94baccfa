use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// AES-GCM IV length in bytes. Every nonce in the scheme is 96 bits.
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes, appended to the ciphertext.
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// Number of leading ciphertext bytes held back from content storage.
pub const CRITICAL_BYTES_LENGTH: usize = 16;

/// Sealed proof payload layout: [critical bytes:16][file IV:12].
pub const PROOF_PAYLOAD_LENGTH: usize = CRITICAL_BYTES_LENGTH + AES_GCM_IV_LENGTH;

/// HKDF salt shared by every security level.
pub const HKDF_SALT: &[u8] = b"BlockDrive-HKDF-Salt-v1";

/// Security level a file was encrypted under.
///
/// Each level has its own wallet message and HKDF info string, so one
/// wallet yields three unrelated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityLevel {
    Standard = 1,
    Sensitive = 2,
    Maximum = 3,
}

impl SecurityLevel {
    pub const ALL: [SecurityLevel; 3] = [Self::Standard, Self::Sensitive, Self::Maximum];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Convert the zero-indexed level stored in on-chain records.
    pub fn from_on_chain(raw: u8) -> Result<Self, CryptoError> {
        raw.checked_add(1)
            .ok_or_else(|| {
                CryptoError::InvalidParameter(format!("unknown on-chain security level {raw}"))
            })
            .and_then(Self::try_from)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Sensitive => "Sensitive",
            Self::Maximum => "Maximum",
        }
    }

    /// HKDF info string: `blockdrive-level-{N}-encryption`.
    pub fn hkdf_info(self) -> &'static [u8] {
        match self {
            Self::Standard => b"blockdrive-level-1-encryption",
            Self::Sensitive => b"blockdrive-level-2-encryption",
            Self::Maximum => b"blockdrive-level-3-encryption",
        }
    }

    /// Message the wallet signs to produce key material for this level.
    pub fn sign_message(self) -> &'static str {
        match self {
            Self::Standard => "BlockDrive Security Level One - Standard Protection",
            Self::Sensitive => "BlockDrive Security Level Two - Sensitive Data Protection",
            Self::Maximum => "BlockDrive Security Level Three - Maximum Security",
        }
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Standard),
            2 => Ok(Self::Sensitive),
            3 => Ok(Self::Maximum),
            other => Err(CryptoError::InvalidParameter(format!(
                "unknown security level {other} (expected 1, 2 or 3)"
            ))),
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.name())
    }
}

/// A 256-bit AES key derived from a wallet signature. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; AES_KEY_LENGTH]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; AES_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; AES_KEY_LENGTH] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: AES_KEY_LENGTH,
                got: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// The first 16 bytes of the full file ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalBytes(pub [u8; CRITICAL_BYTES_LENGTH]);

impl CriticalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The 12-byte IV the file was encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNonce(pub [u8; AES_GCM_IV_LENGTH]);

impl FileNonce {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; AES_GCM_IV_LENGTH] =
            bytes.try_into().map_err(|_| {
                CryptoError::InvalidParameter(format!(
                    "file IV must be {AES_GCM_IV_LENGTH} bytes, got {}",
                    bytes.len()
                ))
            })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
