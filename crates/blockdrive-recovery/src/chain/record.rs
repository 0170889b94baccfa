//! Fixed-layout on-chain file record.

use std::fmt;
use std::str::FromStr;

use blockdrive_crypto::SecurityLevel;

use crate::error::{RecoveryError, Result};

/// A 32-byte Solana public key, base58 on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl FromStr for Pubkey {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| RecoveryError::Chain(format!("invalid public key {}: {}", s, e)))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            RecoveryError::Chain(format!(
                "invalid public key {}: expected 32 bytes, got {}",
                s,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

/// 16-byte file identifier. Parses UUIDs with or without dashes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub [u8; 16]);

impl FromStr for FileId {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s.trim())
            .map(|id| Self(*id.as_bytes()))
            .map_err(|e| RecoveryError::Chain(format!("invalid file id {}: {}", s, e)))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Active,
    Archived,
    Deleted,
    Unknown(u8),
}

impl From<u8> for FileStatus {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::Active,
            1 => Self::Archived,
            2 => Self::Deleted,
            other => Self::Unknown(other),
        }
    }
}

/// Decoded file record account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub vault: Pubkey,
    pub owner: Pubkey,
    pub file_id: FileId,
    pub filename_hash: [u8; 32],
    pub file_size: u64,
    pub encrypted_size: u64,
    pub mime_type_hash: [u8; 32],
    pub security_level: SecurityLevel,
    /// Lowercase hex.
    pub encryption_commitment: String,
    /// Lowercase hex SHA-256 of the critical bytes.
    pub critical_bytes_commitment: String,
    pub primary_cid: String,
    pub redundancy_cid: String,
    pub provider_count: u8,
    pub created_at: i64,
    pub accessed_at: i64,
    pub status: FileStatus,
    pub is_shared: bool,
    pub delegation_count: u8,
}

/// Little-endian cursor over account bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    fn padded_str<const N: usize>(&mut self) -> String {
        let raw = self.take::<N>();
        let end = raw.iter().position(|b| *b == 0).unwrap_or(N);
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }
}

impl FileRecord {
    pub const DISCRIMINATOR_LEN: usize = 8;

    /// Account size including the 8-byte discriminator.
    pub const SIZE: usize = 8 + 1 + 32 + 32 + 16 + 32 + 8 + 8 + 32 + 1 + 32 + 32 + 64 + 64 + 1 + 8 + 8 + 1 + 1 + 1 + 32;

    /// Byte offset of `owner`, used for account filtering.
    pub const OWNER_OFFSET: usize = 8 + 1 + 32;

    /// Decode raw account data.
    ///
    /// Layout: discriminator[8] bump[1] vault[32] owner[32] file_id[16]
    /// filename_hash[32] file_size[u64] encrypted_size[u64] mime_type_hash[32]
    /// security_level[1] encryption_commitment[32] critical_bytes_commitment[32]
    /// primary_cid[64] redundancy_cid[64] provider_count[1] created_at[i64]
    /// accessed_at[i64] status[1] is_shared[1] delegation_count[1] reserved[32]
    pub fn from_account_data(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(RecoveryError::Chain(format!(
                "file record too short: {} bytes, expected {}",
                data.len(),
                Self::SIZE
            )));
        }
        let mut r = Reader {
            data,
            pos: Self::DISCRIMINATOR_LEN,
        };
        let _bump = r.u8();
        let vault = Pubkey(r.take());
        let owner = Pubkey(r.take());
        let file_id = FileId(r.take());
        let filename_hash = r.take();
        let file_size = r.u64();
        let encrypted_size = r.u64();
        let mime_type_hash = r.take();
        let security_level = SecurityLevel::from_on_chain(r.u8())?;
        let encryption_commitment = hex::encode(r.take::<32>());
        let critical_bytes_commitment = hex::encode(r.take::<32>());
        let primary_cid = r.padded_str::<64>();
        let redundancy_cid = r.padded_str::<64>();
        let provider_count = r.u8();
        let created_at = r.i64();
        let accessed_at = r.i64();
        let status = FileStatus::from(r.u8());
        let is_shared = r.u8() != 0;
        let delegation_count = r.u8();

        Ok(Self {
            vault,
            owner,
            file_id,
            filename_hash,
            file_size,
            encrypted_size,
            mime_type_hash,
            security_level,
            encryption_commitment,
            critical_bytes_commitment,
            primary_cid,
            redundancy_cid,
            provider_count,
            created_at,
            accessed_at,
            status,
            is_shared,
            delegation_count,
        })
    }

    /// Encode back into account bytes. The discriminator, bump and
    /// reserved bytes are zero.
    pub fn to_account_data(&self) -> Vec<u8> {
        fn padded<const N: usize>(s: &str) -> [u8; N] {
            let mut out = [0u8; N];
            let len = s.len().min(N);
            out[..len].copy_from_slice(&s.as_bytes()[..len]);
            out
        }
        fn hex32(s: &str) -> [u8; 32] {
            let mut out = [0u8; 32];
            if let Ok(bytes) = hex::decode(s) {
                let len = bytes.len().min(32);
                out[..len].copy_from_slice(&bytes[..len]);
            }
            out
        }

        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&[0u8; 8]);
        out.push(0);
        out.extend_from_slice(&self.vault.0);
        out.extend_from_slice(&self.owner.0);
        out.extend_from_slice(&self.file_id.0);
        out.extend_from_slice(&self.filename_hash);
        out.extend_from_slice(&self.file_size.to_le_bytes());
        out.extend_from_slice(&self.encrypted_size.to_le_bytes());
        out.extend_from_slice(&self.mime_type_hash);
        out.push(self.security_level.as_u8() - 1);
        out.extend_from_slice(&hex32(&self.encryption_commitment));
        out.extend_from_slice(&hex32(&self.critical_bytes_commitment));
        out.extend_from_slice(&padded::<64>(&self.primary_cid));
        out.extend_from_slice(&padded::<64>(&self.redundancy_cid));
        out.push(self.provider_count);
        out.extend_from_slice(&self.created_at.to_le_bytes());
        out.extend_from_slice(&self.accessed_at.to_le_bytes());
        out.push(match self.status {
            FileStatus::Active => 0,
            FileStatus::Archived => 1,
            FileStatus::Deleted => 2,
            FileStatus::Unknown(raw) => raw,
        });
        out.push(self.is_shared as u8);
        out.push(self.delegation_count);
        out.extend_from_slice(&[0u8; 32]);
        out
    }
}
