use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::types::SecurityLevel;

/// Encrypted metadata blob as stored next to the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnvelope {
    pub encrypted_metadata: String,
    pub metadata_iv: String,
}

impl MetadataEnvelope {
    pub fn from_json(bytes: &[u8]) -> Result<Self, CryptoError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CryptoError::MetadataFailed(format!("invalid metadata envelope: {}", e)))
    }
}

/// Decrypted file metadata. Missing fields fall back to neutral defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileMetadata {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub uploaded_at: i64,
    pub security_level: u8,
    pub content_hash: String,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            file_name: "unknown".to_string(),
            file_type: "application/octet-stream".to_string(),
            file_size: 0,
            uploaded_at: 0,
            security_level: 1,
            content_hash: String::new(),
        }
    }
}

impl FileMetadata {
    pub fn level(&self) -> Result<SecurityLevel, CryptoError> {
        SecurityLevel::try_from(self.security_level)
    }

    /// The content hash if one was recorded.
    pub fn expected_hash(&self) -> Option<&str> {
        Some(self.content_hash.as_str()).filter(|h| !h.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let meta: FileMetadata = serde_json::from_str(r#"{"fileName":"a.txt"}"#).unwrap();
        assert_eq!(meta.file_name, "a.txt");
        assert_eq!(meta.file_type, "application/octet-stream");
        assert_eq!(meta.level().unwrap(), SecurityLevel::Standard);
        assert_eq!(meta.expected_hash(), None);
    }

    #[test]
    fn envelope_requires_both_fields() {
        assert!(MetadataEnvelope::from_json(br#"{"encryptedMetadata":"AA=="}"#).is_err());
        let env =
            MetadataEnvelope::from_json(br#"{"encryptedMetadata":"AA==","metadataIv":"BB=="}"#)
                .unwrap();
        assert_eq!(env.metadata_iv, "BB==");
    }
}
