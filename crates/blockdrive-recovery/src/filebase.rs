//! Filebase bucket layout and, with the `s3` feature, direct object access.
//!
//! Uploads land in one bucket under one of three prefixes:
//!
//! ```text
//! personal/{userId}/{folder}/{timestamp}-{filename}
//! orgs/{teamId}/shared/{folder}/{timestamp}-{filename}
//! orgs/{teamId}/members/{userId}/{folder}/{timestamp}-{filename}
//! ```

use std::fmt;

const MAX_FILENAME_LENGTH: usize = 200;

/// Who owns an object, as encoded in its key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScope {
    Personal { user_id: String },
    TeamShared { team_id: String },
    TeamMember { team_id: String, user_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageContext {
    Personal,
    Organization,
}

impl fmt::Display for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Personal => "personal",
            Self::Organization => "organization",
        })
    }
}

impl KeyScope {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Personal { user_id } | Self::TeamMember { user_id, .. } => Some(user_id),
            Self::TeamShared { .. } => None,
        }
    }

    pub fn team_id(&self) -> Option<&str> {
        match self {
            Self::Personal { .. } => None,
            Self::TeamShared { team_id } | Self::TeamMember { team_id, .. } => Some(team_id),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Self::TeamShared { .. })
    }

    pub fn context(&self) -> StorageContext {
        match self {
            Self::Personal { .. } => StorageContext::Personal,
            _ => StorageContext::Organization,
        }
    }

    fn prefix(&self) -> String {
        match self {
            Self::Personal { user_id } => format!("personal/{}", user_id),
            Self::TeamShared { team_id } => format!("orgs/{}/shared", team_id),
            Self::TeamMember { team_id, user_id } => format!("orgs/{}/members/{}", team_id, user_id),
        }
    }
}

/// Split off one non-empty path segment that must be followed by `/`.
fn segment(rest: &str) -> Option<(&str, &str)> {
    rest.split_once('/').filter(|(head, _)| !head.is_empty())
}

/// Recover the owner of an object from its key. `None` for keys outside the
/// three known layouts.
pub fn parse_object_key(key: &str) -> Option<KeyScope> {
    if let Some(rest) = key.strip_prefix("personal/") {
        let (user_id, _) = segment(rest)?;
        return Some(KeyScope::Personal {
            user_id: user_id.to_string(),
        });
    }

    let rest = key.strip_prefix("orgs/")?;
    let (team_id, rest) = segment(rest)?;
    if rest.starts_with("shared/") {
        return Some(KeyScope::TeamShared {
            team_id: team_id.to_string(),
        });
    }
    let (user_id, _) = segment(rest.strip_prefix("members/")?)?;
    Some(KeyScope::TeamMember {
        team_id: team_id.to_string(),
        user_id: user_id.to_string(),
    })
}

fn sanitize(input: &str, extra: &[char]) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') || extra.contains(&c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build the key an upload at `timestamp_ms` would have used.
pub fn build_object_key(
    scope: &KeyScope,
    folder: Option<&str>,
    filename: &str,
    timestamp_ms: u64,
) -> String {
    let name: String = sanitize(filename, &[]).chars().take(MAX_FILENAME_LENGTH).collect();
    let folder = folder
        .map(|f| f.trim_matches('/').replace("//", "/"))
        .filter(|f| !f.is_empty())
        .map(|f| sanitize(&f, &['/']));

    match folder {
        Some(folder) => format!("{}/{}/{}-{}", scope.prefix(), folder, timestamp_ms, name),
        None => format!("{}/{}-{}", scope.prefix(), timestamp_ms, name),
    }
}

#[cfg(feature = "s3")]
pub use s3_store::FilebaseS3;

#[cfg(feature = "s3")]
mod s3_store {
    use std::time::{Duration, Instant};

    use s3::creds::Credentials;
    use s3::error::S3Error;
    use s3::{Bucket, Region};
    use tracing::debug;

    use crate::config::{FilebaseCredentials, RecoveryConfig};
    use crate::error::{RecoveryError, Result};
    use crate::storage::{ContentStore, Download, DownloadError};

    /// Objects read by key from a Filebase bucket over its S3 API.
    pub struct FilebaseS3 {
        bucket: Box<Bucket>,
    }

    impl FilebaseS3 {
        pub fn new(credentials: &FilebaseCredentials, timeout: Duration) -> Result<Self> {
            let region = Region::Custom {
                region: credentials.region.clone(),
                endpoint: credentials.endpoint.trim_end_matches('/').to_string(),
            };
            let creds = Credentials::new(
                Some(&credentials.access_key),
                Some(&credentials.secret_key),
                None,
                None,
                None,
            )
            .map_err(|e| RecoveryError::Config(format!("invalid Filebase credentials: {}", e)))?;
            let mut bucket = Bucket::new(&credentials.bucket, region, creds)
                .map_err(|e| RecoveryError::Config(format!("invalid Filebase bucket: {}", e)))?
                .with_path_style();
            bucket.set_request_timeout(Some(timeout));
            Ok(Self { bucket })
        }

        /// `None` when the config carries no Filebase credentials.
        pub fn from_config(config: &RecoveryConfig) -> Result<Option<Self>> {
            config
                .filebase
                .as_ref()
                .map(|credentials| Self::new(credentials, config.timeout()))
                .transpose()
        }

        /// The IPFS CID Filebase recorded in the object's metadata.
        pub async fn cid_for_key(&self, key: &str) -> Option<String> {
            match self.bucket.head_object(key).await {
                Ok((head, _)) => head.metadata.and_then(|mut meta| meta.remove("cid")),
                Err(e) => {
                    debug!(key, error = %e, "head object failed");
                    None
                }
            }
        }
    }

    fn describe(e: S3Error) -> String {
        match e {
            S3Error::HttpFailWithBody(code, _) => format!("HTTP {}", code),
            other => other.to_string(),
        }
    }

    #[async_trait::async_trait]
    impl ContentStore for FilebaseS3 {
        fn name(&self) -> &str {
            "Filebase S3"
        }

        async fn download(&self, key: &str) -> std::result::Result<Download, DownloadError> {
            let start = Instant::now();
            let response = self
                .bucket
                .get_object(key)
                .await
                .map_err(|e| DownloadError(describe(e)))?;
            let data = response.bytes().to_vec();
            debug!(key, bytes = data.len(), "object downloaded");
            Ok(Download {
                data,
                provider: "filebase-s3".to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}
