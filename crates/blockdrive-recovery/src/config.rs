//! Recovery configuration: storage endpoints, timeouts and chain settings.
//!
//! Every default can be overridden programmatically, from environment
//! variables, or from a JSON file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};

/// IPFS gateways in priority order.
pub const DEFAULT_IPFS_GATEWAYS: &[&str] = &[
    "https://ipfs.filebase.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
];

/// Blob store holding proof packages.
pub const DEFAULT_PROOF_STORE_URL: &str = "https://blockdrive-proofs.r2.cloudflarestorage.com";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// BlockDrive program id.
pub const DEFAULT_PROGRAM_ID: &str = "BLKDrv1111111111111111111111111111111111111";

pub const ENV_IPFS_GATEWAYS: &str = "BLOCKDRIVE_IPFS_GATEWAYS";
pub const ENV_PROOF_URL: &str = "BLOCKDRIVE_PROOF_URL";
pub const ENV_TIMEOUT_SECS: &str = "BLOCKDRIVE_TIMEOUT_SECS";
pub const ENV_RPC_URL: &str = "BLOCKDRIVE_RPC_URL";
pub const ENV_PROGRAM_ID: &str = "BLOCKDRIVE_PROGRAM_ID";
pub const ENV_FILEBASE_ACCESS_KEY: &str = "BLOCKDRIVE_FILEBASE_ACCESS_KEY";
pub const ENV_FILEBASE_SECRET_KEY: &str = "BLOCKDRIVE_FILEBASE_SECRET_KEY";
pub const ENV_FILEBASE_BUCKET: &str = "BLOCKDRIVE_FILEBASE_BUCKET";
pub const ENV_FILEBASE_ENDPOINT: &str = "BLOCKDRIVE_FILEBASE_ENDPOINT";

pub const DEFAULT_FILEBASE_ENDPOINT: &str = "https://s3.filebase.com";
pub const DEFAULT_FILEBASE_REGION: &str = "us-east-1";

/// Solana cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Devnet,
    Localnet,
}

impl Network {
    pub fn rpc_url(self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
            Self::Devnet => "https://api.devnet.solana.com",
            Self::Localnet => "http://localhost:8899",
        }
    }
}

impl FromStr for Network {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            "devnet" => Ok(Self::Devnet),
            "localnet" | "localhost" => Ok(Self::Localnet),
            other => Err(RecoveryError::Config(format!("unknown network: {}", other))),
        }
    }
}

/// Storage provider presets. Choosing one moves its gateway to the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    Filebase,
    Pinata,
    Infura,
    Cloudflare,
}

impl StorageProvider {
    pub fn gateway(self) -> &'static str {
        match self {
            Self::Filebase => "https://ipfs.filebase.io/ipfs/",
            Self::Pinata => "https://gateway.pinata.cloud/ipfs/",
            Self::Infura => "https://ipfs.infura.io/ipfs/",
            Self::Cloudflare => "https://cloudflare-ipfs.com/ipfs/",
        }
    }
}

impl FromStr for StorageProvider {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "filebase" => Ok(Self::Filebase),
            "pinata" => Ok(Self::Pinata),
            "infura" => Ok(Self::Infura),
            "cloudflare" => Ok(Self::Cloudflare),
            other => Err(RecoveryError::Config(format!(
                "unknown storage provider: {} (expected filebase, pinata, infura or cloudflare)",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filebase => "filebase",
            Self::Pinata => "pinata",
            Self::Infura => "infura",
            Self::Cloudflare => "cloudflare",
        };
        f.write_str(name)
    }
}

/// S3 access to the Filebase bucket uploads were written to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilebaseCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(default = "default_filebase_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_filebase_region")]
    pub region: String,
}

fn default_filebase_endpoint() -> String {
    DEFAULT_FILEBASE_ENDPOINT.to_string()
}

fn default_filebase_region() -> String {
    DEFAULT_FILEBASE_REGION.to_string()
}

impl FilebaseCredentials {
    pub fn new(access_key: &str, secret_key: &str, bucket: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            bucket: bucket.to_string(),
            endpoint: default_filebase_endpoint(),
            region: default_filebase_region(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("access key", &self.access_key),
            ("secret key", &self.secret_key),
            ("bucket", &self.bucket),
            ("endpoint", &self.endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(RecoveryError::Config(format!("Filebase {} must not be empty", field)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FilebaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilebaseCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}

/// Settings shared by the storage collaborators and the chain verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecoveryConfig {
    /// IPFS gateways, tried in order.
    pub ipfs_gateways: Vec<String>,
    /// Base URL of the proof blob store.
    pub proof_store_url: String,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    pub network: Network,
    /// Explicit RPC endpoint; overrides `network`.
    pub rpc_url: Option<String>,
    pub program_id: String,
    /// Direct bucket access; IPFS gateways are used without it.
    pub filebase: Option<FilebaseCredentials>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            ipfs_gateways: DEFAULT_IPFS_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            proof_store_url: DEFAULT_PROOF_STORE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            network: Network::default(),
            rpc_url: None,
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            filebase: None,
        }
    }
}

impl RecoveryConfig {
    /// Defaults overridden by any `BLOCKDRIVE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: Self = serde_json::from_slice(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup(ENV_IPFS_GATEWAYS) {
            self.ipfs_gateways = list
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(url) = lookup(ENV_PROOF_URL) {
            self.proof_store_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs.trim().parse().map_err(|_| {
                RecoveryError::Config(format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))
            })?;
        }
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = Some(url);
        }
        if let Some(id) = lookup(ENV_PROGRAM_ID) {
            self.program_id = id;
        }
        match (
            lookup(ENV_FILEBASE_ACCESS_KEY),
            lookup(ENV_FILEBASE_SECRET_KEY),
            lookup(ENV_FILEBASE_BUCKET),
        ) {
            (Some(access_key), Some(secret_key), Some(bucket)) => {
                let mut credentials = FilebaseCredentials::new(&access_key, &secret_key, &bucket);
                if let Some(endpoint) = lookup(ENV_FILEBASE_ENDPOINT) {
                    credentials.endpoint = endpoint;
                }
                self.filebase = Some(credentials);
            }
            (None, None, None) => {}
            _ => {
                return Err(RecoveryError::Config(format!(
                    "{}, {} and {} must be set together",
                    ENV_FILEBASE_ACCESS_KEY, ENV_FILEBASE_SECRET_KEY, ENV_FILEBASE_BUCKET
                )))
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Move the provider's gateway to the front of the list.
    pub fn with_provider(mut self, provider: StorageProvider) -> Self {
        let preferred = provider.gateway();
        self.ipfs_gateways.retain(|g| g != preferred);
        self.ipfs_gateways.insert(0, preferred.to_string());
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// RPC endpoint: the explicit URL if set, otherwise the network preset.
    pub fn resolved_rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or(self.network.rpc_url())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(RecoveryError::Config("timeout must be at least one second".into()));
        }
        if self.proof_store_url.trim().is_empty() {
            return Err(RecoveryError::Config("proof store URL must not be empty".into()));
        }
        if self.program_id.trim().is_empty() {
            return Err(RecoveryError::Config("program id must not be empty".into()));
        }
        if let Some(filebase) = &self.filebase {
            filebase.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = RecoveryConfig::default();
        assert_eq!(config.ipfs_gateways.len(), 4);
        assert_eq!(config.ipfs_gateways[0], "https://ipfs.filebase.io/ipfs/");
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.resolved_rpc_url(), "https://api.devnet.solana.com");
    }

    #[test]
    fn env_overrides() {
        let config = RecoveryConfig::default()
            .with_env(env(&[
                (ENV_IPFS_GATEWAYS, "http://a/ipfs/, http://b/ipfs/ ,"),
                (ENV_TIMEOUT_SECS, "5"),
                (ENV_RPC_URL, "http://127.0.0.1:8899"),
            ]))
            .unwrap();
        assert_eq!(config.ipfs_gateways, vec!["http://a/ipfs/", "http://b/ipfs/"]);
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.resolved_rpc_url(), "http://127.0.0.1:8899");
        assert_eq!(config.proof_store_url, DEFAULT_PROOF_STORE_URL);
    }

    #[test]
    fn env_rejects_bad_timeout() {
        assert!(RecoveryConfig::default()
            .with_env(env(&[(ENV_TIMEOUT_SECS, "soon")]))
            .is_err());
        assert!(RecoveryConfig::default()
            .with_env(env(&[(ENV_TIMEOUT_SECS, "0")]))
            .is_err());
    }

    #[test]
    fn provider_moves_to_front_without_duplicates() {
        let config = RecoveryConfig::default().with_provider(StorageProvider::Pinata);
        assert_eq!(config.ipfs_gateways[0], "https://gateway.pinata.cloud/ipfs/");
        assert_eq!(config.ipfs_gateways.len(), 4);

        let config = RecoveryConfig::default().with_provider(StorageProvider::Infura);
        assert_eq!(config.ipfs_gateways[0], "https://ipfs.infura.io/ipfs/");
        assert_eq!(config.ipfs_gateways.len(), 5);
    }

    #[test]
    fn parse_names() {
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Mainnet);
        assert!("testnet".parse::<Network>().is_err());
        assert_eq!("cloudflare".parse::<StorageProvider>().unwrap(), StorageProvider::Cloudflare);
        assert!("s3".parse::<StorageProvider>().is_err());
    }

    #[test]
    fn json_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"proofStoreUrl":"http://proofs.local","network":"localnet"}"#)
            .unwrap();
        let config = RecoveryConfig::from_json_file(&path).unwrap();
        assert_eq!(config.proof_store_url, "http://proofs.local");
        assert_eq!(config.resolved_rpc_url(), "http://localhost:8899");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.filebase, None);
    }

    #[test]
    fn filebase_credentials_from_env() {
        let config = RecoveryConfig::default()
            .with_env(env(&[
                (ENV_FILEBASE_ACCESS_KEY, "AKIA"),
                (ENV_FILEBASE_SECRET_KEY, "hunter2"),
                (ENV_FILEBASE_BUCKET, "blockdrive"),
            ]))
            .unwrap();
        let filebase = config.filebase.unwrap();
        assert_eq!(filebase.bucket, "blockdrive");
        assert_eq!(filebase.endpoint, DEFAULT_FILEBASE_ENDPOINT);
        assert_eq!(filebase.region, DEFAULT_FILEBASE_REGION);

        let debug = format!("{:?}", filebase);
        assert!(debug.contains("AKIA"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn partial_filebase_env_is_rejected() {
        let err = RecoveryConfig::default()
            .with_env(env(&[(ENV_FILEBASE_ACCESS_KEY, "AKIA"), (ENV_FILEBASE_BUCKET, "b")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_FILEBASE_SECRET_KEY));
    }

    #[test]
    fn filebase_credentials_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"filebase":{"accessKey":"a","secretKey":"s","bucket":"b","endpoint":"http://127.0.0.1:9000"}}"#,
        )
        .unwrap();
        let filebase = RecoveryConfig::from_json_file(&path).unwrap().filebase.unwrap();
        assert_eq!(filebase.endpoint, "http://127.0.0.1:9000");
        assert_eq!(filebase.region, DEFAULT_FILEBASE_REGION);

        std::fs::write(&path, r#"{"filebase":{"accessKey":"a","secretKey":"","bucket":"b"}}"#)
            .unwrap();
        assert!(RecoveryConfig::from_json_file(&path).is_err());
    }
}
