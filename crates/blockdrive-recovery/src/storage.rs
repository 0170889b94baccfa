//! Download collaborators for encrypted content and proof packages.
//!
//! Retrying and endpoint fallback live here and nowhere else; the
//! cryptographic core only ever sees complete byte buffers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};

/// Bytes fetched from a store.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Vec<u8>,
    /// Gateway URL or store label that served the bytes.
    pub provider: String,
    pub elapsed_ms: u64,
}

/// Every endpoint failed. The message lists each endpoint's reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DownloadError(pub String);

/// Anything that can resolve an identifier to bytes.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Short label used in combined error messages.
    fn name(&self) -> &str;

    async fn download(&self, id: &str) -> std::result::Result<Download, DownloadError>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RecoveryError::Config(format!("failed to build HTTP client: {}", e)))
}

async fn fetch(client: &reqwest::Client, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
    let resp = client.get(url).send().await.map_err(FetchError::Transport)?;
    if resp.status() != StatusCode::OK {
        return Err(FetchError::Status(resp.status().as_u16()));
    }
    let body = resp.bytes().await.map_err(FetchError::Transport)?;
    Ok(body.to_vec())
}

enum FetchError {
    Status(u16),
    Transport(reqwest::Error),
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ============================================================================
// IPFS gateways
// ============================================================================

/// Content-addressed storage reached through a list of HTTP gateways, tried
/// in order until one answers 200.
pub struct IpfsGateways {
    client: reqwest::Client,
    gateways: Vec<String>,
}

impl IpfsGateways {
    pub fn new(gateways: Vec<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            gateways,
        })
    }

    pub fn from_config(config: &RecoveryConfig) -> Result<Self> {
        Self::new(config.ipfs_gateways.clone(), config.timeout())
    }

    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }
}

#[async_trait::async_trait]
impl ContentStore for IpfsGateways {
    fn name(&self) -> &str {
        "IPFS"
    }

    async fn download(&self, cid: &str) -> std::result::Result<Download, DownloadError> {
        let start = Instant::now();
        let mut errors = Vec::new();

        for gateway in &self.gateways {
            let url = format!("{}/{}", gateway.trim_end_matches('/'), cid);
            match fetch(&self.client, &url).await {
                Ok(data) => {
                    debug!(gateway = %gateway, bytes = data.len(), "gateway served content");
                    return Ok(Download {
                        data,
                        provider: gateway.clone(),
                        elapsed_ms: elapsed_ms(start),
                    });
                }
                Err(FetchError::Status(code)) => errors.push(format!("HTTP {} from {}", code, gateway)),
                Err(FetchError::Transport(e)) => errors.push(format!("{}: {}", gateway, e)),
            }
            debug!(gateway = %gateway, "gateway failed, trying next");
        }

        if errors.is_empty() {
            return Err(DownloadError("No IPFS gateways configured".to_string()));
        }
        Err(DownloadError(errors.join("; ")))
    }
}

// ============================================================================
// Proof blob store
// ============================================================================

/// A single HTTP base URL serving proof packages at `{base}/{id}`.
pub struct ProofStoreHttp {
    client: reqwest::Client,
    base_url: String,
}

impl ProofStoreHttp {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &RecoveryConfig) -> Result<Self> {
        Self::new(&config.proof_store_url, config.timeout())
    }
}

#[async_trait::async_trait]
impl ContentStore for ProofStoreHttp {
    fn name(&self) -> &str {
        "R2"
    }

    async fn download(&self, id: &str) -> std::result::Result<Download, DownloadError> {
        let start = Instant::now();
        let url = format!("{}/{}", self.base_url, id);
        match fetch(&self.client, &url).await {
            Ok(data) => Ok(Download {
                data,
                provider: "r2".to_string(),
                elapsed_ms: elapsed_ms(start),
            }),
            Err(FetchError::Status(code)) => Err(DownloadError(format!("HTTP {}", code))),
            Err(FetchError::Transport(e)) => Err(DownloadError(e.to_string())),
        }
    }
}

// ============================================================================
// Fallback chain
// ============================================================================

/// Tries `primary`, then `secondary`. When both fail the error names each:
/// `"R2: <reason>; IPFS: <reason>"`.
pub struct FallbackProofStore {
    primary: Arc<dyn ContentStore>,
    secondary: Arc<dyn ContentStore>,
}

impl FallbackProofStore {
    pub fn new(primary: Arc<dyn ContentStore>, secondary: Arc<dyn ContentStore>) -> Self {
        Self { primary, secondary }
    }

    /// Proof store first, IPFS gateways second.
    pub fn from_config(config: &RecoveryConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ProofStoreHttp::from_config(config)?),
            Arc::new(IpfsGateways::from_config(config)?),
        ))
    }
}

#[async_trait::async_trait]
impl ContentStore for FallbackProofStore {
    fn name(&self) -> &str {
        "proof"
    }

    async fn download(&self, id: &str) -> std::result::Result<Download, DownloadError> {
        let first = match self.primary.download(id).await {
            Ok(download) => return Ok(download),
            Err(e) => e,
        };
        debug!(store = self.primary.name(), error = %first, "primary proof store failed");
        self.secondary.download(id).await.map_err(|second| {
            DownloadError(format!(
                "{}: {}; {}: {}",
                self.primary.name(),
                first,
                self.secondary.name(),
                second
            ))
        })
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Map-backed store for offline recovery and tests.
pub struct InMemoryStore {
    name: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: &str, data: impl Into<Vec<u8>>) {
        self.blobs.write().insert(id.to_string(), data.into());
    }

    pub fn remove(&self, id: &str) -> Option<Vec<u8>> {
        self.blobs.write().remove(id)
    }
}

#[async_trait::async_trait]
impl ContentStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn download(&self, id: &str) -> std::result::Result<Download, DownloadError> {
        let data = self
            .blobs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| DownloadError(format!("{} not found", id)))?;
        Ok(Download {
            data,
            provider: self.name.clone(),
            elapsed_ms: 0,
        })
    }
}
