//! Shared fixtures: seal files the way the upload side does and serve them
//! from in-memory stores or a loopback HTTP server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use blockdrive_crypto::{b64encode, compute_proof_hash, derive_key, sha256_hex, ProofPackage};
use blockdrive_recovery::{FileId, FileRecord, FileStatus, Pubkey, SecurityLevel};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const SIGNATURE: [u8; 64] = [0x5A; 64];

pub fn random<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    getrandom::getrandom(&mut out).unwrap();
    out
}

fn cipher(level: SecurityLevel) -> Aes256Gcm {
    let key = derive_key(&SIGNATURE, level).unwrap();
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

pub struct Sealed {
    pub remainder: Vec<u8>,
    pub proof: ProofPackage,
    pub proof_json: Vec<u8>,
    pub commitment: String,
}

/// Encrypt `plaintext` under the level's key and split it into a content
/// remainder and a v2 proof package.
pub fn seal(plaintext: &[u8], level: SecurityLevel) -> Sealed {
    let cipher = cipher(level);
    let file_iv = random::<12>();
    let proof_iv = random::<12>();
    let ciphertext = cipher.encrypt(Nonce::from_slice(&file_iv), plaintext).unwrap();

    let mut payload = ciphertext[..16].to_vec();
    payload.extend_from_slice(&file_iv);
    let sealed = cipher.encrypt(Nonce::from_slice(&proof_iv), payload.as_slice()).unwrap();

    let mut proof = ProofPackage {
        version: 2,
        commitment: sha256_hex(&ciphertext[..16]),
        encrypted_critical_bytes: b64encode(&sealed),
        encryption_iv: b64encode(&proof_iv),
        encrypted_iv: None,
        proof_hash: String::new(),
        proof_timestamp: 1_718_000_000_000,
        groth16_proof: json!({"pi_a": ["1", "2"], "protocol": "groth16"}),
        public_signals: json!(["1"]),
    };
    proof.proof_hash = compute_proof_hash(&proof);

    Sealed {
        remainder: ciphertext[16..].to_vec(),
        proof_json: serde_json::to_vec(&proof).unwrap(),
        commitment: proof.commitment.clone(),
        proof,
    }
}

/// Encrypted metadata envelope JSON.
pub fn seal_metadata(metadata: Value, level: SecurityLevel) -> Vec<u8> {
    let iv = random::<12>();
    let sealed = cipher(level)
        .encrypt(Nonce::from_slice(&iv), metadata.to_string().as_bytes())
        .unwrap();
    serde_json::to_vec(&json!({
        "encryptedMetadata": b64encode(&sealed),
        "metadataIv": b64encode(&iv),
    }))
    .unwrap()
}

pub fn record(
    owner: Pubkey,
    file_id: FileId,
    level: SecurityLevel,
    commitment: &str,
    primary_cid: &str,
    status: FileStatus,
) -> FileRecord {
    FileRecord {
        vault: Pubkey([0xAA; 32]),
        owner,
        file_id,
        filename_hash: [0; 32],
        file_size: 0,
        encrypted_size: 0,
        mime_type_hash: [0; 32],
        security_level: level,
        encryption_commitment: "00".repeat(32),
        critical_bytes_commitment: commitment.to_string(),
        primary_cid: primary_cid.to_string(),
        redundancy_cid: String::new(),
        provider_count: 1,
        created_at: 1_718_000_000,
        accessed_at: 1_718_000_000,
        status,
        is_shared: false,
        delegation_count: 0,
    }
}

// ============================================================================
// Loopback HTTP server
// ============================================================================

/// Serves fixed responses keyed by request path. Unknown paths get 404.
pub async fn serve(routes: HashMap<String, (u16, Vec<u8>)>) -> SocketAddr {
    let routes = routes
        .into_iter()
        .map(|(path, (status, body))| (path, Route { status, headers: Vec::new(), body }))
        .collect();
    serve_routes(routes).await
}

#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Like [`serve`], with extra response headers per path.
pub async fn serve_routes(routes: HashMap<String, Route>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&request);
                let mut parts = head.split_whitespace();
                let method = parts.next().unwrap_or("GET").to_string();
                let path = parts.next().unwrap_or("/").to_string();
                let route = routes.get(&path).cloned().unwrap_or(Route {
                    status: 404,
                    headers: Vec::new(),
                    body: b"not found".to_vec(),
                });
                let mut response = format!(
                    "HTTP/1.1 {} STATUS\r\nContent-Length: {}\r\nConnection: close\r\n",
                    route.status,
                    route.body.len()
                );
                for (name, value) in &route.headers {
                    response.push_str(&format!("{}: {}\r\n", name, value));
                }
                response.push_str("\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
                if method != "HEAD" {
                    let _ = socket.write_all(&route.body).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// A loopback address with nothing listening on it.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
