//! Solana JSON-RPC client for file records.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use ed25519_dalek::VerifyingKey;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ChainVerifier, FileId, FileRecord, Pubkey};
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Find the program-derived address for `seeds`.
///
/// Bumps are tried from 255 down; the first hash that is not a valid
/// ed25519 point wins.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    (0..=u8::MAX).rev().find_map(|bump| {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.0);
        hasher.update(PDA_MARKER);
        let candidate: [u8; 32] = hasher.finalize().into();
        if VerifyingKey::from_bytes(&candidate).is_err() {
            Some((Pubkey(candidate), bump))
        } else {
            None
        }
    })
}

pub struct SolanaRpcVerifier {
    client: reqwest::Client,
    rpc_url: String,
    program_id: Pubkey,
}

impl SolanaRpcVerifier {
    pub fn new(rpc_url: &str, program_id: Pubkey, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecoveryError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            program_id,
        })
    }

    pub fn from_config(config: &RecoveryConfig) -> Result<Self> {
        let program_id = config.program_id.parse()?;
        Self::new(config.resolved_rpc_url(), program_id, config.timeout())
    }

    /// Seeds: `["user_vault", owner]`.
    pub fn vault_address(&self, owner: &Pubkey) -> Result<Pubkey> {
        find_program_address(&[b"user_vault", &owner.0], &self.program_id)
            .map(|(pda, _)| pda)
            .ok_or_else(|| RecoveryError::Chain("no valid vault address".to_string()))
    }

    /// Seeds: `["file", vault, file_id]`.
    pub fn file_address(&self, vault: &Pubkey, file_id: &FileId) -> Result<Pubkey> {
        find_program_address(&[b"file", &vault.0, &file_id.0], &self.program_id)
            .map(|(pda, _)| pda)
            .ok_or_else(|| RecoveryError::Chain("no valid file address".to_string()))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecoveryError::Chain(format!("{} request failed: {}", method, e)))?;

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| RecoveryError::Chain(format!("failed to parse {} response: {}", method, e)))?;

        if let Some(error) = body.get("error") {
            return Err(RecoveryError::Chain(format!("{} error: {}", method, error)));
        }
        Ok(body.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }
}

/// Decode `account.data`, which the RPC returns as `[<base64>, "base64"]`.
fn account_bytes(account: &Value) -> Result<Vec<u8>> {
    let encoded = account
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(Value::as_str)
        .ok_or_else(|| RecoveryError::Chain("account data missing".to_string()))?;
    Base64::decode_vec(encoded)
        .map_err(|e| RecoveryError::Chain(format!("invalid account data: {}", e)))
}

#[async_trait::async_trait]
impl ChainVerifier for SolanaRpcVerifier {
    async fn fetch_file_record(&self, owner: &Pubkey, file_id: &FileId) -> Result<Option<FileRecord>> {
        let vault = self.vault_address(owner)?;
        let address = self.file_address(&vault, file_id)?;
        debug!(%address, %file_id, "fetching file record");

        let result = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), {"encoding": "base64"}]),
            )
            .await?;
        match result.get("value") {
            None | Some(Value::Null) => Ok(None),
            Some(account) => FileRecord::from_account_data(&account_bytes(account)?).map(Some),
        }
    }

    async fn fetch_file_records(&self, owner: &Pubkey) -> Result<Vec<FileRecord>> {
        let result = self
            .call(
                "getProgramAccounts",
                json!([
                    self.program_id.to_string(),
                    {
                        "encoding": "base64",
                        "filters": [
                            {"dataSize": FileRecord::SIZE},
                            {"memcmp": {"offset": FileRecord::OWNER_OFFSET, "bytes": owner.to_string()}}
                        ]
                    }
                ]),
            )
            .await?;

        let accounts = result.as_array().cloned().unwrap_or_default();
        let mut records = Vec::with_capacity(accounts.len());
        for entry in &accounts {
            let decoded = entry
                .get("account")
                .ok_or_else(|| RecoveryError::Chain("account missing".to_string()))
                .and_then(account_bytes)
                .and_then(|data| FileRecord::from_account_data(&data));
            match decoded {
                Ok(record) => records.push(record),
                Err(e) => debug!(error = %e, "skipping undecodable account"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_address_is_off_curve_and_deterministic() {
        let program: Pubkey = crate::config::DEFAULT_PROGRAM_ID.parse().unwrap();
        let owner = Pubkey([7; 32]);
        let (a, bump_a) = find_program_address(&[b"user_vault", &owner.0], &program).unwrap();
        let (b, bump_b) = find_program_address(&[b"user_vault", &owner.0], &program).unwrap();
        assert_eq!((a, bump_a), (b, bump_b));
        assert!(VerifyingKey::from_bytes(&a.0).is_err());
    }

    #[test]
    fn different_seeds_give_different_addresses() {
        let program: Pubkey = crate::config::DEFAULT_PROGRAM_ID.parse().unwrap();
        let vault = Pubkey([1; 32]);
        let (a, _) = find_program_address(&[b"file", &vault.0, &[1; 16]], &program).unwrap();
        let (b, _) = find_program_address(&[b"file", &vault.0, &[2; 16]], &program).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn account_bytes_reads_base64_pair() {
        let account = json!({"data": ["AQID", "base64"], "owner": "x"});
        assert_eq!(account_bytes(&account).unwrap(), vec![1, 2, 3]);
        assert!(account_bytes(&json!({})).is_err());
    }
}
