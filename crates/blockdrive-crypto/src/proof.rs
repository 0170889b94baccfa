//! Proof package model and canonical proof-hash computation.
//!
//! The proof hash is SHA-256 over a compact JSON rendering of a fixed field
//! subset, keys in a fixed order. The rendering has to match what the
//! producing service's `JSON.stringify` emitted byte for byte, so it is built
//! by hand here rather than by serializing a struct.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::CryptoError;
use crate::hash::sha256_hex;

/// A proof package as published next to the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPackage {
    /// 2 for Groth16-era packages, anything else hashes as v1.
    #[serde(default = "default_version", deserialize_with = "deserialize_version")]
    pub version: u32,
    pub commitment: String,
    pub encrypted_critical_bytes: String,
    pub encryption_iv: String,
    /// File IV carried outside the sealed payload by older packages.
    #[serde(default, alias = "fileIv", skip_serializing_if = "Option::is_none")]
    pub encrypted_iv: Option<String>,
    pub proof_hash: String,
    pub proof_timestamp: i64,
    #[serde(default)]
    pub groth16_proof: Value,
    #[serde(default = "empty_signals")]
    pub public_signals: Value,
}

fn default_version() -> u32 {
    1
}

fn empty_signals() -> Value {
    Value::Array(Vec::new())
}

fn deserialize_version<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(version_of(&raw))
}

/// Numeric version of a raw `version` value. Strings such as `"1.0"` and
/// null are legacy packages.
fn version_of(raw: &Value) -> u32 {
    match raw.as_f64() {
        Some(v) if v == 2.0 => 2,
        Some(v) if v.fract() == 0.0 && v >= 0.0 && v <= u32::MAX as f64 => v as u32,
        _ => 1,
    }
}

impl ProofPackage {
    pub fn is_v2(&self) -> bool {
        self.version == 2
    }
}

/// Parse downloaded proof bytes.
pub fn parse_proof_json(bytes: &[u8]) -> Result<ProofPackage, CryptoError> {
    serde_json::from_slice(bytes)
        .map_err(|e| CryptoError::MalformedProof(format!("invalid proof JSON: {}", e)))
}

fn json_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// The exact string the proof hash is computed over.
///
/// v2: `{"commitment":..,"groth16Proof":..,"publicSignals":..,"encryptedCriticalBytes":..,"proofTimestamp":..}`
/// v1: `{"commitment":..,"encryptedCriticalBytes":..,"proofTimestamp":..}`
pub fn build_proof_hash_content(proof: &ProofPackage) -> String {
    hash_content(
        proof.is_v2(),
        &json_str(&proof.commitment),
        &proof.groth16_proof.to_string(),
        &proof.public_signals.to_string(),
        &json_str(&proof.encrypted_critical_bytes),
        &proof.proof_timestamp.to_string(),
    )
}

fn hash_content(
    v2: bool,
    commitment: &str,
    groth16: &str,
    signals: &str,
    encrypted: &str,
    timestamp: &str,
) -> String {
    if v2 {
        format!(
            "{{\"commitment\":{},\"groth16Proof\":{},\"publicSignals\":{},\"encryptedCriticalBytes\":{},\"proofTimestamp\":{}}}",
            commitment, groth16, signals, encrypted, timestamp
        )
    } else {
        format!(
            "{{\"commitment\":{},\"encryptedCriticalBytes\":{},\"proofTimestamp\":{}}}",
            commitment, encrypted, timestamp
        )
    }
}

pub fn compute_proof_hash(proof: &ProofPackage) -> String {
    sha256_hex(build_proof_hash_content(proof).as_bytes())
}

/// Whether the package's `proofHash` matches its contents.
pub fn verify_proof_integrity(proof: &ProofPackage) -> bool {
    compute_proof_hash(proof) == proof.proof_hash
}

/// Proof hash of an untyped record. Fails if a covered field is missing.
pub fn compute_proof_hash_value(proof: &Value) -> Result<String, CryptoError> {
    let field = |name: &str| {
        proof
            .get(name)
            .map(Value::to_string)
            .ok_or_else(|| CryptoError::MalformedProof(format!("missing field {}", name)))
    };
    let version = proof.get("version").map(version_of).unwrap_or(1);
    let groth16 = proof.get("groth16Proof").cloned().unwrap_or(Value::Null);
    let signals = proof.get("publicSignals").cloned().unwrap_or_else(empty_signals);
    let content = hash_content(
        version == 2,
        &field("commitment")?,
        &groth16.to_string(),
        &signals.to_string(),
        &field("encryptedCriticalBytes")?,
        &field("proofTimestamp")?,
    );
    Ok(sha256_hex(content.as_bytes()))
}

/// Integrity check over an untyped record. Never fails; a record missing
/// any covered field is simply not intact.
pub fn verify_proof_integrity_value(proof: &Value) -> bool {
    match (compute_proof_hash_value(proof), proof.get("proofHash").and_then(Value::as_str)) {
        (Ok(computed), Some(expected)) => computed == expected,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v1_record() -> Value {
        json!({
            "version": 1,
            "commitment": "aa".repeat(32),
            "encryptedCriticalBytes": "AAEC",
            "encryptionIv": "AAAAAAAAAAAAAAAA",
            "proofHash": "",
            "proofTimestamp": 1700000000000i64
        })
    }

    #[test]
    fn v1_content_is_compact() {
        let proof: ProofPackage = serde_json::from_value(v1_record()).unwrap();
        assert_eq!(
            build_proof_hash_content(&proof),
            format!(
                "{{\"commitment\":\"{}\",\"encryptedCriticalBytes\":\"AAEC\",\"proofTimestamp\":1700000000000}}",
                "aa".repeat(32)
            )
        );
    }

    #[test]
    fn v2_missing_optionals_render_as_null_and_empty() {
        let mut record = v1_record();
        record["version"] = json!(2);
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        let content = build_proof_hash_content(&proof);
        assert!(content.contains("\"groth16Proof\":null,\"publicSignals\":[]"));
    }

    #[test]
    fn v2_explicit_null_signals_stay_null() {
        let mut record = v1_record();
        record["version"] = json!(2);
        record["publicSignals"] = Value::Null;
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        assert!(build_proof_hash_content(&proof).contains("\"publicSignals\":null,"));
    }

    #[test]
    fn groth16_key_order_is_preserved() {
        let mut record = v1_record();
        record["version"] = json!(2);
        record["groth16Proof"] = serde_json::from_str(r#"{"pi_c":["3"],"pi_a":["1","2"],"protocol":"groth16"}"#).unwrap();
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        assert!(build_proof_hash_content(&proof)
            .contains(r#""groth16Proof":{"pi_c":["3"],"pi_a":["1","2"],"protocol":"groth16"}"#));
    }

    #[test]
    fn string_versions_are_legacy() {
        let mut record = v1_record();
        record["version"] = json!("2.0");
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        assert_eq!(proof.version, 1);

        let mut record = v1_record();
        record.as_object_mut().unwrap().remove("version");
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        assert_eq!(proof.version, 1);
    }

    #[test]
    fn typed_and_untyped_hashes_agree() {
        let mut record = v1_record();
        record["version"] = json!(2);
        record["publicSignals"] = json!(["1", "2"]);
        let proof: ProofPackage = serde_json::from_value(record.clone()).unwrap();
        assert_eq!(compute_proof_hash(&proof), compute_proof_hash_value(&record).unwrap());
    }

    #[test]
    fn untyped_integrity_never_fails_on_missing_fields() {
        let mut record = v1_record();
        record.as_object_mut().unwrap().remove("commitment");
        assert!(!verify_proof_integrity_value(&record));
        assert!(!verify_proof_integrity_value(&json!({})));
        assert!(!verify_proof_integrity_value(&json!("not an object")));
    }

    #[test]
    fn integrity_accepts_matching_hash() {
        let mut record = v1_record();
        let hash = compute_proof_hash_value(&record).unwrap();
        record["proofHash"] = json!(hash);
        assert!(verify_proof_integrity_value(&record));
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        assert!(verify_proof_integrity(&proof));
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        let err = parse_proof_json(br#"{"commitment":"00"}"#).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedProof(_)));
        assert!(parse_proof_json(b"\xff\xfe").is_err());
    }

    #[test]
    fn file_iv_alias_is_accepted() {
        let mut record = v1_record();
        record["fileIv"] = json!("AAAAAAAAAAAAAAAA");
        let proof: ProofPackage = serde_json::from_value(record).unwrap();
        assert_eq!(proof.encrypted_iv.as_deref(), Some("AAAAAAAAAAAAAAAA"));
    }
}
