//! Fixture builder: encrypts a file the way the upload side does and splits
//! it into a content remainder plus a sealed proof package.

#![allow(dead_code)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use blockdrive_crypto::{
    b64encode, compute_proof_hash, sha256_hex, DerivedKey, ProofPackage,
};
use serde_json::{json, Value};

pub fn random<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    getrandom::getrandom(&mut out).unwrap();
    out
}

pub fn random_key() -> DerivedKey {
    DerivedKey::from_bytes(random::<32>())
}

pub struct Sealed {
    pub remainder: Vec<u8>,
    pub critical: [u8; 16],
    pub file_iv: [u8; 12],
    pub proof_iv: [u8; 12],
    pub proof: ProofPackage,
}

fn encrypt(key: &DerivedKey, iv: &[u8; 12], data: &[u8]) -> Vec<u8> {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
        .encrypt(Nonce::from_slice(iv), data)
        .unwrap()
}

/// Seal `payload` as the proof's encrypted critical bytes.
pub fn seal_payload(key: &DerivedKey, proof_iv: &[u8; 12], payload: &[u8]) -> String {
    b64encode(&encrypt(key, proof_iv, payload))
}

/// Recompute `proofHash` after the caller edited covered fields.
pub fn rehash(proof: &mut ProofPackage) {
    proof.proof_hash = compute_proof_hash(proof);
}

pub fn seal_file(key: &DerivedKey, plaintext: &[u8], version: u32) -> Sealed {
    let file_iv = random::<12>();
    let proof_iv = random::<12>();
    let ciphertext = encrypt(key, &file_iv, plaintext);

    let mut critical = [0u8; 16];
    critical.copy_from_slice(&ciphertext[..16]);
    let mut payload = critical.to_vec();
    payload.extend_from_slice(&file_iv);

    let (groth16_proof, public_signals) = if version == 2 {
        (
            json!({"pi_a": ["1", "2", "1"], "pi_b": [["3", "4"], ["5", "6"]], "protocol": "groth16"}),
            json!(["12345", "67890"]),
        )
    } else {
        (Value::Null, json!([]))
    };

    let mut proof = ProofPackage {
        version,
        commitment: sha256_hex(&critical),
        encrypted_critical_bytes: seal_payload(key, &proof_iv, &payload),
        encryption_iv: b64encode(&proof_iv),
        encrypted_iv: None,
        proof_hash: String::new(),
        proof_timestamp: 1_718_000_000_000,
        groth16_proof,
        public_signals,
    };
    rehash(&mut proof);

    Sealed {
        remainder: ciphertext[16..].to_vec(),
        critical,
        file_iv,
        proof_iv,
        proof,
    }
}
