pub mod decrypt;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod metadata;
pub mod proof;
pub mod types;

pub use decrypt::{decrypt_file, verify_and_decrypt_proof, RecoveryCipher};
pub use error::{CryptoError, ErrorKind};
pub use hash::{b64decode, b64encode, sha256_hex, verify_commitment};
pub use kdf::{
    derive_all_keys, derive_key, derive_key_from_raw_level, generate_key_hash, hkdf_derive,
    sign_message,
};
pub use metadata::{FileMetadata, MetadataEnvelope};
pub use proof::{
    build_proof_hash_content, compute_proof_hash, compute_proof_hash_value, parse_proof_json,
    verify_proof_integrity, verify_proof_integrity_value, ProofPackage,
};
pub use types::{
    CriticalBytes, DerivedKey, FileNonce, SecurityLevel, AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH,
    AES_KEY_LENGTH, CRITICAL_BYTES_LENGTH, HKDF_SALT, PROOF_PAYLOAD_LENGTH,
};
