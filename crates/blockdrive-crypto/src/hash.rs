//! SHA-256 digests, commitment checks and standard base64.

use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check that `sha256(data)` equals `expected_hex`, ignoring the case of
/// `expected_hex`.
pub fn verify_commitment(data: &[u8], expected_hex: &str) -> bool {
    sha256_hex(data) == expected_hex.to_ascii_lowercase()
}

/// Encode bytes as RFC 4648 base64 (standard alphabet, padded).
pub fn b64encode(data: &[u8]) -> String {
    Base64::encode_string(data)
}

/// Decode RFC 4648 base64 (standard alphabet, padded).
pub fn b64decode(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    Base64::decode_vec(encoded.trim())
        .map_err(|e| CryptoError::MalformedProof(format!("invalid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn commitment_ignores_case_of_expected() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        assert!(verify_commitment(b"abc", upper));
        assert!(verify_commitment(b"abc", &upper.to_lowercase()));
        assert!(!verify_commitment(b"abd", upper));
        // output stays lowercase regardless of what was compared
        assert_eq!(sha256_hex(b"abc"), sha256_hex(b"abc").to_lowercase());
    }

    #[test]
    fn base64_standard_alphabet() {
        assert_eq!(b64encode(&[0xfb, 0xff]), "+/8=");
        assert_eq!(b64decode("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(b64decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn base64_rejects_url_safe_and_garbage() {
        assert!(b64decode("-_8=").is_err());
        let err = b64decode("not base64!").unwrap_err();
        assert!(matches!(err, CryptoError::MalformedProof(_)));
    }
}
