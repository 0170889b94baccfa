//! Wallet signature input: file, hex, base64, or an interactive prompt.

use std::io::{BufRead, Write};
use std::path::Path;

use base64ct::{Base64, Encoding};
use blockdrive_recovery::SecurityLevel;
use thiserror::Error;
use zeroize::Zeroizing;

pub type Signature = Zeroizing<Vec<u8>>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to read signature file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid hex signature: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid base64 signature: {0}")]
    Base64(String),

    #[error("no signature provided")]
    Empty,

    #[error("failed to read signature: {0}")]
    Io(#[from] std::io::Error),
}

fn non_empty(bytes: Vec<u8>) -> Result<Signature, SignatureError> {
    if bytes.is_empty() {
        return Err(SignatureError::Empty);
    }
    Ok(Zeroizing::new(bytes))
}

/// Raw signature bytes from a file.
pub fn from_file(path: &Path) -> Result<Signature, SignatureError> {
    let bytes = std::fs::read(path).map_err(|source| SignatureError::File {
        path: path.display().to_string(),
        source,
    })?;
    non_empty(bytes)
}

/// Hex, with or without a `0x` prefix.
pub fn from_hex(input: &str) -> Result<Signature, SignatureError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    non_empty(hex::decode(digits)?)
}

pub fn from_base64(input: &str) -> Result<Signature, SignatureError> {
    let bytes = Base64::decode_vec(input.trim()).map_err(|e| SignatureError::Base64(e.to_string()))?;
    non_empty(bytes)
}

/// Interpret a pasted line: an existing file path, then hex, then base64.
pub fn parse_any(input: &str) -> Result<Signature, SignatureError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SignatureError::Empty);
    }
    let path = Path::new(input);
    if path.is_file() {
        return from_file(path);
    }
    from_hex(input).or_else(|_| from_base64(input))
}

/// Show the message to sign and read signatures from `input` until one
/// parses. Blank lines are skipped; end of input is an error.
pub fn prompt<R, W>(level: SecurityLevel, mut input: R, mut out: W) -> Result<Signature, SignatureError>
where
    R: BufRead,
    W: Write,
{
    writeln!(out, "Signature required for security level {}.", level)?;
    writeln!(out, "Sign this message with your wallet:")?;
    writeln!(out)?;
    writeln!(out, "  {}", level.sign_message())?;
    writeln!(out)?;

    loop {
        write!(out, "Signature (hex, base64, or path to a file): ")?;
        out.flush()?;

        let mut line = Zeroizing::new(String::new());
        if input.read_line(&mut line)? == 0 {
            return Err(SignatureError::Empty);
        }
        if line.trim().is_empty() {
            continue;
        }
        match parse_any(&line) {
            Ok(signature) => return Ok(signature),
            Err(e) => writeln!(out, "{}. Try again.", e)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn hex_accepts_prefix() {
        assert_eq!(from_hex("0xdeadbeef").unwrap().as_slice(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(from_hex(" DEADBEEF\n").unwrap().as_slice(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(from_hex("0xabc"), Err(SignatureError::Hex(_))));
        assert!(matches!(from_hex("0x"), Err(SignatureError::Empty)));
    }

    #[test]
    fn base64_decodes() {
        assert_eq!(from_base64("AQID").unwrap().as_slice(), &[1, 2, 3]);
        assert!(matches!(from_base64("***"), Err(SignatureError::Base64(_))));
    }

    #[test]
    fn file_is_read_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.sig");
        std::fs::write(&path, [0u8, 10, 13, 255]).unwrap();
        assert_eq!(from_file(&path).unwrap().as_slice(), &[0, 10, 13, 255]);

        let missing = dir.path().join("missing.sig");
        let err = from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.sig"));
    }

    #[test]
    fn parse_any_prefers_hex_over_base64() {
        // Valid as both; hex wins.
        assert_eq!(parse_any("abcd").unwrap().as_slice(), &[0xab, 0xcd]);
        assert_eq!(parse_any("AQID").unwrap().as_slice(), &[1, 2, 3]);
        assert!(parse_any("   ").is_err());
    }

    #[test]
    fn prompt_retries_until_valid() {
        let input = Cursor::new("\nnot a signature!\n0x0102\n");
        let mut out = Vec::new();
        let signature = prompt(SecurityLevel::Sensitive, input, &mut out).unwrap();
        assert_eq!(signature.as_slice(), &[1, 2]);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains(SecurityLevel::Sensitive.sign_message()));
        assert!(shown.contains("Try again"));
    }

    #[test]
    fn prompt_fails_at_end_of_input() {
        let err = prompt(SecurityLevel::Standard, Cursor::new(""), Vec::new()).unwrap_err();
        assert!(matches!(err, SignatureError::Empty));
    }
}
