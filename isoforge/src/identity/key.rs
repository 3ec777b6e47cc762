//! OpenSSH public key lines.
//!
//! A listing line has the form `<algorithm> <base64 blob> [comment]`. The
//! blob is the SSH wire encoding of the key, which starts with the algorithm
//! name as a length-prefixed string, so the line can be checked for internal
//! consistency without knowing anything about the key material itself.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key types accepted in authorized_keys listings.
pub const KNOWN_ALGORITHMS: &[&str] = &[
    "ssh-ed25519",
    "ssh-rsa",
    "ssh-dss",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
    "sk-ecdsa-sha2-nistp256@openssh.com",
];

/// Reasons a line is rejected as a public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("line is empty")]
    Empty,

    #[error("line contains control characters")]
    ControlCharacter,

    #[error("unknown key type '{0}'")]
    UnknownAlgorithm(String),

    #[error("missing key data after '{0}'")]
    MissingBlob(String),

    #[error("key data is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("key data is truncated")]
    Truncated,

    #[error("key data encodes type '{embedded}' but the line declares '{declared}'")]
    AlgorithmMismatch { declared: String, embedded: String },
}

/// A syntactically valid public key line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    line: String,
    algorithm: String,
    blob: Vec<u8>,
    comment: Option<String>,
}

impl PublicKey {
    /// Parse and validate one listing line. Surrounding whitespace is ignored;
    /// everything else is kept verbatim.
    pub fn parse(input: &str) -> Result<Self, KeyError> {
        let line = input.trim();
        if line.is_empty() {
            return Err(KeyError::Empty);
        }
        if line.chars().any(|c| c.is_control() && c != '\t') {
            return Err(KeyError::ControlCharacter);
        }

        let (algorithm, rest) = split_field(line);
        if !KNOWN_ALGORITHMS.contains(&algorithm) {
            return Err(KeyError::UnknownAlgorithm(algorithm.to_string()));
        }

        let (encoded, comment) = split_field(rest);
        if encoded.is_empty() {
            return Err(KeyError::MissingBlob(algorithm.to_string()));
        }

        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| KeyError::InvalidBase64(e.to_string()))?;

        let embedded = embedded_algorithm(&blob)?;
        if embedded != algorithm.as_bytes() {
            return Err(KeyError::AlgorithmMismatch {
                declared: algorithm.to_string(),
                embedded: String::from_utf8_lossy(embedded).into_owned(),
            });
        }

        Ok(Self {
            line: line.to_string(),
            algorithm: algorithm.to_string(),
            blob,
            comment: (!comment.is_empty()).then(|| comment.to_string()),
        })
    }

    /// The full key line as it should appear in authorized_keys.
    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// OpenSSH-style fingerprint, e.g. `SHA256:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU`.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.blob);
        format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Split off the first whitespace-delimited field; the remainder has its
/// leading whitespace removed.
fn split_field(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Read the leading SSH `string` (u32 big-endian length + bytes) of a key blob.
fn embedded_algorithm(blob: &[u8]) -> Result<&[u8], KeyError> {
    let len_bytes: [u8; 4] = blob
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(KeyError::Truncated)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    blob.get(4..4 + len).ok_or(KeyError::Truncated)
}
