//! SHA-256 transaction identifiers.
//!
//! Rendered as `SHA-256:<64 uppercase hex digits>`; parsing accepts either
//! hex case. Serialized as that string so hashes can be JSON map keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::RequestError;

/// Algorithm prefix carried in the string form.
pub const SHA256_ALGORITHM: &str = "SHA-256";

const DIGEST_LEN: usize = 32;

/// A SHA-256 digest identifying a transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecureHash([u8; DIGEST_LEN]);

impl SecureHash {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        SecureHash(bytes)
    }

    /// Hash arbitrary bytes.
    pub fn sha256(data: impl AsRef<[u8]>) -> Self {
        SecureHash(Sha256::digest(data.as_ref()).into())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", SHA256_ALGORITHM, self.to_hex())
    }
}

impl fmt::Debug for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureHash({})", self)
    }
}

impl FromStr for SecureHash {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RequestError::InvalidHash {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (algorithm, digits) = s
            .split_once(':')
            .ok_or_else(|| invalid("expected '<algorithm>:<hex>'"))?;
        if algorithm != SHA256_ALGORITHM {
            return Err(invalid("unsupported algorithm"));
        }
        if digits.len() != DIGEST_LEN * 2 {
            return Err(invalid("expected 64 hex digits"));
        }

        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| invalid(&e.to_string()))?;
        Ok(SecureHash(bytes))
    }
}

impl Serialize for SecureHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SecureHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
