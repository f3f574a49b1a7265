//! Detached signatures over successful results.
//!
//! The signed message is the SHA-256 digest of the JSON encoding of
//! `{"tx_id": .., "result": ..}`. Keys and signatures travel base64-encoded
//! (standard alphabet), and secret key files hold the base64 of the 32-byte
//! Ed25519 seed.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use notary_core::{CheckResponse, CheckResult, ResultSignature, SecureHash};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::SigningError;

pub const ED25519: &str = "ed25519";

/// Signs results on behalf of the notary.
pub trait ResultSigner: Send + Sync {
    fn sign(&self, tx_id: &SecureHash, result: &CheckResult)
        -> Result<ResultSignature, SigningError>;
}

#[derive(Serialize)]
struct SignedPayload<'a> {
    tx_id: &'a SecureHash,
    result: &'a CheckResult,
}

/// The 32 bytes a signer signs for `(tx_id, result)`.
pub fn signing_digest(tx_id: &SecureHash, result: &CheckResult) -> Result<[u8; 32], SigningError> {
    let payload = serde_json::to_vec(&SignedPayload { tx_id, result })?;
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(&payload));
    Ok(digest)
}

pub struct Ed25519ResultSigner {
    key: SigningKey,
}

impl Ed25519ResultSigner {
    pub fn new(key: SigningKey) -> Self {
        Ed25519ResultSigner { key }
    }

    /// A fresh random key.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Ed25519ResultSigner {
            key: SigningKey::generate(&mut rng),
        }
    }

    /// Load a key written by `notary keygen`.
    pub fn from_secret_file(path: &Path) -> Result<Self, SigningError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SigningError::KeyIo {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = BASE64.decode(contents.trim()).map_err(|e| {
            SigningError::InvalidKey(format!("error decoding '{}': {}", path.display(), e))
        })?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            SigningError::InvalidKey(format!(
                "invalid secret key length in '{}': expected 32 bytes",
                path.display()
            ))
        })?;
        Ok(Ed25519ResultSigner::new(SigningKey::from_bytes(&seed)))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Base64 of the verifying key, as it appears in signatures.
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.key.verifying_key().to_bytes())
    }
}

impl ResultSigner for Ed25519ResultSigner {
    fn sign(
        &self,
        tx_id: &SecureHash,
        result: &CheckResult,
    ) -> Result<ResultSignature, SigningError> {
        let digest = signing_digest(tx_id, result)?;
        let signature = self.key.sign(&digest);
        Ok(ResultSignature {
            algorithm: ED25519.to_string(),
            public_key: self.public_key_base64(),
            signature: BASE64.encode(signature.to_bytes()),
        })
    }
}

/// Wrap `result` in a response, signing it iff it is a success.
pub fn respond(
    signer: &dyn ResultSigner,
    tx_id: &SecureHash,
    result: CheckResult,
) -> Result<CheckResponse, SigningError> {
    let signature = if result.is_success() {
        Some(signer.sign(tx_id, &result)?)
    } else {
        None
    };
    Ok(CheckResponse { result, signature })
}

/// Check that a response is signed iff it is a success, and that the
/// signature is valid for `tx_id`.
///
/// This proves the response came from the holder of the embedded public
/// key; whether that key is trusted is up to the caller.
pub fn verify_response(tx_id: &SecureHash, response: &CheckResponse) -> Result<(), SigningError> {
    let signature = match (&response.result, &response.signature) {
        (CheckResult::Failure { .. }, None) => return Ok(()),
        (CheckResult::Failure { .. }, Some(_)) => return Err(SigningError::UnexpectedSignature),
        (CheckResult::Success { .. }, None) => return Err(SigningError::MissingSignature),
        (CheckResult::Success { .. }, Some(signature)) => signature,
    };
    if signature.algorithm != ED25519 {
        return Err(SigningError::UnsupportedAlgorithm(signature.algorithm.clone()));
    }

    let key_bytes: [u8; 32] = BASE64
        .decode(&signature.public_key)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?
        .try_into()
        .map_err(|_| SigningError::InvalidKey("expected 32 bytes".to_string()))?;
    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))?;

    let sig_bytes: [u8; 64] = BASE64
        .decode(&signature.signature)
        .map_err(|e| SigningError::MalformedSignature(e.to_string()))?
        .try_into()
        .map_err(|_| SigningError::MalformedSignature("expected 64 bytes".to_string()))?;
    let sig = Signature::from_bytes(&sig_bytes);

    let digest = signing_digest(tx_id, &response.result)?;
    key.verify_strict(&digest, &sig)
        .map_err(|_| SigningError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_core::CheckError;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn tx(name: &str) -> SecureHash {
        SecureHash::sha256(name.as_bytes())
    }

    fn success() -> CheckResult {
        CheckResult::success(datetime!(2025-01-01 00:00:01 UTC))
    }

    #[test]
    fn success_is_signed_and_verifies() {
        let signer = Ed25519ResultSigner::generate();
        let response = respond(&signer, &tx("T1"), success()).unwrap();

        let signature = response.signature.as_ref().unwrap();
        assert_eq!(signature.algorithm, "ed25519");
        assert_eq!(signature.public_key, signer.public_key_base64());
        verify_response(&tx("T1"), &response).unwrap();
    }

    #[test]
    fn failure_is_never_signed() {
        let signer = Ed25519ResultSigner::generate();
        let failure = CheckResult::failure(
            datetime!(2025-01-01 00:00:01 UTC),
            CheckError::MalformedRequest {
                error_text: "bad".to_string(),
            },
        );
        let response = respond(&signer, &tx("T1"), failure).unwrap();
        assert!(response.signature.is_none());
        verify_response(&tx("T1"), &response).unwrap();
    }

    #[test]
    fn signature_is_bound_to_the_transaction_id() {
        let signer = Ed25519ResultSigner::generate();
        let response = respond(&signer, &tx("T1"), success()).unwrap();
        assert!(matches!(
            verify_response(&tx("T2"), &response),
            Err(SigningError::VerificationFailed)
        ));
    }

    #[test]
    fn tampered_result_fails_verification() {
        let signer = Ed25519ResultSigner::generate();
        let mut response = respond(&signer, &tx("T1"), success()).unwrap();
        response.result = CheckResult::success(datetime!(2025-01-01 00:00:02 UTC));
        assert!(matches!(
            verify_response(&tx("T1"), &response),
            Err(SigningError::VerificationFailed)
        ));
    }

    #[test]
    fn unsigned_success_is_rejected() {
        let response = CheckResponse {
            result: success(),
            signature: None,
        };
        assert!(matches!(
            verify_response(&tx("T1"), &response),
            Err(SigningError::MissingSignature)
        ));
    }

    #[test]
    fn secret_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notary.secret");
        let signer = Ed25519ResultSigner::generate();
        std::fs::write(&path, BASE64.encode(signer.key.to_bytes())).unwrap();

        let loaded = Ed25519ResultSigner::from_secret_file(&path).unwrap();
        assert_eq!(loaded.verifying_key(), signer.verifying_key());
    }

    #[test]
    fn short_secret_file_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("short.secret");
        std::fs::write(&path, BASE64.encode([7u8; 16])).unwrap();
        assert!(matches!(
            Ed25519ResultSigner::from_secret_file(&path),
            Err(SigningError::InvalidKey(_))
        ));
    }
}
