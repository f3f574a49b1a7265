use std::path::PathBuf;

use notary_core::SecureHash;
use notary_storage::StorageError;

/// Errors that escape [`UniquenessChecker`](crate::UniquenessChecker).
///
/// Uniqueness outcomes are never errors; they are `CheckResult::Failure`
/// values. Whatever comes back as `Err` left nothing committed, so the
/// caller may resubmit the whole request.
#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The store contradicted a decision made inside the same transaction.
    #[error("invariant violated while committing {tx_id}: {reason}")]
    InvariantViolation { tx_id: SecureHash, reason: String },

    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Errors loading a [`CheckerConfig`](crate::CheckerConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors producing or checking a result signature.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("error reading key '{}': {source}", path.display())]
    KeyIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unsupported signature algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature does not match result")]
    VerificationFailed,

    #[error("successful result carries no signature")]
    MissingSignature,

    #[error("failed result must not be signed")]
    UnexpectedSignature,

    #[error("could not encode result for signing: {0}")]
    Encoding(#[from] serde_json::Error),
}
