use notary_core::{SecureHash, StateRef};

/// All errors that can be returned by a BackingStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// `create_unconsumed_states` on a state that already has a record.
    #[error("state already exists: {state_ref}")]
    StateAlreadyExists { state_ref: StateRef },

    /// `consume_states` on a state with no record.
    #[error("state not found: {state_ref}")]
    StateNotFound { state_ref: StateRef },

    /// `consume_states` on a state consumed by a different transaction.
    /// Consumption is write-once.
    #[error("state {state_ref} already consumed by {consuming_tx_id}")]
    StateAlreadyConsumed {
        state_ref: StateRef,
        consuming_tx_id: SecureHash,
    },

    /// A transaction id already has a recorded result.
    #[error("transaction already committed: {tx_id}")]
    TransactionAlreadyCommitted { tx_id: SecureHash },

    /// The backend is temporarily unable to serve the request.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted data that cannot be read back.
    #[error("corrupt journal segment {segment} at line {line}: {reason}")]
    Corrupt {
        segment: String,
        line: usize,
        reason: String,
    },

    /// A backend-specific storage error.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Io(_))
    }
}
