use std::collections::HashMap;

use async_trait::async_trait;
use notary_core::{HoldingIdentity, SecureHash, StateDetails, StateRef};

use crate::error::StorageError;
use crate::record::TransactionDetails;
use crate::session::Session;

/// The storage trait for uniqueness checker backends.
///
/// A `BackingStore` provides durable, transactional storage of state
/// records and cached transaction results, partitioned by holding identity.
///
/// ## Transaction Semantics
///
/// All mutating operations take `&mut Self::Transaction`, a type
/// representing an in-progress transaction scoped to one holding identity.
/// The lifecycle is:
///
/// 1. `begin_transaction(holding_identity)` -- returns a `Transaction`
/// 2. Read and write through it
/// 3. `commit_transaction(txn)` -- all writes become visible at once
///    OR `abort_transaction(txn)` -- all writes are discarded
///
/// If a `Transaction` is dropped without committing, its writes MUST be
/// discarded. Partial commits are never observable.
///
/// ## Isolation
///
/// Two transactions of the same holding identity that touch overlapping
/// state refs must be serializable: the "is this state consumed" read and
/// the "mark consumed" write of one transaction are atomic with respect to
/// the other. Transactions of different holding identities must not block
/// each other.
///
/// Reads performed inside a transaction observe that transaction's own
/// staged writes.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across
/// async task boundaries.
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    /// The transaction type used by this backend.
    type Transaction: Send;

    /// A session scoped to one holding identity.
    fn session(&self, holding_identity: &HoldingIdentity) -> Session<'_, Self>
    where
        Self: Sized,
    {
        Session::new(self, holding_identity.clone())
    }

    // ── Transaction lifecycle ────────────────────────────────────────────────

    /// Begin a new transaction for `holding_identity`.
    ///
    /// May wait for another transaction of the same holding identity.
    async fn begin_transaction(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> Result<Self::Transaction, StorageError>;

    /// Commit a transaction, making all writes durable and visible.
    async fn commit_transaction(&self, txn: Self::Transaction) -> Result<(), StorageError>;

    /// Abort a transaction, discarding all writes.
    async fn abort_transaction(&self, txn: Self::Transaction) -> Result<(), StorageError>;

    // ── Reads (within transaction) ───────────────────────────────────────────

    /// State records for `refs`. Refs with no record are absent from the map.
    async fn get_state_details_for_update(
        &self,
        txn: &mut Self::Transaction,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError>;

    /// Cached results for `tx_ids`. Ids never processed are absent.
    async fn get_transaction_details_for_update(
        &self,
        txn: &mut Self::Transaction,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError>;

    // ── Writes (within transaction) ──────────────────────────────────────────

    /// Register new unconsumed states.
    ///
    /// Returns `Err(StorageError::StateAlreadyExists)` if any ref already has
    /// a record; in that case nothing from this call is staged.
    async fn create_unconsumed_states(
        &self,
        txn: &mut Self::Transaction,
        refs: &[StateRef],
    ) -> Result<(), StorageError>;

    /// Mark states consumed by `consuming_tx_id`.
    ///
    /// Conflict classification is the caller's job. This method only refuses
    /// what would corrupt the store: unknown refs
    /// (`StorageError::StateNotFound`) and refs already consumed by another
    /// transaction (`StorageError::StateAlreadyConsumed`). Consuming again
    /// with the same id is a no-op.
    async fn consume_states(
        &self,
        txn: &mut Self::Transaction,
        consuming_tx_id: &SecureHash,
        refs: &[StateRef],
    ) -> Result<(), StorageError>;

    /// Record the result of each transaction for idempotent replay.
    ///
    /// Returns `Err(StorageError::TransactionAlreadyCommitted)` if an id
    /// already has a record.
    async fn commit_transactions(
        &self,
        txn: &mut Self::Transaction,
        records: Vec<TransactionDetails>,
    ) -> Result<(), StorageError>;

    // ── Reads (outside transaction) ──────────────────────────────────────────

    /// Committed state records, for diagnostics. Never use these to decide
    /// whether a state may be consumed.
    async fn get_state_details(
        &self,
        holding_identity: &HoldingIdentity,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError>;

    /// Committed transaction results.
    async fn get_transaction_details(
        &self,
        holding_identity: &HoldingIdentity,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError>;
}
