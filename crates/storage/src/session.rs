//! Tenant-scoped handles over a [`BackingStore`].
//!
//! A [`Session`] fixes the holding identity; a [`TransactionOps`] owns one
//! open backend transaction. Dropping a `TransactionOps` without calling
//! [`TransactionOps::commit`] drops the backend transaction, which discards
//! its writes, so early returns and `?` never leave a half-applied commit.

use std::collections::HashMap;

use notary_core::{CheckRequest, CheckResult, HoldingIdentity, SecureHash, StateDetails, StateRef};

use crate::error::StorageError;
use crate::record::TransactionDetails;
use crate::traits::BackingStore;

/// Access to one holding identity's partition of a store.
pub struct Session<'s, S: BackingStore> {
    store: &'s S,
    holding_identity: HoldingIdentity,
}

impl<'s, S: BackingStore> Session<'s, S> {
    pub(crate) fn new(store: &'s S, holding_identity: HoldingIdentity) -> Self {
        Session {
            store,
            holding_identity,
        }
    }

    pub fn holding_identity(&self) -> &HoldingIdentity {
        &self.holding_identity
    }

    /// Committed state records, outside any transaction.
    pub async fn get_state_details(
        &self,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError> {
        self.store.get_state_details(&self.holding_identity, refs).await
    }

    /// Committed transaction results, outside any transaction.
    pub async fn get_transaction_details(
        &self,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError> {
        self.store
            .get_transaction_details(&self.holding_identity, tx_ids)
            .await
    }

    /// Open a transaction in this session.
    pub async fn begin_transaction(&self) -> Result<TransactionOps<'s, S>, StorageError> {
        let txn = self.store.begin_transaction(&self.holding_identity).await?;
        Ok(TransactionOps {
            store: self.store,
            txn,
        })
    }
}

/// An open transaction. Commit or abort consumes it; drop discards it.
pub struct TransactionOps<'s, S: BackingStore> {
    store: &'s S,
    txn: S::Transaction,
}

impl<'s, S: BackingStore> TransactionOps<'s, S> {
    pub async fn get_state_details(
        &mut self,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError> {
        self.store
            .get_state_details_for_update(&mut self.txn, refs)
            .await
    }

    pub async fn get_transaction_details(
        &mut self,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError> {
        self.store
            .get_transaction_details_for_update(&mut self.txn, tx_ids)
            .await
    }

    pub async fn create_unconsumed_states(&mut self, refs: &[StateRef]) -> Result<(), StorageError> {
        self.store.create_unconsumed_states(&mut self.txn, refs).await
    }

    pub async fn consume_states(
        &mut self,
        consuming_tx_id: &SecureHash,
        refs: &[StateRef],
    ) -> Result<(), StorageError> {
        self.store
            .consume_states(&mut self.txn, consuming_tx_id, refs)
            .await
    }

    /// Record `(request, result)` pairs for idempotent replay.
    pub async fn commit_transactions(
        &mut self,
        pairs: &[(CheckRequest, CheckResult)],
    ) -> Result<(), StorageError> {
        let records = pairs
            .iter()
            .map(|(request, result)| TransactionDetails::new(request, result.clone()))
            .collect();
        self.store.commit_transactions(&mut self.txn, records).await
    }

    /// Record results that have no parsed [`CheckRequest`], e.g. rejected
    /// wire messages.
    pub async fn record_transactions(
        &mut self,
        records: Vec<TransactionDetails>,
    ) -> Result<(), StorageError> {
        self.store.commit_transactions(&mut self.txn, records).await
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        self.store.commit_transaction(self.txn).await
    }

    pub async fn abort(self) -> Result<(), StorageError> {
        self.store.abort_transaction(self.txn).await
    }
}
