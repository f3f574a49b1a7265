use std::collections::HashMap;

use async_trait::async_trait;
use notary_core::{HoldingIdentity, SecureHash, StateDetails, StateRef};
use tracing::debug;

use crate::error::StorageError;
use crate::record::TransactionDetails;
use crate::tenant::{TenantRegistry, TenantTransaction};
use crate::traits::BackingStore;

/// Non-durable backend. Each holding identity is a single writer: a
/// transaction holds its tenant's lock from begin to commit or abort.
#[derive(Default)]
pub struct InMemoryBackingStore {
    registry: TenantRegistry,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of holding identities that have opened a transaction.
    pub fn tenant_count(&self) -> usize {
        self.registry.tenant_count()
    }
}

#[async_trait]
impl BackingStore for InMemoryBackingStore {
    type Transaction = TenantTransaction;

    async fn begin_transaction(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> Result<TenantTransaction, StorageError> {
        self.registry.begin(holding_identity).await
    }

    async fn commit_transaction(&self, txn: TenantTransaction) -> Result<(), StorageError> {
        let (mut tables, entry) = txn.into_parts();
        debug!(
            holding_identity = %entry.holding_identity.short_hash(),
            created = entry.created.len(),
            consumed = entry.consumed.len(),
            transactions = entry.transactions.len(),
            "committing in-memory transaction"
        );
        tables.apply(&entry);
        Ok(())
    }

    async fn abort_transaction(&self, txn: TenantTransaction) -> Result<(), StorageError> {
        drop(txn);
        Ok(())
    }

    async fn get_state_details_for_update(
        &self,
        txn: &mut TenantTransaction,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError> {
        Ok(txn.state_details(refs))
    }

    async fn get_transaction_details_for_update(
        &self,
        txn: &mut TenantTransaction,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError> {
        Ok(txn.transaction_details(tx_ids))
    }

    async fn create_unconsumed_states(
        &self,
        txn: &mut TenantTransaction,
        refs: &[StateRef],
    ) -> Result<(), StorageError> {
        txn.create_unconsumed(refs)
    }

    async fn consume_states(
        &self,
        txn: &mut TenantTransaction,
        consuming_tx_id: &SecureHash,
        refs: &[StateRef],
    ) -> Result<(), StorageError> {
        txn.consume(consuming_tx_id, refs)
    }

    async fn commit_transactions(
        &self,
        txn: &mut TenantTransaction,
        records: Vec<TransactionDetails>,
    ) -> Result<(), StorageError> {
        txn.record(records)
    }

    async fn get_state_details(
        &self,
        holding_identity: &HoldingIdentity,
        refs: &[StateRef],
    ) -> Result<HashMap<StateRef, StateDetails>, StorageError> {
        self.registry
            .read(holding_identity, |tables| tables.state_details(refs))
            .await
    }

    async fn get_transaction_details(
        &self,
        holding_identity: &HoldingIdentity,
        tx_ids: &[SecureHash],
    ) -> Result<HashMap<SecureHash, TransactionDetails>, StorageError> {
        self.registry
            .read(holding_identity, |tables| tables.transaction_details(tx_ids))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_memory_store_passes_conformance_suite() {
        let report = run_conformance_suite(|| async { InMemoryBackingStore::new() }).await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }

    #[tokio::test]
    async fn tenants_are_created_lazily() {
        let store = InMemoryBackingStore::new();
        let alice = HoldingIdentity::new("O=Alice, L=London, C=GB", "group-1");

        store.get_state_details(&alice, &[]).await.unwrap();
        assert_eq!(store.tenant_count(), 0);

        let txn = store.begin_transaction(&alice).await.unwrap();
        store.abort_transaction(txn).await.unwrap();
        assert_eq!(store.tenant_count(), 1);
    }
}
