//! Per-tenant tables and the single-writer transaction shared by the
//! in-memory and journal backends.
//!
//! Each holding identity owns one async mutex around its tables. A
//! transaction holds that mutex from begin to commit/abort, which makes
//! transactions of one tenant serial and leaves other tenants untouched.
//! Writes are staged beside the tables and folded in only on commit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use notary_core::{HoldingIdentity, SecureHash, StateDetails, StateRef};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::StorageError;
use crate::record::{JournalEntry, TransactionDetails};

/// Committed records of one holding identity.
#[derive(Debug, Default)]
pub(crate) struct TenantTables {
    states: HashMap<StateRef, Option<SecureHash>>,
    transactions: HashMap<SecureHash, TransactionDetails>,
}

impl TenantTables {
    /// Fold a committed entry in. Creation never overwrites an existing
    /// record, so a consumed state cannot be reset.
    pub(crate) fn apply(&mut self, entry: &JournalEntry) {
        for state_ref in &entry.created {
            self.states.entry(*state_ref).or_insert(None);
        }
        for (state_ref, consumer) in &entry.consumed {
            self.states.insert(*state_ref, Some(*consumer));
        }
        for details in &entry.transactions {
            self.transactions.insert(details.tx_id, details.clone());
        }
    }

    pub(crate) fn state_details(&self, refs: &[StateRef]) -> HashMap<StateRef, StateDetails> {
        refs.iter()
            .filter_map(|r| {
                self.states.get(r).map(|consumer| {
                    (
                        *r,
                        StateDetails {
                            state_ref: *r,
                            consuming_tx_id: *consumer,
                        },
                    )
                })
            })
            .collect()
    }

    pub(crate) fn transaction_details(
        &self,
        tx_ids: &[SecureHash],
    ) -> HashMap<SecureHash, TransactionDetails> {
        tx_ids
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|d| (*id, d.clone())))
            .collect()
    }
}

/// Holding identity -> tables.
#[derive(Default)]
pub(crate) struct TenantRegistry {
    tenants: Mutex<HashMap<HoldingIdentity, Arc<AsyncMutex<TenantTables>>>>,
}

impl TenantRegistry {
    fn tenant(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> Result<Arc<AsyncMutex<TenantTables>>, StorageError> {
        let mut tenants = self
            .tenants
            .lock()
            .map_err(|_| StorageError::Backend("tenant registry lock poisoned".to_string()))?;
        Ok(tenants.entry(holding_identity.clone()).or_default().clone())
    }

    fn existing(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> Result<Option<Arc<AsyncMutex<TenantTables>>>, StorageError> {
        let tenants = self
            .tenants
            .lock()
            .map_err(|_| StorageError::Backend("tenant registry lock poisoned".to_string()))?;
        Ok(tenants.get(holding_identity).cloned())
    }

    pub(crate) fn tenant_count(&self) -> usize {
        self.tenants.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// Begin a transaction, waiting for any open transaction of the same tenant.
    pub(crate) async fn begin(
        &self,
        holding_identity: &HoldingIdentity,
    ) -> Result<TenantTransaction, StorageError> {
        let tables = self.tenant(holding_identity)?.lock_owned().await;
        Ok(TenantTransaction {
            tables,
            staged_states: HashMap::new(),
            staged_transactions: HashMap::new(),
            entry: JournalEntry::new(holding_identity.clone()),
        })
    }

    /// Read committed tables. A tenant never seen reads as empty.
    pub(crate) async fn read<T>(
        &self,
        holding_identity: &HoldingIdentity,
        f: impl FnOnce(&TenantTables) -> T,
    ) -> Result<T, StorageError> {
        match self.existing(holding_identity)? {
            Some(tenant) => {
                let tables = tenant.lock().await;
                Ok(f(&tables))
            }
            None => Ok(f(&TenantTables::default())),
        }
    }

    /// Apply an entry outside any transaction (journal replay).
    pub(crate) async fn apply(&self, entry: &JournalEntry) -> Result<(), StorageError> {
        let tenant = self.tenant(&entry.holding_identity)?;
        tenant.lock().await.apply(entry);
        Ok(())
    }
}

/// An open transaction over one tenant's tables.
///
/// Holds the tenant's mutex until dropped. Staged writes are lost on drop.
pub struct TenantTransaction {
    tables: OwnedMutexGuard<TenantTables>,
    staged_states: HashMap<StateRef, Option<SecureHash>>,
    staged_transactions: HashMap<SecureHash, TransactionDetails>,
    entry: JournalEntry,
}

impl TenantTransaction {
    pub fn holding_identity(&self) -> &HoldingIdentity {
        &self.entry.holding_identity
    }

    fn lookup_state(&self, state_ref: &StateRef) -> Option<Option<SecureHash>> {
        self.staged_states
            .get(state_ref)
            .or_else(|| self.tables.states.get(state_ref))
            .copied()
    }

    fn has_transaction(&self, tx_id: &SecureHash) -> bool {
        self.staged_transactions.contains_key(tx_id)
            || self.tables.transactions.contains_key(tx_id)
    }

    pub(crate) fn state_details(&self, refs: &[StateRef]) -> HashMap<StateRef, StateDetails> {
        refs.iter()
            .filter_map(|r| {
                self.lookup_state(r).map(|consumer| {
                    (
                        *r,
                        StateDetails {
                            state_ref: *r,
                            consuming_tx_id: consumer,
                        },
                    )
                })
            })
            .collect()
    }

    pub(crate) fn transaction_details(
        &self,
        tx_ids: &[SecureHash],
    ) -> HashMap<SecureHash, TransactionDetails> {
        tx_ids
            .iter()
            .filter_map(|id| {
                self.staged_transactions
                    .get(id)
                    .or_else(|| self.tables.transactions.get(id))
                    .map(|d| (*id, d.clone()))
            })
            .collect()
    }

    pub(crate) fn create_unconsumed(&mut self, refs: &[StateRef]) -> Result<(), StorageError> {
        let mut seen = HashSet::with_capacity(refs.len());
        for state_ref in refs {
            if self.lookup_state(state_ref).is_some() || !seen.insert(*state_ref) {
                return Err(StorageError::StateAlreadyExists {
                    state_ref: *state_ref,
                });
            }
        }
        for state_ref in refs {
            self.staged_states.insert(*state_ref, None);
            self.entry.created.push(*state_ref);
        }
        Ok(())
    }

    pub(crate) fn consume(
        &mut self,
        consuming_tx_id: &SecureHash,
        refs: &[StateRef],
    ) -> Result<(), StorageError> {
        for state_ref in refs {
            match self.lookup_state(state_ref) {
                None => {
                    return Err(StorageError::StateNotFound {
                        state_ref: *state_ref,
                    })
                }
                Some(Some(consumer)) if consumer != *consuming_tx_id => {
                    return Err(StorageError::StateAlreadyConsumed {
                        state_ref: *state_ref,
                        consuming_tx_id: consumer,
                    })
                }
                Some(_) => {}
            }
        }
        for state_ref in refs {
            if self.lookup_state(state_ref) == Some(None) {
                self.staged_states.insert(*state_ref, Some(*consuming_tx_id));
                self.entry.consumed.push((*state_ref, *consuming_tx_id));
            }
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, records: Vec<TransactionDetails>) -> Result<(), StorageError> {
        let mut seen = HashSet::with_capacity(records.len());
        for details in &records {
            if self.has_transaction(&details.tx_id) || !seen.insert(details.tx_id) {
                return Err(StorageError::TransactionAlreadyCommitted {
                    tx_id: details.tx_id,
                });
            }
        }
        for details in records {
            self.staged_transactions.insert(details.tx_id, details.clone());
            self.entry.transactions.push(details);
        }
        Ok(())
    }

    /// The tenant's tables, still locked, and everything staged.
    pub(crate) fn into_parts(self) -> (OwnedMutexGuard<TenantTables>, JournalEntry) {
        (self.tables, self.entry)
    }
}
