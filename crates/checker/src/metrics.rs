//! Observer hooks for the checker.
//!
//! Every hook is fire-and-forget: the checker ignores what a sink does and
//! a sink has no way to influence a result.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use notary_core::{CheckResult, HoldingIdentity};
use notary_storage::StorageError;

pub trait MetricsSink: Send + Sync {
    /// A call to `process_batch` with `size` submissions.
    fn record_batch(&self, _size: usize) {}

    /// A freshly decided result.
    fn record_result(&self, _holding_identity: &HoldingIdentity, _result: &CheckResult) {}

    /// A cached result returned for a transaction id seen before.
    fn record_replay(&self, _holding_identity: &HoldingIdentity) {}

    /// A transient store failure that is about to be retried.
    fn record_retry(&self, _attempt: u32) {}

    /// A store failure, retried or not.
    fn record_store_error(&self, _error: &StorageError) {}

    /// A committed backing-store transaction and how long it stayed open.
    fn record_transaction(&self, _holding_identity: &HoldingIdentity, _elapsed: Duration) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Counters, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    batches: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    replays: AtomicU64,
    retries: AtomicU64,
    store_errors: AtomicU64,
    transactions: AtomicU64,
    failures_by_kind: Mutex<BTreeMap<&'static str, u64>>,
}

/// Point-in-time copy of [`InMemoryMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches: u64,
    pub successes: u64,
    pub failures: u64,
    pub replays: u64,
    pub retries: u64,
    pub store_errors: u64,
    pub transactions: u64,
    pub failures_by_kind: BTreeMap<&'static str, u64>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            failures_by_kind: self
                .failures_by_kind
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_batch(&self, _size: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    fn record_result(&self, _holding_identity: &HoldingIdentity, result: &CheckResult) {
        match result.error() {
            None => {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            Some(error) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                *self
                    .failures_by_kind
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(error.kind())
                    .or_insert(0) += 1;
            }
        }
    }

    fn record_replay(&self, _holding_identity: &HoldingIdentity) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self, _attempt: u32) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_store_error(&self, _error: &StorageError) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_transaction(&self, _holding_identity: &HoldingIdentity, _elapsed: Duration) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }
}
