//! Backend-agnostic checks of the `BackingStore` contract.
//!
//! A backend's own test calls [`run_conformance_suite`] with a factory that
//! returns a fresh, empty store, and asserts the report has no failures:
//!
//! ```ignore
//! #[tokio::test(flavor = "multi_thread")]
//! async fn my_store_conformance() {
//!     let report = run_conformance_suite(|| async { MyStore::connect().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```
//!
//! Categories: `create` and `consume` pin down the write-once state
//! lifecycle, `commit` the cached transaction records and atomic commit,
//! `isolation` rollback on abort, drop or failed write, and `concurrent`
//! the racing-consumer and tenant-independence guarantees. The concurrent
//! checks spawn tasks, so run the suite on a multi-threaded runtime.

mod commit;
mod concurrent;
mod consume;
mod create;
mod isolation;

use std::fmt;
use std::future::Future;

use notary_core::{CheckResult, HoldingIdentity, SecureHash, StateRef};
use time::OffsetDateTime;

use crate::record::TransactionDetails;
use crate::BackingStore;

/// Outcome of one check. `message` says what went wrong when it failed.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub category: &'static str,
    pub name: &'static str,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &'static str, name: &'static str, outcome: Result<(), String>) -> Self {
        let message = outcome.err();
        TestResult {
            category,
            name,
            passed: message.is_none(),
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ConformanceReport {
    fn from_results(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        ConformanceReport {
            passed,
            failed: results.len() - passed,
            total: results.len(),
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} of {} store checks failed", self.failed, self.total)?;
        for failure in self.failures() {
            writeln!(
                f,
                "  {}::{}: {}",
                failure.category,
                failure.name,
                failure.message.as_deref().unwrap_or("failed")
            )?;
        }
        Ok(())
    }
}

/// Run every category against stores from `factory`, one fresh store per check.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = create::run_create_tests(&factory).await;
    results.extend(consume::run_consume_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(isolation::run_isolation_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    ConformanceReport::from_results(results)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn alice() -> HoldingIdentity {
    HoldingIdentity::new("O=Alice, L=London, C=GB", "conformance-group")
}

fn bob() -> HoldingIdentity {
    HoldingIdentity::new("O=Bob, L=New York, C=US", "conformance-group")
}

/// A transaction id derived from a short name, e.g. `tx("T1")`.
fn tx(name: &str) -> SecureHash {
    SecureHash::sha256(name.as_bytes())
}

fn state(tx_name: &str, index: u32) -> StateRef {
    StateRef::new(tx(tx_name), index)
}

fn make_details(tx_name: &str) -> TransactionDetails {
    TransactionDetails {
        tx_id: tx(tx_name),
        request_digest: SecureHash::sha256(format!("request-{tx_name}").as_bytes()),
        result: CheckResult::success(OffsetDateTime::UNIX_EPOCH),
    }
}

/// Begin, create `refs`, commit.
async fn seed<S: BackingStore>(
    store: &S,
    holding_identity: &HoldingIdentity,
    refs: &[StateRef],
) -> Result<(), String> {
    let mut txn = store
        .begin_transaction(holding_identity)
        .await
        .map_err(|e| format!("begin: {e}"))?;
    store
        .create_unconsumed_states(&mut txn, refs)
        .await
        .map_err(|e| format!("create: {e}"))?;
    store
        .commit_transaction(txn)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}

/// Begin, consume `refs` with `consumer`, commit.
async fn seed_consumed<S: BackingStore>(
    store: &S,
    holding_identity: &HoldingIdentity,
    consumer: &SecureHash,
    refs: &[StateRef],
) -> Result<(), String> {
    let mut txn = store
        .begin_transaction(holding_identity)
        .await
        .map_err(|e| format!("begin: {e}"))?;
    store
        .consume_states(&mut txn, consumer, refs)
        .await
        .map_err(|e| format!("consume: {e}"))?;
    store
        .commit_transaction(txn)
        .await
        .map_err(|e| format!("commit consume: {e}"))
}
