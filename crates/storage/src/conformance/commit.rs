use std::future::Future;

use super::{alice, bob, make_details, seed, state, tx, TestResult};
use crate::{BackingStore, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "transaction_details_round_trip",
        transaction_details_round_trip(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "unknown_transaction_ids_are_absent",
        unknown_transaction_ids_are_absent(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "recording_existing_tx_id_is_refused",
        recording_existing_tx_id_is_refused(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "commit_is_all_or_nothing",
        commit_is_all_or_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "tenants_are_partitioned",
        tenants_are_partitioned(factory).await,
    ));

    results
}

// ── 1. A recorded result reads back unchanged ────────────────────────────────

async fn transaction_details_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let details = make_details("T1");

    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    s.commit_transactions(&mut txn, vec![details.clone()])
        .await
        .map_err(|e| format!("record: {e}"))?;
    s.commit_transaction(txn)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let read = s
        .get_transaction_details(&alice(), &[tx("T1")])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match read.get(&tx("T1")) {
        Some(d) if *d == details => {}
        other => return Err(format!("expected {details:?}, got {other:?}")),
    }

    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let in_txn = s
        .get_transaction_details_for_update(&mut txn, &[tx("T1")])
        .await
        .map_err(|e| format!("read for update: {e}"))?;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;
    if in_txn.get(&tx("T1")) != Some(&details) {
        return Err(format!("in-txn read mismatch: {in_txn:?}"));
    }
    Ok(())
}

// ── 2. Ids never recorded are missing from the map ───────────────────────────

async fn unknown_transaction_ids_are_absent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let read = s
        .get_transaction_details(&alice(), &[tx("T1"), tx("T2")])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if read.is_empty() {
        Ok(())
    } else {
        Err(format!("expected empty map, got {read:?}"))
    }
}

// ── 3. Results are write-once ────────────────────────────────────────────────

async fn recording_existing_tx_id_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    s.commit_transactions(&mut txn, vec![make_details("T1")])
        .await
        .map_err(|e| format!("record: {e}"))?;
    s.commit_transaction(txn)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = s
        .commit_transactions(&mut txn, vec![make_details("T1")])
        .await;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match result {
        Err(StorageError::TransactionAlreadyCommitted { tx_id }) if tx_id == tx("T1") => Ok(()),
        other => Err(format!("expected TransactionAlreadyCommitted(T1), got {other:?}")),
    }
}

// ── 4. Commit applies states and results together ────────────────────────────

async fn commit_is_all_or_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, &alice(), &[state("T1", 0)]).await?;

    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    s.consume_states(&mut txn, &tx("T2"), &[state("T1", 0)])
        .await
        .map_err(|e| format!("consume: {e}"))?;
    s.create_unconsumed_states(&mut txn, &[state("T2", 0), state("T2", 1)])
        .await
        .map_err(|e| format!("create: {e}"))?;
    s.commit_transactions(&mut txn, vec![make_details("T2")])
        .await
        .map_err(|e| format!("record: {e}"))?;
    s.commit_transaction(txn)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let states = s
        .get_state_details(&alice(), &[state("T1", 0), state("T2", 0), state("T2", 1)])
        .await
        .map_err(|e| format!("read states: {e}"))?;
    if states.len() != 3 {
        return Err(format!("expected 3 state records, got {}", states.len()));
    }
    if states[&state("T1", 0)].consuming_tx_id != Some(tx("T2")) {
        return Err("T1:0 not consumed by T2".to_string());
    }
    let transactions = s
        .get_transaction_details(&alice(), &[tx("T2")])
        .await
        .map_err(|e| format!("read transactions: {e}"))?;
    if !transactions.contains_key(&tx("T2")) {
        return Err("T2 result missing after commit".to_string());
    }
    Ok(())
}

// ── 5. Holding identities never see each other's records ─────────────────────

async fn tenants_are_partitioned<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, &alice(), &[state("T1", 0)]).await?;

    let seen_by_bob = s
        .get_state_details(&bob(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if !seen_by_bob.is_empty() {
        return Err("bob sees alice's state".to_string());
    }

    // The same ref may exist independently for bob.
    seed(&s, &bob(), &[state("T1", 0)]).await?;
    let mut txn = s
        .begin_transaction(&bob())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    s.consume_states(&mut txn, &tx("T5"), &[state("T1", 0)])
        .await
        .map_err(|e| format!("consume: {e}"))?;
    s.commit_transaction(txn)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let alice_view = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match alice_view.get(&state("T1", 0)) {
        Some(d) if !d.is_consumed() => Ok(()),
        other => Err(format!("bob's consumption leaked to alice: {other:?}")),
    }
}
