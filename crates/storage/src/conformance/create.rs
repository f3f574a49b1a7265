use std::future::Future;

use super::{alice, seed, seed_consumed, state, tx, TestResult};
use crate::{BackingStore, StorageError};

pub(super) async fn run_create_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "create",
        "created_states_are_unconsumed",
        created_states_are_unconsumed(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "unknown_states_are_absent",
        unknown_states_are_absent(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "create_existing_state_is_refused",
        create_existing_state_is_refused(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "create_consumed_state_does_not_reset_it",
        create_consumed_state_does_not_reset_it(factory).await,
    ));
    results.push(TestResult::from_result(
        "create",
        "create_duplicate_in_one_call_is_refused",
        create_duplicate_in_one_call_is_refused(factory).await,
    ));

    results
}

// ── 1. Created states read back unconsumed ───────────────────────────────────

async fn created_states_are_unconsumed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let refs = [state("T1", 0), state("T1", 1), state("T1", 2)];
    seed(&s, &alice(), &refs).await?;

    let details = s
        .get_state_details(&alice(), &refs)
        .await
        .map_err(|e| format!("read: {e}"))?;
    if details.len() != 3 {
        return Err(format!("expected 3 records, got {}", details.len()));
    }
    for r in &refs {
        match details.get(r) {
            Some(d) if d.state_ref == *r && d.consuming_tx_id.is_none() => {}
            other => return Err(format!("expected unconsumed record for {r}, got {other:?}")),
        }
    }
    Ok(())
}

// ── 2. Refs never created are missing from the map ───────────────────────────

async fn unknown_states_are_absent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, &alice(), &[state("T1", 0)]).await?;

    let details = s
        .get_state_details(&alice(), &[state("T1", 0), state("T1", 1), state("T9", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if details.len() != 1 || !details.contains_key(&state("T1", 0)) {
        return Err(format!("expected only T1:0, got {:?}", details.keys()));
    }

    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let in_txn = s
        .get_state_details_for_update(&mut txn, &[state("T9", 0)])
        .await
        .map_err(|e| format!("read for update: {e}"))?;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;
    if !in_txn.is_empty() {
        return Err(format!("expected empty map in txn, got {in_txn:?}"));
    }
    Ok(())
}

// ── 3. Creating an existing state fails with StateAlreadyExists ──────────────

async fn create_existing_state_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = s
        .create_unconsumed_states(&mut txn, &[state("T1", 1), state("T1", 0)])
        .await;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match result {
        Err(StorageError::StateAlreadyExists { state_ref }) if state_ref == state("T1", 0) => {}
        other => return Err(format!("expected StateAlreadyExists(T1:0), got {other:?}")),
    }

    // Nothing from the refused call is visible, including T1:1.
    let details = s
        .get_state_details(&alice(), &[state("T1", 1)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if !details.is_empty() {
        return Err("refused create left T1:1 behind".to_string());
    }
    Ok(())
}

// ── 4. A consumed state stays consumed ───────────────────────────────────────

async fn create_consumed_state_does_not_reset_it<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, &alice(), &[state("T1", 0)]).await?;
    seed_consumed(&s, &alice(), &tx("T2"), &[state("T1", 0)]).await?;

    let mut txn = s
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = s.create_unconsumed_states(&mut txn, &[state("T1", 0)]).await;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;
    if !matches!(result, Err(StorageError::StateAlreadyExists { .. })) {
        return Err(format!("expected StateAlreadyExists, got {result:?}"));
    }

    let details = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if d.consuming_tx_id == Some(tx("T2")) => Ok(()),
        other => Err(format!("expected T1:0 consumed by T2, got {other:?}")),
    }
}

// ── 5. The same ref twice in one call is a duplicate ─────────────────────────

async fn create_duplicate_in_one_call_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = s
        .create_unconsumed_states(&mut txn, &[state("T1", 0), state("T1", 0)])
        .await;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match result {
        Err(StorageError::StateAlreadyExists { .. }) => Ok(()),
        other => Err(format!("expected StateAlreadyExists, got {other:?}")),
    }
}
