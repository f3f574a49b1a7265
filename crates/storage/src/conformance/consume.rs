use std::future::Future;

use super::{alice, seed, seed_consumed, state, tx, TestResult};
use crate::{BackingStore, StorageError};

pub(super) async fn run_consume_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "consume",
        "consume_records_consuming_tx_id",
        consume_records_consuming_tx_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "consume_unknown_state_is_refused",
        consume_unknown_state_is_refused(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "consume_twice_by_other_is_refused",
        consume_twice_by_other_is_refused(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "consume_again_by_same_tx_is_noop",
        consume_again_by_same_tx_is_noop(factory).await,
    ));
    results.push(TestResult::from_result(
        "consume",
        "consume_states_created_in_same_txn",
        consume_states_created_in_same_txn(factory).await,
    ));

    results
}

// ── 1. Consuming sets consuming_tx_id ────────────────────────────────────────

async fn consume_records_consuming_tx_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, &alice(), &[state("T1", 0), state("T1", 1)]).await?;
    seed_consumed(&s, &alice(), &tx("T2"), &[state("T1", 0)]).await?;

    let details = s
        .get_state_details(&alice(), &[state("T1", 0), state("T1", 1)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if d.consuming_tx_id == Some(tx("T2")) => {}
        other => return Err(format!("expected T1:0 consumed by T2, got {other:?}")),
    }
    match details.get(&state("T1", 1)) {
        Some(d) if d.consuming_tx_id.is_none() => Ok(()),
        other => Err(format!("expected T1:1 unconsumed, got {other:?}")),
    }
}

// ── 2. Unknown refs cannot be consumed ───────────────────────────────────────

async fn consume_unknown_state_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .consume_states(&mut txn, &tx("T2"), &[state("T1", 0), state("T9", 0)])
        .await;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match result {
        Err(StorageError::StateNotFound { state_ref }) if state_ref == state("T9", 0) => {}
        other => return Err(format!("expected StateNotFound(T9:0), got {other:?}")),
    }

    // The refused call must not have consumed T1:0 either.
    let details = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if !d.is_consumed() => Ok(()),
        other => Err(format!("expected T1:0 unconsumed, got {other:?}")),
    }
}

// ── 3. Consumption is write-once ─────────────────────────────────────────────

async fn consume_twice_by_other_is_refused<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = s
        .consume_states(&mut txn, &tx("T3"), &[state("T1", 0)])
        .await;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match result {
        Err(StorageError::StateAlreadyConsumed {
            state_ref,
            consuming_tx_id,
        }) if state_ref == state("T1", 0) && consuming_tx_id == tx("T2") => {}
        other => return Err(format!("expected StateAlreadyConsumed by T2, got {other:?}")),
    }

    let details = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if d.consuming_tx_id == Some(tx("T2")) => Ok(()),
        other => Err(format!("consumer changed: {other:?}")),
    }
}

// ── 4. Replaying a consumption with the same id changes nothing ──────────────

async fn consume_again_by_same_tx_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, &alice(), &[state("T1", 0)]).await?;
    seed_consumed(&s, &alice(), &tx("T2"), &[state("T1", 0)]).await?;
    seed_consumed(&s, &alice(), &tx("T2"), &[state("T1", 0)]).await?;

    let details = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if d.consuming_tx_id == Some(tx("T2")) => Ok(()),
        other => Err(format!("expected T1:0 consumed by T2, got {other:?}")),
    }
}

// ── 5. Reads in a txn observe its own staged writes ──────────────────────────

async fn consume_states_created_in_same_txn<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.create_unconsumed_states(&mut txn, &[state("T1", 0)])
        .await
        .map_err(|e| format!("create: {e}"))?;

    let staged = s
        .get_state_details_for_update(&mut txn, &[state("T1", 0)])
        .await
        .map_err(|e| format!("read for update: {e}"))?;
    if staged.get(&state("T1", 0)).map(|d| d.is_consumed()) != Some(false) {
        return Err(format!("staged create not visible in txn: {staged:?}"));
    }

    s.consume_states(&mut txn, &tx("T2"), &[state("T1", 0)])
        .await
        .map_err(|e| format!("consume: {e}"))?;
    let staged = s
        .get_state_details_for_update(&mut txn, &[state("T1", 0)])
        .await
        .map_err(|e| format!("read for update: {e}"))?;
    if staged.get(&state("T1", 0)).and_then(|d| d.consuming_tx_id) != Some(tx("T2")) {
        return Err(format!("staged consume not visible in txn: {staged:?}"));
    }

    s.commit_transaction(txn)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let details = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if d.consuming_tx_id == Some(tx("T2")) => Ok(()),
        other => Err(format!("expected T1:0 consumed by T2, got {other:?}")),
    }
}
