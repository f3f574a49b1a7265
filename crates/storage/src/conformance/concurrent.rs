use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{alice, bob, seed, state, tx, TestResult};
use crate::{BackingStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_consumers_exactly_one_wins",
        concurrent_consumers_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_creates_exactly_one_wins",
        concurrent_creates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_consumers_of_different_states_all_succeed",
        concurrent_consumers_of_different_states_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "open_transaction_does_not_block_other_tenant",
        open_transaction_does_not_block_other_tenant(factory).await,
    ));

    results
}

// ── Concurrent consumers: exactly one wins ──────────────────────────────────

/// N tasks each read T1:0, and consume it if it is still unconsumed. Exactly
/// one may commit a consumption; the rest must see the winner's id.
async fn concurrent_consumers_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), &alice(), &[state("T1", 0)]).await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let consumer = tx(&format!("consumer-{i}"));
            let mut txn = s.begin_transaction(&alice()).await?;
            let details = s
                .get_state_details_for_update(&mut txn, &[state("T1", 0)])
                .await?;
            let current = details.get(&state("T1", 0)).and_then(|d| d.consuming_tx_id);
            match current {
                None => {
                    s.consume_states(&mut txn, &consumer, &[state("T1", 0)])
                        .await?;
                    s.commit_transaction(txn).await?;
                    Ok::<_, StorageError>((consumer, None))
                }
                Some(winner) => {
                    s.abort_transaction(txn).await?;
                    Ok((consumer, Some(winner)))
                }
            }
        }));
    }

    let mut winners = Vec::new();
    let mut observed = Vec::new();
    for handle in handles {
        let (consumer, seen) = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        match seen {
            None => winners.push(consumer),
            Some(winner) => observed.push(winner),
        }
    }

    if winners.len() != 1 {
        return Err(format!("expected exactly 1 winner, got {}", winners.len()));
    }
    let winner = winners[0];
    if observed.len() != N - 1 || observed.iter().any(|w| *w != winner) {
        return Err(format!("losers saw {observed:?}, winner was {winner}"));
    }

    let details = storage
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    match details.get(&state("T1", 0)) {
        Some(d) if d.consuming_tx_id == Some(winner) => Ok(()),
        other => Err(format!("stored consumer is not the winner: {other:?}")),
    }
}

// ── Concurrent creation: exactly one wins ───────────────────────────────────

async fn concurrent_creates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut txn = s.begin_transaction(&alice()).await?;
            match s.create_unconsumed_states(&mut txn, &[state("T1", 0)]).await {
                Ok(()) => {
                    s.commit_transaction(txn).await?;
                    Ok(true)
                }
                Err(StorageError::StateAlreadyExists { .. }) => {
                    s.abort_transaction(txn).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_transaction(txn).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent consumers of different states: all succeed ───────────────────

async fn concurrent_consumers_of_different_states_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let refs: Vec<_> = (0..N as u32).map(|i| state("T1", i)).collect();
    seed(storage.as_ref(), &alice(), &refs).await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut txn = s.begin_transaction(&alice()).await?;
            s.consume_states(&mut txn, &tx(&format!("consumer-{i}")), &[state("T1", i as u32)])
                .await?;
            s.commit_transaction(txn).await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
    }

    let details = storage
        .get_state_details(&alice(), &refs)
        .await
        .map_err(|e| format!("read: {e}"))?;
    for (i, r) in refs.iter().enumerate() {
        let expected = tx(&format!("consumer-{i}"));
        if details.get(r).and_then(|d| d.consuming_tx_id) != Some(expected) {
            return Err(format!("{r} not consumed by consumer-{i}"));
        }
    }
    Ok(())
}

// ── Tenants are independent ─────────────────────────────────────────────────

/// While alice holds an open transaction, bob's transaction must still be
/// able to begin and commit.
async fn open_transaction_does_not_block_other_tenant<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let alice_txn = storage
        .begin_transaction(&alice())
        .await
        .map_err(|e| format!("begin alice: {e}"))?;

    let s = storage.clone();
    let bob_task = tokio::spawn(async move {
        let mut txn = s.begin_transaction(&bob()).await?;
        s.create_unconsumed_states(&mut txn, &[state("B1", 0)])
            .await?;
        s.commit_transaction(txn).await
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), bob_task).await;
    storage
        .abort_transaction(alice_txn)
        .await
        .map_err(|e| format!("abort alice: {e}"))?;

    match outcome {
        Ok(joined) => joined
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}")),
        Err(_) => Err("bob's transaction blocked behind alice's".to_string()),
    }
}
