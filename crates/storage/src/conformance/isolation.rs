use std::future::Future;

use super::{alice, make_details, seed, state, tx, TestResult};
use crate::BackingStore;

pub(super) async fn run_isolation_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "isolation",
        "aborted_writes_are_discarded",
        aborted_writes_are_discarded(factory).await,
    ));
    results.push(TestResult::from_result(
        "isolation",
        "dropped_transaction_rolls_back",
        dropped_transaction_rolls_back(factory).await,
    ));
    results.push(TestResult::from_result(
        "isolation",
        "failed_write_does_not_poison_transaction",
        failed_write_does_not_poison_transaction(factory).await,
    ));

    results
}

// ── 1. Abort discards every staged write ─────────────────────────────────────

async fn aborted_writes_are_discarded<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.create_unconsumed_states(&mut txn, &[state("T2", 0)])
        .await
        .map_err(|e| format!("create: {e}"))?;
    s.commit_transactions(&mut txn, vec![make_details("T2")])
        .await
        .map_err(|e| format!("record: {e}"))?;
    s.abort_transaction(txn)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let states = s
        .get_state_details(&alice(), &[state("T1", 0), state("T2", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if states.len() != 1 || states[&state("T1", 0)].is_consumed() {
        return Err(format!("aborted writes visible: {states:?}"));
    }
    let transactions = s
        .get_transaction_details(&alice(), &[tx("T2")])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if !transactions.is_empty() {
        return Err("aborted result visible".to_string());
    }
    Ok(())
}

// ── 2. Dropping without commit is an abort ───────────────────────────────────

async fn dropped_transaction_rolls_back<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: BackingStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    {
        let mut txn = s
            .begin_transaction(&alice())
            .await
            .map_err(|e| format!("begin: {e}"))?;
        s.create_unconsumed_states(&mut txn, &[state("T1", 0)])
            .await
            .map_err(|e| format!("create: {e}"))?;
    }

    let states = s
        .get_state_details(&alice(), &[state("T1", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if !states.is_empty() {
        return Err("dropped txn's write visible".to_string());
    }

    // The tenant must be usable again after the drop.
    seed(&s, &alice(), &[state("T1", 0)]).await
}

// ── 3. A refused write leaves earlier writes of the txn intact ───────────────

async fn failed_write_does_not_poison_transaction<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.create_unconsumed_states(&mut txn, &[state("T2", 0)])
        .await
        .map_err(|e| format!("create: {e}"))?;
    if s.create_unconsumed_states(&mut txn, &[state("T1", 0)])
        .await
        .is_ok()
    {
        return Err("duplicate create accepted".to_string());
    }
    s.commit_transaction(txn)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let states = s
        .get_state_details(&alice(), &[state("T1", 0), state("T2", 0)])
        .await
        .map_err(|e| format!("read: {e}"))?;
    if states.len() == 2 {
        Ok(())
    } else {
        Err(format!("expected T1:0 and T2:0, got {states:?}"))
    }
}
