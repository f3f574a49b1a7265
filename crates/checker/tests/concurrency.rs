mod common;

use std::sync::Arc;

use common::{alice, request, state, tx, T};
use notary_checker::{CheckerConfig, ManualClock, UniquenessChecker};
use notary_core::{CheckError, CheckResult, StateDetails};
use notary_storage::{BackingStore, InMemoryBackingStore};

const ROUNDS: usize = 1000;

/// Two transactions race to consume the same state. Exactly one may win, and
/// the loser's conflict must name the winner.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_double_spend_has_exactly_one_winner() {
    for round in 0..ROUNDS {
        let checker = Arc::new(
            UniquenessChecker::new(Arc::new(InMemoryBackingStore::new()), CheckerConfig::default())
                .with_clock(Arc::new(ManualClock::new(T))),
        );
        let issue = format!("issue-{round}");
        checker.process(request(&issue, vec![], 1)).await.unwrap();
        let contested = state(&issue, 0);

        let spend_a = format!("spend-a-{round}");
        let spend_b = format!("spend-b-{round}");
        let a = {
            let checker = checker.clone();
            let req = request(&spend_a, vec![contested], 0);
            tokio::spawn(async move { checker.process(req).await })
        };
        let b = {
            let checker = checker.clone();
            let req = request(&spend_b, vec![contested], 0);
            tokio::spawn(async move { checker.process(req).await })
        };
        let result_a = a.await.unwrap().unwrap();
        let result_b = b.await.unwrap().unwrap();

        let (winner, loser_result) = match (result_a.is_success(), result_b.is_success()) {
            (true, false) => (tx(&spend_a), result_b),
            (false, true) => (tx(&spend_b), result_a),
            other => panic!("round {round}: expected exactly one success, got {other:?}"),
        };
        assert_eq!(
            loser_result,
            CheckResult::failure(
                T,
                CheckError::InputStateConflict {
                    conflicting_states: vec![StateDetails::consumed(contested, winner)]
                }
            ),
            "round {round}"
        );

        let stored = checker
            .store()
            .get_state_details(&alice(), &[contested])
            .await
            .unwrap();
        assert_eq!(stored[&contested].consuming_tx_id, Some(winner), "round {round}");
    }
}

/// Many deliveries of the same transaction id at once decide it once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redelivery_decides_once() {
    let checker = Arc::new(
        UniquenessChecker::new(Arc::new(InMemoryBackingStore::new()), CheckerConfig::default())
            .with_clock(Arc::new(ManualClock::new(T))),
    );
    checker.process(request("T1", vec![], 1)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let checker = checker.clone();
        handles.push(tokio::spawn(async move {
            checker
                .process(request("T2", vec![state("T1", 0)], 1))
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }
    assert!(results.iter().all(|r| *r == CheckResult::success(T)));

    let stored = checker
        .store()
        .get_state_details(&alice(), &[state("T1", 0), state("T2", 0)])
        .await
        .unwrap();
    assert_eq!(stored[&state("T1", 0)].consuming_tx_id, Some(tx("T2")));
    assert!(!stored[&state("T2", 0)].is_consumed());
}
