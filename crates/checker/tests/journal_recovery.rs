mod common;

use std::io::Write;

use common::{alice, harness, request, state, tx};
use notary_checker::CheckerConfig;
use notary_core::CheckError;
use notary_storage::{BackingStore, JournalBackingStore};
use tempfile::TempDir;
use time::Duration;

#[tokio::test]
async fn decisions_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal");

    let (t1, t2) = {
        let store = JournalBackingStore::open(&path, true).await.unwrap();
        let h = harness(store, CheckerConfig::default());
        let t1 = h.checker.process(request("T1", vec![], 2)).await.unwrap();
        h.clock.advance(Duration::seconds(1));
        let t2 = h
            .checker
            .process(request("T2", vec![state("T1", 0)], 1))
            .await
            .unwrap();
        (t1, t2)
    };

    let store = JournalBackingStore::open(&path, true).await.unwrap();
    let h = harness(store, CheckerConfig::default());
    h.clock.advance(Duration::seconds(3));

    // Replays come back unchanged after restart.
    assert_eq!(h.checker.process(request("T1", vec![], 2)).await.unwrap(), t1);
    assert_eq!(
        h.checker
            .process(request("T2", vec![state("T1", 0)], 1))
            .await
            .unwrap(),
        t2
    );

    // The consumption survived too.
    let result = h
        .checker
        .process(request("T3", vec![state("T1", 0)], 0))
        .await
        .unwrap();
    match result.error() {
        Some(CheckError::InputStateConflict { conflicting_states }) => {
            assert_eq!(conflicting_states[0].consuming_tx_id, Some(tx("T2")));
        }
        other => panic!("expected InputStateConflict, got {other:?}"),
    }

    let unspent = h
        .checker
        .store()
        .get_state_details(&alice(), &[state("T1", 1), state("T2", 0)])
        .await
        .unwrap();
    assert_eq!(unspent.len(), 2);
    assert!(unspent.values().all(|d| !d.is_consumed()));
}

#[tokio::test]
async fn torn_write_is_forgotten_on_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("journal");

    let segment = {
        let store = JournalBackingStore::open(&path, true).await.unwrap();
        let segment = store.segment_path(&alice());
        let h = harness(store, CheckerConfig::default());
        h.checker.process(request("T1", vec![], 1)).await.unwrap();
        segment
    };

    // A crash in the middle of appending the next entry.
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&segment).unwrap();
        file.write_all(br#"{"holding_identity":{"x500_name":"O=Alice"#)
            .unwrap();
    }

    let store = JournalBackingStore::open(&path, true).await.unwrap();
    let h = harness(store, CheckerConfig::default());
    let result = h
        .checker
        .process(request("T2", vec![state("T1", 0)], 0))
        .await
        .unwrap();
    assert!(result.is_success());
}
