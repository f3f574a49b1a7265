#![allow(dead_code)]

use std::sync::Arc;

use notary_checker::{CheckerConfig, InMemoryMetrics, ManualClock, UniquenessChecker};
use notary_core::{CheckRequest, HoldingIdentity, SecureHash, StateRef};
use notary_storage::BackingStore;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

pub const T: OffsetDateTime = datetime!(2025-01-01 00:00:00 UTC);

pub fn alice() -> HoldingIdentity {
    HoldingIdentity::new("O=Alice, L=London, C=GB", "group-1")
}

pub fn bob() -> HoldingIdentity {
    HoldingIdentity::new("O=Bob, L=New York, C=US", "group-1")
}

pub fn tx(name: &str) -> SecureHash {
    SecureHash::sha256(name.as_bytes())
}

pub fn state(name: &str, index: u32) -> StateRef {
    StateRef::new(tx(name), index)
}

/// A request valid until `T + 10s`.
pub fn request(name: &str, inputs: Vec<StateRef>, outputs: u32) -> CheckRequest {
    CheckRequest {
        tx_id: tx(name),
        holding_identity: alice(),
        input_states: inputs,
        reference_states: Vec::new(),
        num_output_states: outputs,
        time_window_lower_bound: None,
        time_window_upper_bound: T + Duration::seconds(10),
    }
}

pub struct Harness<S: BackingStore> {
    pub checker: UniquenessChecker<S>,
    pub clock: Arc<ManualClock>,
    pub metrics: Arc<InMemoryMetrics>,
}

pub fn harness<S: BackingStore>(store: S, config: CheckerConfig) -> Harness<S> {
    let clock = Arc::new(ManualClock::new(T));
    let metrics = Arc::new(InMemoryMetrics::new());
    let checker = UniquenessChecker::new(Arc::new(store), config)
        .with_clock(clock.clone())
        .with_metrics(metrics.clone());
    Harness {
        checker,
        clock,
        metrics,
    }
}
