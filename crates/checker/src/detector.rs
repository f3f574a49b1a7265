//! The uniqueness decision for a single request.
//!
//! Checks run in a fixed order so the reported error is reproducible:
//!
//! 1. structure (`MalformedRequest`)
//! 2. time window (`TimeWindowOutOfBounds`)
//! 3. inputs: unknown before conflicting
//! 4. references: unknown before conflicting
//!
//! The first failing step decides the result. Each step lists every
//! offending state, not only the first.

use std::collections::HashMap;

use notary_core::{
    validate_time_window, CheckError, CheckRequest, CheckResult, StateDetails, StateRef,
};
use time::OffsetDateTime;

pub struct ConflictDetector;

impl ConflictDetector {
    /// Decide `request` against the store's view of its states.
    ///
    /// `states` holds a record for every input and reference the store
    /// knows; a ref missing from the map is unknown. `now` becomes the
    /// result timestamp.
    pub fn check(
        request: &CheckRequest,
        now: OffsetDateTime,
        states: &HashMap<StateRef, StateDetails>,
    ) -> CheckResult {
        match Self::first_error(request, now, states) {
            Some(error) => CheckResult::failure(now, error),
            None => CheckResult::success(now),
        }
    }

    fn first_error(
        request: &CheckRequest,
        now: OffsetDateTime,
        states: &HashMap<StateRef, StateDetails>,
    ) -> Option<CheckError> {
        if let Err(e) = request.validate() {
            return Some(CheckError::MalformedRequest {
                error_text: e.to_string(),
            });
        }

        if let Err(e) = validate_time_window(
            now,
            request.time_window_lower_bound,
            request.time_window_upper_bound,
        ) {
            return Some(e);
        }

        let inputs = partition(&request.input_states, states, |d| {
            d.is_consumed_by_other(&request.tx_id)
        });
        if !inputs.unknown.is_empty() {
            return Some(CheckError::InputStateUnknown {
                unknown_states: inputs.unknown,
            });
        }
        if !inputs.conflicting.is_empty() {
            return Some(CheckError::InputStateConflict {
                conflicting_states: inputs.conflicting,
            });
        }

        // A reference vouches for a state that is still current, so any
        // consumption at all is a conflict.
        let references = partition(&request.reference_states, states, StateDetails::is_consumed);
        if !references.unknown.is_empty() {
            return Some(CheckError::ReferenceStateUnknown {
                unknown_states: references.unknown,
            });
        }
        if !references.conflicting.is_empty() {
            return Some(CheckError::ReferenceStateConflict {
                conflicting_states: references.conflicting,
            });
        }

        None
    }
}

struct Partition {
    unknown: Vec<StateRef>,
    conflicting: Vec<StateDetails>,
}

fn partition(
    refs: &[StateRef],
    states: &HashMap<StateRef, StateDetails>,
    conflicts: impl Fn(&StateDetails) -> bool,
) -> Partition {
    let mut out = Partition {
        unknown: Vec::new(),
        conflicting: Vec::new(),
    };
    for state_ref in refs {
        match states.get(state_ref) {
            None => out.unknown.push(*state_ref),
            Some(details) if conflicts(details) => out.conflicting.push(details.clone()),
            Some(_) => {}
        }
    }
    out
}
