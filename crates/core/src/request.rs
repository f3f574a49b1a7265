//! Check requests, in validated and wire form.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::RequestError;
use crate::hash::SecureHash;
use crate::identity::HoldingIdentity;
use crate::state::StateRef;

/// A request to check, and on success consume, the states of one transaction.
///
/// Immutable once built. Values obtained from [`CheckRequestMessage::parse`]
/// are structurally valid; values built by hand can be checked with
/// [`CheckRequest::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub tx_id: SecureHash,
    pub holding_identity: HoldingIdentity,
    pub input_states: Vec<StateRef>,
    pub reference_states: Vec<StateRef>,
    pub num_output_states: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub time_window_lower_bound: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub time_window_upper_bound: OffsetDateTime,
}

impl CheckRequest {
    /// Structural checks that do not need the store.
    ///
    /// Rejects duplicate inputs, duplicate references, and any state listed
    /// in both lists. Reports the first offending state in request order.
    pub fn validate(&self) -> Result<(), RequestError> {
        let mut inputs = HashSet::with_capacity(self.input_states.len());
        for state in &self.input_states {
            if !inputs.insert(*state) {
                return Err(RequestError::DuplicateInputState(*state));
            }
        }

        let mut references = HashSet::with_capacity(self.reference_states.len());
        for state in &self.reference_states {
            if !references.insert(*state) {
                return Err(RequestError::DuplicateReferenceState(*state));
            }
            if inputs.contains(state) {
                return Err(RequestError::OverlappingState(*state));
            }
        }
        Ok(())
    }

    /// Reject a request that would create more than `max` output states.
    ///
    /// Run before [`output_state_refs`](Self::output_state_refs), which
    /// allocates one ref per output.
    pub fn check_output_count(&self, max: u32) -> Result<(), RequestError> {
        if self.num_output_states > max {
            return Err(RequestError::TooManyOutputStates {
                count: self.num_output_states,
                max,
            });
        }
        Ok(())
    }

    /// The states this transaction creates when it succeeds:
    /// `{tx_id, 0..num_output_states}`.
    pub fn output_state_refs(&self) -> Vec<StateRef> {
        (0..self.num_output_states)
            .map(|index| StateRef::new(self.tx_id, index))
            .collect()
    }

    /// Inputs followed by references.
    pub fn all_state_refs(&self) -> Vec<StateRef> {
        self.input_states
            .iter()
            .chain(self.reference_states.iter())
            .copied()
            .collect()
    }

    /// Digest of every field, used to spot a resubmission whose body
    /// differs from the request that was originally cached.
    pub fn digest(&self) -> SecureHash {
        let mut canonical = format!(
            "request|{}|{}|{}|{}",
            self.tx_id,
            self.holding_identity.x500_name,
            self.holding_identity.group_id,
            self.num_output_states
        );
        append_refs(&mut canonical, "in", self.input_states.iter().map(ToString::to_string));
        append_refs(
            &mut canonical,
            "ref",
            self.reference_states.iter().map(ToString::to_string),
        );
        append_window(
            &mut canonical,
            self.time_window_lower_bound,
            self.time_window_upper_bound,
        );
        SecureHash::sha256(canonical)
    }
}

/// Wire form of a check request as it arrives from the message bus.
///
/// Hashes and state refs are strings and the output count is signed, so
/// anything the sender got wrong is caught by [`CheckRequestMessage::parse`]
/// rather than by deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequestMessage {
    pub tx_id: String,
    pub holding_identity: HoldingIdentity,
    pub input_states: Vec<String>,
    pub reference_states: Vec<String>,
    pub num_output_states: i32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub time_window_lower_bound: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub time_window_upper_bound: OffsetDateTime,
}

impl CheckRequestMessage {
    /// Parse and validate into a [`CheckRequest`].
    pub fn parse(&self) -> Result<CheckRequest, RequestError> {
        let tx_id = self.tx_id.parse::<SecureHash>()?;
        if self.num_output_states < 0 {
            return Err(RequestError::NegativeOutputCount(self.num_output_states));
        }
        let input_states = parse_refs(&self.input_states)?;
        let reference_states = parse_refs(&self.reference_states)?;

        let request = CheckRequest {
            tx_id,
            holding_identity: self.holding_identity.clone(),
            input_states,
            reference_states,
            num_output_states: self.num_output_states as u32,
            time_window_lower_bound: self.time_window_lower_bound,
            time_window_upper_bound: self.time_window_upper_bound,
        };
        request.validate()?;
        Ok(request)
    }

    /// Digest of the raw message, the counterpart of [`CheckRequest::digest`]
    /// for messages that never parsed.
    pub fn digest(&self) -> SecureHash {
        let mut canonical = format!(
            "message|{}|{}|{}|{}",
            self.tx_id,
            self.holding_identity.x500_name,
            self.holding_identity.group_id,
            self.num_output_states
        );
        append_refs(&mut canonical, "in", self.input_states.iter().cloned());
        append_refs(&mut canonical, "ref", self.reference_states.iter().cloned());
        append_window(
            &mut canonical,
            self.time_window_lower_bound,
            self.time_window_upper_bound,
        );
        SecureHash::sha256(canonical)
    }
}

impl From<&CheckRequest> for CheckRequestMessage {
    fn from(request: &CheckRequest) -> Self {
        CheckRequestMessage {
            tx_id: request.tx_id.to_string(),
            holding_identity: request.holding_identity.clone(),
            input_states: request.input_states.iter().map(ToString::to_string).collect(),
            reference_states: request
                .reference_states
                .iter()
                .map(ToString::to_string)
                .collect(),
            num_output_states: i32::try_from(request.num_output_states).unwrap_or(i32::MAX),
            time_window_lower_bound: request.time_window_lower_bound,
            time_window_upper_bound: request.time_window_upper_bound,
        }
    }
}

fn parse_refs(raw: &[String]) -> Result<Vec<StateRef>, RequestError> {
    raw.iter().map(|s| s.parse::<StateRef>()).collect()
}

fn append_refs(out: &mut String, tag: &str, refs: impl Iterator<Item = String>) {
    out.push('|');
    out.push_str(tag);
    for r in refs {
        out.push(',');
        out.push_str(&r);
    }
}

fn append_window(out: &mut String, lower: Option<OffsetDateTime>, upper: OffsetDateTime) {
    match lower {
        Some(lb) => out.push_str(&format!("|lb,{}", lb.unix_timestamp_nanos())),
        None => out.push_str("|lb,-"),
    }
    out.push_str(&format!("|ub,{}", upper.unix_timestamp_nanos()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn tx(name: &str) -> SecureHash {
        SecureHash::sha256(name.as_bytes())
    }

    fn message() -> CheckRequestMessage {
        CheckRequestMessage {
            tx_id: tx("T2").to_string(),
            holding_identity: HoldingIdentity::new("O=Notary, L=London, C=GB", "group-1"),
            input_states: vec![StateRef::new(tx("T1"), 0).to_string()],
            reference_states: vec![StateRef::new(tx("T1"), 1).to_string()],
            num_output_states: 2,
            time_window_lower_bound: None,
            time_window_upper_bound: datetime!(2025-01-01 00:00:10 UTC),
        }
    }

    #[test]
    fn parse_valid_message() {
        let request = message().parse().unwrap();
        assert_eq!(request.tx_id, tx("T2"));
        assert_eq!(request.input_states, vec![StateRef::new(tx("T1"), 0)]);
        assert_eq!(request.num_output_states, 2);
        assert_eq!(
            request.output_state_refs(),
            vec![StateRef::new(tx("T2"), 0), StateRef::new(tx("T2"), 1)]
        );
    }

    #[test]
    fn parse_rejects_negative_output_count() {
        let mut m = message();
        m.num_output_states = -1;
        assert_eq!(m.parse(), Err(RequestError::NegativeOutputCount(-1)));
    }

    #[test]
    fn parse_rejects_unparsable_state_ref() {
        let mut m = message();
        m.input_states.push("not-a-ref".to_string());
        assert!(matches!(
            m.parse(),
            Err(RequestError::InvalidStateRef { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_inputs() {
        let mut m = message();
        m.input_states.push(m.input_states[0].clone());
        assert_eq!(
            m.parse(),
            Err(RequestError::DuplicateInputState(StateRef::new(tx("T1"), 0)))
        );
    }

    #[test]
    fn validate_rejects_duplicate_references() {
        let mut m = message();
        m.reference_states.push(m.reference_states[0].clone());
        assert_eq!(
            m.parse(),
            Err(RequestError::DuplicateReferenceState(StateRef::new(tx("T1"), 1)))
        );
    }

    #[test]
    fn validate_rejects_input_also_referenced() {
        let mut m = message();
        m.reference_states.push(m.input_states[0].clone());
        assert_eq!(
            m.parse(),
            Err(RequestError::OverlappingState(StateRef::new(tx("T1"), 0)))
        );
    }

    #[test]
    fn output_count_above_limit_is_rejected() {
        let request = message().parse().unwrap();
        assert_eq!(request.check_output_count(2), Ok(()));
        assert_eq!(
            request.check_output_count(1),
            Err(RequestError::TooManyOutputStates { count: 2, max: 1 })
        );
    }

    #[test]
    fn digest_changes_with_any_field() {
        let request = message().parse().unwrap();
        let mut other = request.clone();
        assert_eq!(request.digest(), other.digest());

        other.num_output_states = 3;
        assert_ne!(request.digest(), other.digest());

        let mut windowed = request.clone();
        windowed.time_window_lower_bound = Some(datetime!(2025-01-01 00:00:00 UTC));
        assert_ne!(request.digest(), windowed.digest());
    }

    #[test]
    fn message_from_request_parses_back() {
        let request = message().parse().unwrap();
        let back = CheckRequestMessage::from(&request).parse().unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn request_json_uses_rfc3339_timestamps() {
        let request = message().parse().unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["time_window_upper_bound"], "2025-01-01T00:00:10Z");
        assert!(json["time_window_lower_bound"].is_null());
    }
}
