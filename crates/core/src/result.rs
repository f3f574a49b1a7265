//! Outcomes of a uniqueness check.
//!
//! Every outcome is a value: even the failure kinds below are normal,
//! expected results that get cached per transaction id. Store outages are
//! the only thing that surfaces as a Rust error, and that happens in the
//! checker, not here.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::state::{StateDetails, StateRef};

/// Why a check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckError {
    /// Inputs already consumed by another transaction. Carries the
    /// consuming transaction id of each.
    InputStateConflict { conflicting_states: Vec<StateDetails> },

    /// Inputs the store has no record of.
    InputStateUnknown { unknown_states: Vec<StateRef> },

    /// Reference states already consumed.
    ReferenceStateConflict { conflicting_states: Vec<StateDetails> },

    /// Reference states the store has no record of.
    ReferenceStateUnknown { unknown_states: Vec<StateRef> },

    TimeWindowOutOfBounds {
        #[serde(with = "time::serde::rfc3339")]
        evaluation_timestamp: OffsetDateTime,
        #[serde(default, with = "time::serde::rfc3339::option")]
        lower_bound: Option<OffsetDateTime>,
        #[serde(with = "time::serde::rfc3339")]
        upper_bound: OffsetDateTime,
    },

    MalformedRequest { error_text: String },
}

impl CheckError {
    /// Stable snake_case name of the variant, as used in the JSON `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::InputStateConflict { .. } => "input_state_conflict",
            CheckError::InputStateUnknown { .. } => "input_state_unknown",
            CheckError::ReferenceStateConflict { .. } => "reference_state_conflict",
            CheckError::ReferenceStateUnknown { .. } => "reference_state_unknown",
            CheckError::TimeWindowOutOfBounds { .. } => "time_window_out_of_bounds",
            CheckError::MalformedRequest { .. } => "malformed_request",
        }
    }

    /// An input conflict can never be fixed by resubmitting: the state is gone.
    pub fn is_final(&self) -> bool {
        matches!(self, CheckError::InputStateConflict { .. })
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::InputStateConflict { conflicting_states } => write!(
                f,
                "{} input state(s) already consumed",
                conflicting_states.len()
            ),
            CheckError::InputStateUnknown { unknown_states } => {
                write!(f, "{} input state(s) unknown", unknown_states.len())
            }
            CheckError::ReferenceStateConflict { conflicting_states } => write!(
                f,
                "{} reference state(s) already consumed",
                conflicting_states.len()
            ),
            CheckError::ReferenceStateUnknown { unknown_states } => {
                write!(f, "{} reference state(s) unknown", unknown_states.len())
            }
            CheckError::TimeWindowOutOfBounds {
                evaluation_timestamp,
                lower_bound,
                upper_bound,
            } => match lower_bound {
                Some(lb) => write!(
                    f,
                    "evaluated at {} outside time window [{}, {})",
                    evaluation_timestamp, lb, upper_bound
                ),
                None => write!(
                    f,
                    "evaluated at {} not before time window upper bound {}",
                    evaluation_timestamp, upper_bound
                ),
            },
            CheckError::MalformedRequest { error_text } => {
                write!(f, "malformed request: {}", error_text)
            }
        }
    }
}

/// The cached outcome for one transaction id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckResult {
    Success {
        #[serde(with = "time::serde::rfc3339")]
        result_timestamp: OffsetDateTime,
    },
    Failure {
        #[serde(with = "time::serde::rfc3339")]
        result_timestamp: OffsetDateTime,
        error: CheckError,
    },
}

impl CheckResult {
    pub fn success(result_timestamp: OffsetDateTime) -> Self {
        CheckResult::Success { result_timestamp }
    }

    pub fn failure(result_timestamp: OffsetDateTime, error: CheckError) -> Self {
        CheckResult::Failure {
            result_timestamp,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckResult::Success { .. })
    }

    pub fn result_timestamp(&self) -> OffsetDateTime {
        match self {
            CheckResult::Success { result_timestamp }
            | CheckResult::Failure {
                result_timestamp, ..
            } => *result_timestamp,
        }
    }

    pub fn error(&self) -> Option<&CheckError> {
        match self {
            CheckResult::Success { .. } => None,
            CheckResult::Failure { error, .. } => Some(error),
        }
    }
}

/// Detached signature over a [`CheckResult`].
///
/// Key and signature bytes are base64 (standard alphabet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSignature {
    pub algorithm: String,
    pub public_key: String,
    pub signature: String,
}

/// What goes back to the requester. `signature` is `None` iff the result
/// is a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub result: CheckResult,
    pub signature: Option<ResultSignature>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::SecureHash;
    use time::macros::datetime;

    #[test]
    fn failure_json_is_tagged_by_status_and_kind() {
        let state_ref = StateRef::new(SecureHash::sha256(b"T1"), 0);
        let result = CheckResult::failure(
            datetime!(2025-01-01 00:00:02 UTC),
            CheckError::InputStateConflict {
                conflicting_states: vec![StateDetails::consumed(
                    state_ref,
                    SecureHash::sha256(b"T2"),
                )],
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["error"]["kind"], "input_state_conflict");
        assert_eq!(json["result_timestamp"], "2025-01-01T00:00:02Z");

        let back: CheckResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn kind_matches_serde_tag() {
        let error = CheckError::MalformedRequest {
            error_text: "bad".to_string(),
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["kind"], error.kind());
    }

    #[test]
    fn only_input_conflict_is_final() {
        let conflict = CheckError::InputStateConflict {
            conflicting_states: vec![],
        };
        let unknown = CheckError::InputStateUnknown {
            unknown_states: vec![],
        };
        assert!(conflict.is_final());
        assert!(!unknown.is_final());
    }
}
