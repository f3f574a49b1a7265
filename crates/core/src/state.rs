use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RequestError;
use crate::hash::SecureHash;

/// One output position of one transaction.
///
/// String form is `<transaction id>:<index>`, e.g.
/// `SHA-256:9F86...0F00A08:1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateRef {
    pub transaction_id: SecureHash,
    pub index: u32,
}

impl StateRef {
    pub fn new(transaction_id: SecureHash, index: u32) -> Self {
        StateRef {
            transaction_id,
            index,
        }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.index)
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateRef({})", self)
    }
}

impl FromStr for StateRef {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| RequestError::InvalidStateRef {
            input: s.to_string(),
            reason,
        };

        let (tx, index) = s
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected '<transaction id>:<index>'".to_string()))?;
        let index = index
            .parse::<u32>()
            .map_err(|e| invalid(format!("invalid index: {}", e)))?;
        let transaction_id = tx.parse::<SecureHash>().map_err(|e| invalid(e.to_string()))?;
        Ok(StateRef::new(transaction_id, index))
    }
}

impl Serialize for StateRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StateRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The durable record of a state.
///
/// `consuming_tx_id` is `None` while the state is unconsumed and is set at
/// most once. A state with no record at all is *unknown*, which is a
/// different outcome from known-and-unconsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDetails {
    pub state_ref: StateRef,
    pub consuming_tx_id: Option<SecureHash>,
}

impl StateDetails {
    pub fn unconsumed(state_ref: StateRef) -> Self {
        StateDetails {
            state_ref,
            consuming_tx_id: None,
        }
    }

    pub fn consumed(state_ref: StateRef, consuming_tx_id: SecureHash) -> Self {
        StateDetails {
            state_ref,
            consuming_tx_id: Some(consuming_tx_id),
        }
    }

    pub fn is_consumed(&self) -> bool {
        self.consuming_tx_id.is_some()
    }

    /// Consumed by a transaction other than `tx_id`.
    pub fn is_consumed_by_other(&self, tx_id: &SecureHash) -> bool {
        matches!(self.consuming_tx_id, Some(consumer) if consumer != *tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        let state_ref = StateRef::new(SecureHash::sha256(b"issue"), 7);
        let parsed: StateRef = state_ref.to_string().parse().unwrap();
        assert_eq!(parsed, state_ref);
    }

    #[test]
    fn parse_rejects_missing_or_bad_index() {
        let tx = SecureHash::sha256(b"issue").to_string();
        assert!(matches!(
            format!("{}:x", tx).parse::<StateRef>(),
            Err(RequestError::InvalidStateRef { .. })
        ));
        assert!(matches!(
            format!("{}:-1", tx).parse::<StateRef>(),
            Err(RequestError::InvalidStateRef { .. })
        ));
        assert!("garbage".parse::<StateRef>().is_err());
    }

    #[test]
    fn consumed_by_other_ignores_own_transaction() {
        let state_ref = StateRef::new(SecureHash::sha256(b"issue"), 0);
        let me = SecureHash::sha256(b"me");
        let other = SecureHash::sha256(b"other");

        assert!(!StateDetails::unconsumed(state_ref).is_consumed_by_other(&me));
        assert!(!StateDetails::consumed(state_ref, me).is_consumed_by_other(&me));
        assert!(StateDetails::consumed(state_ref, other).is_consumed_by_other(&me));
    }
}
