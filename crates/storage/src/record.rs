use notary_core::{CheckRequest, CheckResult, HoldingIdentity, SecureHash, StateRef};
use serde::{Deserialize, Serialize};

/// The cached outcome for one transaction id.
///
/// Written once, when the transaction is first processed, and returned
/// unchanged to every later submission of the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub tx_id: SecureHash,
    /// Digest of the request that produced `result`.
    pub request_digest: SecureHash,
    pub result: CheckResult,
}

impl TransactionDetails {
    pub fn new(request: &CheckRequest, result: CheckResult) -> Self {
        TransactionDetails {
            tx_id: request.tx_id,
            request_digest: request.digest(),
            result,
        }
    }
}

/// Everything one committed store transaction wrote, for one tenant.
///
/// The journal backend persists one entry per line of the tenant's
/// segment; replaying entries in order rebuilds the tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub holding_identity: HoldingIdentity,
    #[serde(default)]
    pub created: Vec<StateRef>,
    #[serde(default)]
    pub consumed: Vec<(StateRef, SecureHash)>,
    #[serde(default)]
    pub transactions: Vec<TransactionDetails>,
}

impl JournalEntry {
    pub fn new(holding_identity: HoldingIdentity) -> Self {
        JournalEntry {
            holding_identity,
            created: Vec::new(),
            consumed: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.consumed.is_empty() && self.transactions.is_empty()
    }
}
