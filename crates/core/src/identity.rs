use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The tenant a request is checked for. All store state is partitioned by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HoldingIdentity {
    pub x500_name: String,
    pub group_id: String,
}

impl HoldingIdentity {
    pub fn new(x500_name: impl Into<String>, group_id: impl Into<String>) -> Self {
        HoldingIdentity {
            x500_name: x500_name.into(),
            group_id: group_id.into(),
        }
    }

    /// First 12 hex digits of SHA-256 over `x500_name` and `group_id`.
    ///
    /// Used in log fields where the full X.500 name is too noisy.
    pub fn short_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.x500_name.as_bytes());
        hasher.update(self.group_id.as_bytes());
        let digest = hasher.finalize();
        digest[..6].iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl fmt::Display for HoldingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.x500_name, self.group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_stable_and_distinguishes_groups() {
        let alice = HoldingIdentity::new("O=Alice, L=London, C=GB", "group-1");
        let alice_other = HoldingIdentity::new("O=Alice, L=London, C=GB", "group-2");
        assert_eq!(alice.short_hash(), alice.clone().short_hash());
        assert_eq!(alice.short_hash().len(), 12);
        assert_ne!(alice.short_hash(), alice_other.short_hash());
    }
}
