use serde::{Deserialize, Serialize};

/// Claim as handed in and out by the identity framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    /// Structural equality with a stored claim.
    pub fn matches(&self, stored: &IdentityClaim) -> bool {
        self.claim_type == stored.claim_type && self.value == stored.value
    }
}

/// Claim embedded in a role or user document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl From<&Claim> for IdentityClaim {
    fn from(claim: &Claim) -> Self {
        Self {
            claim_type: claim.claim_type.clone(),
            value: claim.value.clone(),
        }
    }
}

impl From<&IdentityClaim> for Claim {
    fn from(claim: &IdentityClaim) -> Self {
        Claim::new(claim.claim_type.clone(), claim.value.clone())
    }
}
