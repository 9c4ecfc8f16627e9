use serde::{Deserialize, Serialize};

use crate::data::id::Identifier;
use crate::model::claim::IdentityClaim;
use crate::model::normalizer::normalize;
use crate::store::{Document, UniqueKey};

pub const ROLE_NORMALIZED_NAME_INDEX: &str = "role_normalized_name";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Option<Identifier>,
    pub name: String,
    /// Unique across roles when not empty.
    pub normalized_name: String,
    #[serde(default)]
    pub claims: Vec<IdentityClaim>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            normalized_name: normalize(&name),
            name,
            ..Default::default()
        }
    }
}

impl Document for Role {
    const COLLECTION: &'static str = "roles";

    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        if self.normalized_name.is_empty() {
            return Vec::new();
        }
        vec![UniqueKey::new(ROLE_NORMALIZED_NAME_INDEX, self.normalized_name.clone())]
    }
}
