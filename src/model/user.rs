use serde::{Deserialize, Serialize};

use crate::data::id::Identifier;
use crate::model::claim::IdentityClaim;
use crate::model::normalizer::{LookupNormalizer, UpperInvariantNormalizer};
use crate::store::{Document, UniqueKey};

pub const USER_NORMALIZED_NAME_INDEX: &str = "user_normalized_user_name";
pub const USER_NORMALIZED_EMAIL_INDEX: &str = "user_normalized_email";
pub const USER_LOGIN_INDEX: &str = "user_login";

/// External login (provider + key) linked to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLogin {
    pub login_provider: String,
    pub provider_key: String,
    pub display_name: Option<String>,
}

impl UserLogin {
    pub fn new(login_provider: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self {
            login_provider: login_provider.into(),
            provider_key: provider_key.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn is(&self, login_provider: &str, provider_key: &str) -> bool {
        self.login_provider == login_provider && self.provider_key == provider_key
    }

    fn index_value(&self) -> String {
        format!("{}\u{1f}{}", self.login_provider, self.provider_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Option<Identifier>,
    pub user_name: Option<String>,
    pub normalized_user_name: Option<String>,
    pub email: Option<String>,
    pub normalized_email: Option<String>,
    #[serde(default)]
    pub email_confirmed: bool,
    /// Produced by the caller's password hasher; stored as is.
    pub password_hash: Option<String>,
    pub security_stamp: Option<String>,
    #[serde(default)]
    pub claims: Vec<IdentityClaim>,
    #[serde(default)]
    pub logins: Vec<UserLogin>,
    /// Normalized names of the roles the user belongs to.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn new(user_name: impl Into<String>) -> Self {
        let user_name = user_name.into();
        Self {
            normalized_user_name: Some(UpperInvariantNormalizer.normalize_name(&user_name)),
            user_name: Some(user_name),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.normalized_email = Some(UpperInvariantNormalizer.normalize_email(&email));
        self.email = Some(email);
        self
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Option<Identifier> {
        self.id
    }

    fn set_id(&mut self, id: Identifier) {
        self.id = Some(id);
    }

    /// User name, email and each external login are indexed independently.
    fn unique_keys(&self) -> Vec<UniqueKey> {
        let name = self
            .normalized_user_name
            .iter()
            .map(|value| UniqueKey::new(USER_NORMALIZED_NAME_INDEX, value.clone()));
        let email = self
            .normalized_email
            .iter()
            .map(|value| UniqueKey::new(USER_NORMALIZED_EMAIL_INDEX, value.clone()));
        let logins = self
            .logins
            .iter()
            .map(|login| UniqueKey::new(USER_LOGIN_INDEX, login.index_value()));
        name.chain(email).chain(logins).collect()
    }
}
