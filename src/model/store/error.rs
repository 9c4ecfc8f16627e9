use crate::data::id::ParseIdentifierError;
use crate::store::StoreError;

/// Errors returned by the identity stores.
///
/// Everything except [`IdentityError::Store`] is a caller fault: retrying the
/// same call cannot succeed. `Store` carries lookup misses
/// ([`StoreError::NoMatchingDocument`]) and failures of the operations that do
/// not convert persistence errors into an [`IdentityResult`].
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("operation was cancelled")]
    Cancelled,

    #[error("argument `{name}` is required")]
    MissingArgument { name: &'static str },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ParseIdentifierError),

    /// The entity was never created, so it has no identifier yet.
    #[error("{entity} has no identifier")]
    MissingIdentifier { entity: &'static str },

    #[error("claim type must not be empty")]
    InvalidClaim,

    #[error("login {login_provider}/{provider_key} is already linked to this user")]
    DuplicateLogin {
        login_provider: String,
        provider_key: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IdentityError {
    pub fn is_validation(&self) -> bool {
        !matches!(self, IdentityError::Store(_))
    }

    /// True for the lookup-miss signal of the `find_*` operations.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IdentityError::Store(err) if err.is_not_found())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFailure {
    pub code: String,
    pub description: String,
}

/// Outcome of create, update and delete. Persistence faults end up here as
/// `Failed` instead of being returned as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResult {
    Success,
    Failed(Vec<IdentityFailure>),
}

impl IdentityResult {
    pub fn failed(err: &StoreError) -> Self {
        IdentityResult::Failed(vec![IdentityFailure {
            code: err.code().to_string(),
            description: err.to_string(),
        }])
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, IdentityResult::Success)
    }

    pub fn errors(&self) -> &[IdentityFailure] {
        match self {
            IdentityResult::Success => &[],
            IdentityResult::Failed(errors) => errors,
        }
    }
}
