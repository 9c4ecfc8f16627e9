mod error;
mod role_store;
mod user_store;
mod validate;

use crate::cancel::CancellationToken;
use crate::store::{Document, Query};

pub use error::{IdentityError, IdentityFailure, IdentityResult};
pub use role_store::{RoleRepository, RoleStore};
pub use user_store::{UserRepository, UserStore};

/// Operations every identity store offers for its entity.
///
/// Create, update and delete report persistence faults through
/// [`IdentityResult::Failed`]; only caller faults (cancellation, an entity that
/// was never created) come back as `Err`.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    type Object: Document;

    /// Stages the entity and flushes it. An identifier is assigned while
    /// staging and written back onto `object` before the commit, so after a
    /// failed create the entity carries an id that was never persisted.
    async fn create(
        &mut self,
        object: &mut Self::Object,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError>;

    async fn update(
        &mut self,
        object: &Self::Object,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError>;

    async fn delete(
        &mut self,
        object: &Self::Object,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError>;

    /// Looks an entity up by the textual form of its identifier. A miss is
    /// returned as the store's own [`crate::store::StoreError::NoMatchingDocument`].
    async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Self::Object, IdentityError>;

    /// Composable query over the whole collection.
    fn query(&self) -> Query<Self::Object>;
}
