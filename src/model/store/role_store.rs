use tracing::{debug, instrument};

use crate::cancel::CancellationToken;
use crate::data::id::Identifier;
use crate::model::claim::{Claim, IdentityClaim};
use crate::model::role::Role;
use crate::model::store::error::{IdentityError, IdentityResult};
use crate::model::store::validate::{
    ensure_not_cancelled, flush_staged, into_result, require, require_claim, require_id,
};
use crate::model::store::Store;
use crate::store::{DocumentSession, Query};

/// Role persistence as the identity framework sees it.
///
/// Renaming is deferred (`set_role_name` only touches the value, `update`
/// persists it) while changing the normalized name is flushed at once, since
/// it is the key lookups and the unique index work on. Claim changes stay in
/// memory until the next flush.
#[async_trait::async_trait]
pub trait RoleRepository: Store<Object = Role> {
    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Role, IdentityError>;

    fn get_role_id(&self, role: &Role, cancel: &CancellationToken) -> Result<String, IdentityError>;

    fn get_role_name(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError>;

    fn set_role_name(
        &self,
        role: &mut Role,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_normalized_role_name(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError>;

    async fn set_normalized_role_name(
        &mut self,
        role: &mut Role,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_claims(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<Vec<Claim>, IdentityError>;

    fn add_claim(
        &self,
        role: &mut Role,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    /// Removes every claim equal in type and value to `claim`.
    fn remove_claim(
        &self,
        role: &mut Role,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn roles(&self) -> Query<Role> {
        self.query()
    }
}

/// [`RoleRepository`] over a document session. The session is owned by the
/// store and disposed when the store is dropped.
#[derive(Debug)]
pub struct RoleStore<S: DocumentSession> {
    session: S,
}

impl<S: DocumentSession> RoleStore<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

impl<S: DocumentSession> Drop for RoleStore<S> {
    fn drop(&mut self) {
        self.session.dispose();
    }
}

#[async_trait::async_trait]
impl<S: DocumentSession + Sync> Store for RoleStore<S> {
    type Object = Role;

    #[instrument(skip_all, fields(normalized_name = %role.normalized_name))]
    async fn create(
        &mut self,
        role: &mut Role,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError> {
        ensure_not_cancelled(cancel)?;
        let staged = self.session.store(role);
        let outcome = flush_staged(&mut self.session, staged, cancel).await;
        Ok(into_result("create_role", outcome))
    }

    #[instrument(skip_all, fields(normalized_name = %role.normalized_name))]
    async fn update(
        &mut self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_id(role)?;
        let staged = self.session.update(role);
        let outcome = flush_staged(&mut self.session, staged, cancel).await;
        Ok(into_result("update_role", outcome))
    }

    #[instrument(skip_all, fields(normalized_name = %role.normalized_name))]
    async fn delete(
        &mut self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_id(role)?;
        let staged = self.session.delete(role);
        let outcome = flush_staged(&mut self.session, staged, cancel).await;
        Ok(into_result("delete_role", outcome))
    }

    async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Role, IdentityError> {
        ensure_not_cancelled(cancel)?;
        let id: Identifier = id.parse()?;
        let role = self
            .session
            .query::<Role>()
            .first(move |role| role.id == Some(id), cancel)
            .await?;
        Ok(role)
    }

    fn query(&self) -> Query<Role> {
        self.session.query()
    }
}

#[async_trait::async_trait]
impl<S: DocumentSession + Sync> RoleRepository for RoleStore<S> {
    async fn find_by_name(
        &self,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Role, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_name", normalized_name)?;
        let wanted = normalized_name.to_string();
        let role = self
            .session
            .query::<Role>()
            .first(move |role| role.normalized_name == wanted, cancel)
            .await?;
        Ok(role)
    }

    fn get_role_id(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(require_id(role)?.to_string())
    }

    fn get_role_name(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(role.name.clone())
    }

    fn set_role_name(
        &self,
        role: &mut Role,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        role.name = name.to_string();
        Ok(())
    }

    fn get_normalized_role_name(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(role.normalized_name.clone())
    }

    #[instrument(skip_all, fields(normalized_name = %normalized_name))]
    async fn set_normalized_role_name(
        &mut self,
        role: &mut Role,
        normalized_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_name", normalized_name)?;
        require_id(role)?;

        role.normalized_name = normalized_name.to_string();
        self.session.update(&*role)?;
        self.session.save_changes(cancel).await?;
        debug!("normalized role name flushed");
        Ok(())
    }

    fn get_claims(
        &self,
        role: &Role,
        cancel: &CancellationToken,
    ) -> Result<Vec<Claim>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(role.claims.iter().map(Claim::from).collect())
    }

    fn add_claim(
        &self,
        role: &mut Role,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_claim(claim)?;
        role.claims.push(IdentityClaim::from(claim));
        Ok(())
    }

    fn remove_claim(
        &self,
        role: &mut Role,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_claim(claim)?;
        role.claims.retain(|stored| !claim.matches(stored));
        Ok(())
    }
}
