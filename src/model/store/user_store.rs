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
use crate::model::user::{User, UserLogin};
use crate::store::{DocumentSession, Query};

/// User persistence as the identity framework sees it.
///
/// Same shape as [`crate::model::store::RoleRepository`]: plain setters only
/// touch the value and wait for `update`, the two normalized lookup keys are
/// flushed as soon as they change. Claims, logins and role memberships are
/// edited in memory.
#[async_trait::async_trait]
pub trait UserRepository: Store<Object = User> {
    async fn find_by_name(
        &self,
        normalized_user_name: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError>;

    async fn find_by_email(
        &self,
        normalized_email: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError>;

    fn get_user_id(&self, user: &User, cancel: &CancellationToken) -> Result<String, IdentityError>;

    fn get_user_name(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError>;

    fn set_user_name(
        &self,
        user: &mut User,
        user_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_normalized_user_name(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError>;

    async fn set_normalized_user_name(
        &mut self,
        user: &mut User,
        normalized_user_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_email(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError>;

    fn set_email(
        &self,
        user: &mut User,
        email: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_email_confirmed(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<bool, IdentityError>;

    fn set_email_confirmed(
        &self,
        user: &mut User,
        confirmed: bool,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_normalized_email(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError>;

    async fn set_normalized_email(
        &mut self,
        user: &mut User,
        normalized_email: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_password_hash(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError>;

    fn set_password_hash(
        &self,
        user: &mut User,
        hash: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn has_password(&self, user: &User, cancel: &CancellationToken) -> Result<bool, IdentityError>;

    fn get_security_stamp(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError>;

    fn set_security_stamp(
        &self,
        user: &mut User,
        stamp: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_claims(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Vec<Claim>, IdentityError>;

    fn add_claims(
        &self,
        user: &mut User,
        claims: &[Claim],
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    /// Replaces every claim equal in type and value to `claim`, in place.
    fn replace_claim(
        &self,
        user: &mut User,
        claim: &Claim,
        new_claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    /// Removes every claim equal in type and value to any of `claims`.
    fn remove_claims(
        &self,
        user: &mut User,
        claims: &[Claim],
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    async fn get_users_for_claim(
        &self,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<Vec<User>, IdentityError>;

    fn add_login(
        &self,
        user: &mut User,
        login: UserLogin,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn remove_login(
        &self,
        user: &mut User,
        login_provider: &str,
        provider_key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn get_logins(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Vec<UserLogin>, IdentityError>;

    async fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError>;

    /// Adds the user to an existing role; a missing role is a lookup miss.
    async fn add_to_role(
        &self,
        user: &mut User,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    fn remove_from_role(
        &self,
        user: &mut User,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError>;

    /// Display names of the user's roles, in membership order.
    async fn get_roles(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IdentityError>;

    fn is_in_role(
        &self,
        user: &User,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, IdentityError>;

    async fn get_users_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<User>, IdentityError>;

    fn users(&self) -> Query<User> {
        self.query()
    }
}

/// [`UserRepository`] over a document session, disposed with the store.
#[derive(Debug)]
pub struct UserStore<S: DocumentSession> {
    session: S,
}

impl<S: DocumentSession> UserStore<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

impl<S: DocumentSession> Drop for UserStore<S> {
    fn drop(&mut self) {
        self.session.dispose();
    }
}

impl<S: DocumentSession + Sync> UserStore<S> {
    async fn first_user<F>(
        &self,
        predicate: F,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError>
    where
        F: Fn(&User) -> bool + Send + Sync + 'static,
    {
        Ok(self.session.query::<User>().first(predicate, cancel).await?)
    }

    async fn flush_key(
        &mut self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        self.session.update(user)?;
        self.session.save_changes(cancel).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: DocumentSession + Sync> Store for UserStore<S> {
    type Object = User;

    #[instrument(skip_all, fields(user_name = ?user.user_name))]
    async fn create(
        &mut self,
        user: &mut User,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError> {
        ensure_not_cancelled(cancel)?;
        let staged = self.session.store(user);
        let outcome = flush_staged(&mut self.session, staged, cancel).await;
        Ok(into_result("create_user", outcome))
    }

    #[instrument(skip_all, fields(user_name = ?user.user_name))]
    async fn update(
        &mut self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_id(user)?;
        let staged = self.session.update(user);
        let outcome = flush_staged(&mut self.session, staged, cancel).await;
        Ok(into_result("update_user", outcome))
    }

    #[instrument(skip_all, fields(user_name = ?user.user_name))]
    async fn delete(
        &mut self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<IdentityResult, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_id(user)?;
        let staged = self.session.delete(user);
        let outcome = flush_staged(&mut self.session, staged, cancel).await;
        Ok(into_result("delete_user", outcome))
    }

    async fn find_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError> {
        ensure_not_cancelled(cancel)?;
        let id: Identifier = id.parse()?;
        self.first_user(move |user| user.id == Some(id), cancel).await
    }

    fn query(&self) -> Query<User> {
        self.session.query()
    }
}

#[async_trait::async_trait]
impl<S: DocumentSession + Sync> UserRepository for UserStore<S> {
    async fn find_by_name(
        &self,
        normalized_user_name: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_user_name", normalized_user_name)?;
        let wanted = normalized_user_name.to_string();
        self.first_user(
            move |user| user.normalized_user_name.as_deref() == Some(wanted.as_str()),
            cancel,
        )
        .await
    }

    async fn find_by_email(
        &self,
        normalized_email: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_email", normalized_email)?;
        let wanted = normalized_email.to_string();
        self.first_user(
            move |user| user.normalized_email.as_deref() == Some(wanted.as_str()),
            cancel,
        )
        .await
    }

    fn get_user_id(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<String, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(require_id(user)?.to_string())
    }

    fn get_user_name(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.user_name.clone())
    }

    fn set_user_name(
        &self,
        user: &mut User,
        user_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        user.user_name = user_name.map(str::to_string);
        Ok(())
    }

    fn get_normalized_user_name(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.normalized_user_name.clone())
    }

    #[instrument(skip_all, fields(normalized_user_name = %normalized_user_name))]
    async fn set_normalized_user_name(
        &mut self,
        user: &mut User,
        normalized_user_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_user_name", normalized_user_name)?;
        require_id(user)?;

        user.normalized_user_name = Some(normalized_user_name.to_string());
        self.flush_key(user, cancel).await?;
        debug!("normalized user name flushed");
        Ok(())
    }

    fn get_email(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.email.clone())
    }

    fn set_email(
        &self,
        user: &mut User,
        email: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        user.email = email.map(str::to_string);
        Ok(())
    }

    fn get_email_confirmed(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<bool, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.email_confirmed)
    }

    fn set_email_confirmed(
        &self,
        user: &mut User,
        confirmed: bool,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        user.email_confirmed = confirmed;
        Ok(())
    }

    fn get_normalized_email(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.normalized_email.clone())
    }

    #[instrument(skip_all, fields(normalized_email = %normalized_email))]
    async fn set_normalized_email(
        &mut self,
        user: &mut User,
        normalized_email: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_email", normalized_email)?;
        require_id(user)?;

        user.normalized_email = Some(normalized_email.to_string());
        self.flush_key(user, cancel).await?;
        debug!("normalized email flushed");
        Ok(())
    }

    fn get_password_hash(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.password_hash.clone())
    }

    fn set_password_hash(
        &self,
        user: &mut User,
        hash: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        user.password_hash = hash.map(str::to_string);
        Ok(())
    }

    fn has_password(&self, user: &User, cancel: &CancellationToken) -> Result<bool, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.password_hash.is_some())
    }

    fn get_security_stamp(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.security_stamp.clone())
    }

    fn set_security_stamp(
        &self,
        user: &mut User,
        stamp: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("stamp", stamp)?;
        user.security_stamp = Some(stamp.to_string());
        Ok(())
    }

    fn get_claims(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Vec<Claim>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.claims.iter().map(Claim::from).collect())
    }

    fn add_claims(
        &self,
        user: &mut User,
        claims: &[Claim],
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        // all or nothing
        claims.iter().try_for_each(require_claim)?;
        user.claims.extend(claims.iter().map(IdentityClaim::from));
        Ok(())
    }

    fn replace_claim(
        &self,
        user: &mut User,
        claim: &Claim,
        new_claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_claim(claim)?;
        require_claim(new_claim)?;
        for stored in user.claims.iter_mut().filter(|stored| claim.matches(stored)) {
            *stored = IdentityClaim::from(new_claim);
        }
        Ok(())
    }

    fn remove_claims(
        &self,
        user: &mut User,
        claims: &[Claim],
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        claims.iter().try_for_each(require_claim)?;
        user.claims
            .retain(|stored| !claims.iter().any(|claim| claim.matches(stored)));
        Ok(())
    }

    async fn get_users_for_claim(
        &self,
        claim: &Claim,
        cancel: &CancellationToken,
    ) -> Result<Vec<User>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require_claim(claim)?;
        let claim = claim.clone();
        let users = self
            .session
            .query::<User>()
            .filter(move |user| user.claims.iter().any(|stored| claim.matches(stored)))
            .to_list(cancel)
            .await?;
        Ok(users)
    }

    fn add_login(
        &self,
        user: &mut User,
        login: UserLogin,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("login_provider", &login.login_provider)?;
        require("provider_key", &login.provider_key)?;
        if user.logins.iter().any(|linked| linked.is(&login.login_provider, &login.provider_key)) {
            return Err(IdentityError::DuplicateLogin {
                login_provider: login.login_provider,
                provider_key: login.provider_key,
            });
        }
        user.logins.push(login);
        Ok(())
    }

    fn remove_login(
        &self,
        user: &mut User,
        login_provider: &str,
        provider_key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("login_provider", login_provider)?;
        require("provider_key", provider_key)?;
        user.logins.retain(|linked| !linked.is(login_provider, provider_key));
        Ok(())
    }

    fn get_logins(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Vec<UserLogin>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        Ok(user.logins.clone())
    }

    async fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
        cancel: &CancellationToken,
    ) -> Result<User, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("login_provider", login_provider)?;
        require("provider_key", provider_key)?;
        let (provider, key) = (login_provider.to_string(), provider_key.to_string());
        self.first_user(
            move |user| user.logins.iter().any(|linked| linked.is(&provider, &key)),
            cancel,
        )
        .await
    }

    async fn add_to_role(
        &self,
        user: &mut User,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_role_name", normalized_role_name)?;
        let wanted = normalized_role_name.to_string();
        let role = self
            .session
            .query::<Role>()
            .first(move |role| role.normalized_name == wanted, cancel)
            .await?;
        if !user.roles.contains(&role.normalized_name) {
            user.roles.push(role.normalized_name);
        }
        Ok(())
    }

    fn remove_from_role(
        &self,
        user: &mut User,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_role_name", normalized_role_name)?;
        user.roles.retain(|member_of| member_of != normalized_role_name);
        Ok(())
    }

    async fn get_roles(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        if user.roles.is_empty() {
            return Ok(Vec::new());
        }
        let memberships = user.roles.clone();
        let roles = self
            .session
            .query::<Role>()
            .filter(move |role| memberships.contains(&role.normalized_name))
            .to_list(cancel)
            .await?;
        // Memberships of roles deleted since are skipped.
        Ok(user
            .roles
            .iter()
            .filter_map(|member_of| roles.iter().find(|role| &role.normalized_name == member_of))
            .map(|role| role.name.clone())
            .collect())
    }

    fn is_in_role(
        &self,
        user: &User,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_role_name", normalized_role_name)?;
        Ok(user.roles.iter().any(|member_of| member_of == normalized_role_name))
    }

    async fn get_users_in_role(
        &self,
        normalized_role_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<User>, IdentityError> {
        ensure_not_cancelled(cancel)?;
        require("normalized_role_name", normalized_role_name)?;
        let wanted = normalized_role_name.to_string();
        let users = self
            .session
            .query::<User>()
            .filter(move |user| user.roles.contains(&wanted))
            .to_list(cancel)
            .await?;
        Ok(users)
    }
}
