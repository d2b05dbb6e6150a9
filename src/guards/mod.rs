//! Request guards: session authentication, then role authorization.
//!
//! The two checks are an ordered pipeline. `SessionGuard` proves who is
//! calling from the bearer token alone; `RoleGuard` then re-reads the account
//! so role grants and revocations take effect on the very next request, not
//! when the access token happens to expire.

use std::sync::Arc;
use uuid::Uuid;

use crate::directory::{Account, UserDirectory};
use crate::error::AuthError;
use crate::token::TokenService;

/// Proof of an authenticated request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub account_id: Uuid,
}

#[derive(Clone)]
pub struct SessionGuard {
    tokens: Arc<TokenService>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Validate a bearer access token.
    ///
    /// # Errors
    /// `Authentication` for a missing, malformed, or expired token.
    pub fn authenticate(&self, bearer_token: &str) -> Result<RequestContext, AuthError> {
        let account_id = self.tokens.verify_access(bearer_token)?;
        Ok(RequestContext { account_id })
    }
}

#[derive(Clone)]
pub struct RoleGuard {
    directory: Arc<dyn UserDirectory>,
}

impl RoleGuard {
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Load the caller's account. A valid token for a deleted account is
    /// still an authentication failure.
    ///
    /// # Errors
    /// `Authentication` when the account no longer exists.
    pub async fn current_account(&self, context: RequestContext) -> Result<Account, AuthError> {
        self.directory
            .find_by_id(context.account_id)
            .await?
            .ok_or(AuthError::Authentication)
    }

    /// Require at least one of `required` on the caller's current roles.
    ///
    /// # Errors
    /// `Authentication` for a missing account, `Authorization` when no
    /// required role is held.
    pub async fn require_any(
        &self,
        context: RequestContext,
        required: &[&str],
    ) -> Result<Account, AuthError> {
        let account = self.current_account(context).await?;
        if account.has_any_role(required) {
            Ok(account)
        } else {
            Err(AuthError::Authorization)
        }
    }
}

/// The composed pipeline handlers actually use.
#[derive(Clone)]
pub struct AccessPolicy {
    session: SessionGuard,
    roles: RoleGuard,
}

impl AccessPolicy {
    #[must_use]
    pub fn new(session: SessionGuard, roles: RoleGuard) -> Self {
        Self { session, roles }
    }

    /// Authentication only.
    ///
    /// # Errors
    /// `Authentication` for an invalid token.
    pub fn authenticate(&self, bearer_token: &str) -> Result<RequestContext, AuthError> {
        self.session.authenticate(bearer_token)
    }

    /// Authentication, then a fresh account load.
    ///
    /// # Errors
    /// `Authentication` for an invalid token or missing account.
    pub async fn authenticated_account(&self, bearer_token: &str) -> Result<Account, AuthError> {
        let context = self.session.authenticate(bearer_token)?;
        self.roles.current_account(context).await
    }

    /// Authentication, then role authorization, in that order.
    ///
    /// # Errors
    /// `Authentication` first, `Authorization` for a role miss.
    pub async fn require_roles(
        &self,
        bearer_token: &str,
        required: &[&str],
    ) -> Result<Account, AuthError> {
        let context = self.session.authenticate(bearer_token)?;
        self.roles.require_any(context, required).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{MemoryDirectory, NewAccount, ROLE_ADMIN, ROLE_USER};
    use secrecy::SecretString;

    struct Fixture {
        policy: AccessPolicy,
        directory: Arc<MemoryDirectory>,
        tokens: Arc<TokenService>,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let tokens = Arc::new(TokenService::new(
            &SecretString::from("access-secret".to_string()),
            &SecretString::from("refresh-secret".to_string()),
        ));
        let policy = AccessPolicy::new(
            SessionGuard::new(Arc::clone(&tokens)),
            RoleGuard::new(Arc::clone(&directory) as Arc<dyn UserDirectory>),
        );
        Fixture {
            policy,
            directory,
            tokens,
        }
    }

    async fn seed(fx: &Fixture) -> (Account, String) {
        let account = fx
            .directory
            .create(NewAccount::local(
                "ann@example.com".to_string(),
                "Ann".to_string(),
                "$argon2id$fake".to_string(),
                vec![0u8; 32],
            ))
            .await
            .expect("seed account");
        let pair = fx
            .tokens
            .issue(account.id, account.token_version)
            .expect("issue");
        (account, pair.access_token)
    }

    #[tokio::test]
    async fn valid_token_authenticates() -> anyhow::Result<()> {
        let fx = fixture();
        let (account, access) = seed(&fx).await;

        let context = fx.policy.authenticate(&access)?;
        assert_eq!(context.account_id, account.id);

        let loaded = fx.policy.authenticated_account(&access).await?;
        assert_eq!(loaded.id, account.id);
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_fails_before_any_role_check() {
        let fx = fixture();
        let result = fx.policy.authenticate("not-a-token");
        assert!(matches!(result, Err(AuthError::Authentication)));
    }

    #[tokio::test]
    async fn deleted_account_fails_authentication() -> anyhow::Result<()> {
        let fx = fixture();
        let (account, access) = seed(&fx).await;
        fx.directory.delete(account.id).await?;

        let result = fx.policy.authenticated_account(&access).await;
        assert!(matches!(result, Err(AuthError::Authentication)));
        Ok(())
    }

    #[tokio::test]
    async fn role_grants_take_effect_immediately() -> anyhow::Result<()> {
        let fx = fixture();
        let (account, access) = seed(&fx).await;

        let denied = fx.policy.require_roles(&access, &[ROLE_ADMIN]).await;
        assert!(matches!(denied, Err(AuthError::Authorization)));

        fx.directory
            .update(account.id, &|account| {
                account.roles.insert(ROLE_ADMIN.to_string());
                Ok(())
            })
            .await?;

        // Same token, fresh roles.
        let granted = fx.policy.require_roles(&access, &[ROLE_ADMIN]).await?;
        assert!(granted.has_any_role(&[ROLE_ADMIN]));
        Ok(())
    }

    #[tokio::test]
    async fn any_of_the_required_roles_suffices() -> anyhow::Result<()> {
        let fx = fixture();
        let (_, access) = seed(&fx).await;

        let account = fx.policy.require_roles(&access, &[ROLE_ADMIN, ROLE_USER]).await?;
        assert!(account.roles.contains(ROLE_USER));
        Ok(())
    }
}
