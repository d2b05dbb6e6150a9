//! Registration, login, session refresh, and account self-service.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::{Account, DirectoryError, NewAccount, UserDirectory};
use crate::email::{EmailSender, MessageBuilder};
use crate::error::AuthError;
use crate::password::{self, PasswordService};
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use crate::token::{TokenPair, TokenService};

use super::{generate_token, hash_token, normalize_email, validate_email};

pub struct CredentialFlow {
    directory: Arc<dyn UserDirectory>,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    limiter: Arc<dyn RateLimiter>,
    emails: Arc<dyn EmailSender>,
    messages: MessageBuilder,
}

impl CredentialFlow {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        passwords: PasswordService,
        tokens: Arc<TokenService>,
        limiter: Arc<dyn RateLimiter>,
        emails: Arc<dyn EmailSender>,
        messages: MessageBuilder,
    ) -> Self {
        Self {
            directory,
            passwords,
            tokens,
            limiter,
            emails,
            messages,
        }
    }

    /// Create an unverified account and email its verification link.
    ///
    /// # Errors
    /// `Validation` for a malformed email or weak password, `Conflict` for a
    /// taken address.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        password::validate_strength(password)?;
        if display_name.trim().is_empty() {
            return Err(AuthError::validation("Name must not be empty"));
        }

        let token = generate_token();
        let password_hash = self.passwords.hash(password).await?;
        let account = self
            .directory
            .create(NewAccount::local(
                email,
                display_name.trim().to_string(),
                password_hash,
                hash_token(&token),
            ))
            .await?;

        let message = self.messages.verification(&account.email, &token);
        if let Err(err) = self.emails.send(&message) {
            warn!(account_id = %account.id, error = %err, "verification email failed to send");
        }

        info!(account_id = %account.id, "account registered");
        Ok(account)
    }

    /// Password login. Attempts are counted per client address before the
    /// credentials are examined, so failed and successful attempts both spend
    /// the budget.
    ///
    /// # Errors
    /// `RateLimited` past the attempt budget, `Authentication` for unknown
    /// address, wrong password, or an unverified account.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client_ip: &str,
    ) -> Result<(Account, TokenPair), AuthError> {
        if self.limiter.check(&format!("login:{client_ip}")) == RateLimitDecision::Limited {
            warn!(%client_ip, "login rate limit hit");
            return Err(AuthError::RateLimited);
        }

        let email = normalize_email(email);
        let Some(account) = self.directory.find_by_email(&email).await? else {
            return Err(AuthError::Authentication);
        };
        if !self.passwords.verify(password, &account.password_hash).await? {
            return Err(AuthError::Authentication);
        }
        // Deliberately the same generic failure as a bad password, so the
        // response cannot be used to probe verification state.
        if !account.verified {
            return Err(AuthError::Authentication);
        }

        let pair = self.tokens.issue(account.id, account.token_version)?;
        info!(account_id = %account.id, "login succeeded");
        Ok((account, pair))
    }

    /// Exchange a refresh token for a fresh pair. Rotation: the old refresh
    /// token keeps working until it expires or the version is bumped, the new
    /// pair carries the account's current version.
    ///
    /// # Errors
    /// `Authentication` for an invalid/expired token or a deleted account,
    /// `SessionRevoked` when the embedded version is stale.
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<(Account, TokenPair), AuthError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let Some(account) = self.directory.find_by_id(claims.account_id).await? else {
            return Err(AuthError::Authentication);
        };
        if claims.token_version != account.token_version {
            return Err(AuthError::SessionRevoked);
        }

        let pair = self.tokens.issue(account.id, account.token_version)?;
        Ok((account, pair))
    }

    /// Invalidate every outstanding refresh token for the account.
    ///
    /// # Errors
    /// `NotFound` for an unknown account.
    pub async fn logout_everywhere(&self, account_id: Uuid) -> Result<(), AuthError> {
        self.directory
            .update(account_id, &|account| {
                account.token_version = account.token_version.wrapping_add(1);
                Ok(())
            })
            .await?;
        info!(%account_id, "all sessions revoked");
        Ok(())
    }

    /// Replace the password after re-authenticating with the current one.
    /// Revokes all outstanding refresh tokens.
    ///
    /// # Errors
    /// `Authentication` for a wrong current password, `Validation` for a weak
    /// replacement.
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        password::validate_strength(new_password)?;

        let Some(account) = self.directory.find_by_id(account_id).await? else {
            return Err(AuthError::NotFound);
        };
        if !self
            .passwords
            .verify(current_password, &account.password_hash)
            .await?
        {
            return Err(AuthError::Authentication);
        }

        let new_hash = self.passwords.hash(new_password).await?;
        self.directory
            .update(account_id, &|account| {
                account.password_hash = new_hash.clone();
                account.token_version = account.token_version.wrapping_add(1);
                Ok(())
            })
            .await?;
        info!(%account_id, "password changed");
        Ok(())
    }

    /// Start a two-phase email change after re-authenticating: the new
    /// address is parked in `pending_email` and only committed when its
    /// verification token is consumed. The current address keeps working
    /// until then.
    ///
    /// # Errors
    /// `Validation` for a malformed address, `Authentication` for a wrong
    /// password, `Conflict` when another account already owns the address.
    pub async fn change_email(
        &self,
        account_id: Uuid,
        new_email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let new_email = normalize_email(new_email);
        validate_email(&new_email)?;

        let Some(account) = self.directory.find_by_id(account_id).await? else {
            return Err(AuthError::NotFound);
        };
        if !self.passwords.verify(password, &account.password_hash).await? {
            return Err(AuthError::Authentication);
        }

        if let Some(existing) = self.directory.find_by_email(&new_email).await? {
            if existing.id != account_id {
                return Err(AuthError::Conflict);
            }
            return Err(AuthError::validation("Email is already set to this address"));
        }

        let token = generate_token();
        let token_hash = hash_token(&token);
        self.directory
            .update(account_id, &|account| {
                account.pending_email = Some(new_email.clone());
                account.verification_token_hash = Some(token_hash.clone());
                Ok(())
            })
            .await?;

        // The link goes to the address being claimed, proving control of it.
        let message = self.messages.email_change_verification(&new_email, &token);
        if let Err(err) = self.emails.send(&message) {
            warn!(%account_id, error = %err, "email change verification failed to send");
        }
        info!(%account_id, "email change requested");
        Ok(())
    }

    /// Remove the account after re-authenticating. Terminal: outstanding
    /// tokens dangle and fail their next directory lookup.
    ///
    /// # Errors
    /// `Authentication` for a wrong password, `NotFound` for an unknown
    /// account.
    pub async fn delete_account(
        &self,
        account_id: Uuid,
        password: &str,
    ) -> Result<(), AuthError> {
        let Some(account) = self.directory.find_by_id(account_id).await? else {
            return Err(AuthError::NotFound);
        };
        if !self.passwords.verify(password, &account.password_hash).await? {
            return Err(AuthError::Authentication);
        }

        match self.directory.delete(account_id).await {
            Ok(()) | Err(DirectoryError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        info!(%account_id, "account deleted");
        Ok(())
    }
}
