//! Self-service password reset via an emailed single-use token.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::directory::UserDirectory;
use crate::email::{EmailSender, MessageBuilder};
use crate::error::AuthError;
use crate::password::{self, PasswordService};

use super::{generate_token, hash_token, normalize_email};

pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub struct PasswordResetFlow {
    directory: Arc<dyn UserDirectory>,
    passwords: PasswordService,
    emails: Arc<dyn EmailSender>,
    messages: MessageBuilder,
}

impl PasswordResetFlow {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        passwords: PasswordService,
        emails: Arc<dyn EmailSender>,
        messages: MessageBuilder,
    ) -> Self {
        Self {
            directory,
            passwords,
            emails,
            messages,
        }
    }

    /// Ask for a reset link. Always succeeds from the caller's perspective so
    /// the response cannot be used to probe which addresses exist; failures
    /// are only logged.
    pub async fn request_reset(&self, email: &str) {
        let email = normalize_email(email);
        let account = match self.directory.find_by_email(&email).await {
            Ok(Some(account)) => account,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "reset request lookup failed");
                return;
            }
        };

        let token = generate_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        let updated = self
            .directory
            .update(account.id, &|account| {
                account.reset_token_hash = Some(token_hash.clone());
                account.reset_token_expires_at = Some(expires_at);
                Ok(())
            })
            .await;
        if let Err(err) = updated {
            warn!(account_id = %account.id, error = %err, "reset token could not be stored");
            return;
        }

        let message = self.messages.password_reset(&email, &token);
        if let Err(err) = self.emails.send(&message) {
            warn!(account_id = %account.id, error = %err, "reset email failed to send");
        }
        info!(account_id = %account.id, "password reset requested");
    }

    /// Consume a reset token and install the new password. The token is
    /// single-use: the update aborts if a concurrent request consumed it
    /// first. All outstanding refresh tokens are revoked.
    ///
    /// # Errors
    /// `Validation` for a weak password, `NotFound` for an unknown or
    /// consumed token, `TokenExpired` past the one-hour deadline.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        password::validate_strength(new_password)?;

        let token_hash = hash_token(token);
        let Some(account) = self.directory.find_by_reset_token(&token_hash).await? else {
            return Err(AuthError::NotFound);
        };
        match account.reset_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            Some(_) => return Err(AuthError::TokenExpired),
            None => return Err(AuthError::NotFound),
        }

        let new_hash = self.passwords.hash(new_password).await?;
        self.directory
            .update(account.id, &|account| {
                if account.reset_token_hash.as_deref() != Some(token_hash.as_slice()) {
                    return Err(crate::directory::DirectoryError::PreconditionFailed);
                }
                account.password_hash = new_hash.clone();
                account.reset_token_hash = None;
                account.reset_token_expires_at = None;
                account.token_version = account.token_version.wrapping_add(1);
                Ok(())
            })
            .await?;
        info!(account_id = %account.id, "password reset completed");
        Ok(())
    }
}
