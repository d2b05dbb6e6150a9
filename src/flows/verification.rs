//! Email verification: first-time confirmation and email change commits.

use std::sync::Arc;
use tracing::info;

use crate::directory::{Account, DirectoryError, UserDirectory};
use crate::error::AuthError;

use super::hash_token;

pub struct EmailVerificationFlow {
    directory: Arc<dyn UserDirectory>,
}

impl EmailVerificationFlow {
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Consume a verification token. For a fresh registration this marks the
    /// account verified; for an email change it additionally commits the
    /// pending address as the account's email. Single-use either way.
    ///
    /// # Errors
    /// `NotFound` for an unknown or consumed token, `Conflict` when the
    /// pending address was claimed by someone else in the meantime.
    pub async fn verify(&self, token: &str) -> Result<Account, AuthError> {
        let token_hash = hash_token(token);
        let Some(account) = self
            .directory
            .find_by_verification_token(&token_hash)
            .await?
        else {
            return Err(AuthError::NotFound);
        };

        let updated = self
            .directory
            .update(account.id, &|account| {
                if account.verification_token_hash.as_deref() != Some(token_hash.as_slice()) {
                    return Err(DirectoryError::PreconditionFailed);
                }
                if let Some(pending) = account.pending_email.take() {
                    account.email = pending;
                }
                account.verified = true;
                account.verification_token_hash = None;
                Ok(())
            })
            .await?;

        info!(account_id = %updated.id, "email verified");
        Ok(updated)
    }
}
