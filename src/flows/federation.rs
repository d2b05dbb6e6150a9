//! Federated login: exchange a provider identity token for a session.

use std::sync::Arc;
use tracing::info;

use crate::directory::{Account, NewAccount, UserDirectory};
use crate::error::AuthError;
use crate::oauth::{IdentityProvider, ProviderError};
use crate::password::PasswordService;
use crate::token::{TokenPair, TokenService};

use super::normalize_email;

pub struct FederationAdapter {
    directory: Arc<dyn UserDirectory>,
    passwords: PasswordService,
    tokens: Arc<TokenService>,
    provider: Arc<dyn IdentityProvider>,
}

impl FederationAdapter {
    #[must_use]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        passwords: PasswordService,
        tokens: Arc<TokenService>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            directory,
            passwords,
            tokens,
            provider,
        }
    }

    /// Verify a provider identity token and open a session. An unknown email
    /// auto-provisions a verified account carrying an unusable placeholder
    /// password; a known email links the provider subject to the existing
    /// account.
    ///
    /// # Errors
    /// `Authentication` when the provider rejects the token or the subject
    /// does not match the one already linked, `External` when the provider is
    /// unreachable.
    pub async fn authenticate(&self, id_token: &str) -> Result<(Account, TokenPair), AuthError> {
        let identity = self.provider.verify(id_token).await.map_err(|err| match err {
            ProviderError::Rejected => AuthError::Authentication,
            ProviderError::Unavailable(source) => AuthError::External(source),
        })?;

        let email = normalize_email(&identity.email);
        let provider_name = self.provider.name().to_string();

        let account = match self.directory.find_by_email(&email).await? {
            Some(existing) => {
                if let Some(linked) = existing.federated_ids.get(&provider_name) {
                    if *linked != identity.subject {
                        return Err(AuthError::Authentication);
                    }
                }
                let subject = identity.subject.clone();
                self.directory
                    .update(existing.id, &|account| {
                        account
                            .federated_ids
                            .insert(provider_name.clone(), subject.clone());
                        // The provider attested the address.
                        account.verified = true;
                        Ok(())
                    })
                    .await?
            }
            None => {
                let display_name = identity
                    .display_name
                    .clone()
                    .unwrap_or_else(|| local_part(&email).to_string());
                let placeholder = self.passwords.random_placeholder().await?;
                let created = self
                    .directory
                    .create(NewAccount::federated(
                        email,
                        display_name,
                        placeholder,
                        provider_name,
                        identity.subject.clone(),
                    ))
                    .await?;
                info!(account_id = %created.id, "federated account provisioned");
                created
            }
        };

        let pair = self.tokens.issue(account.id, account.token_version)?;
        Ok((account, pair))
    }
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
