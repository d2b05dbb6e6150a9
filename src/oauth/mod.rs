//! OAuth identity provider contract and the Google implementation.
//!
//! The federation flow only needs one thing from a provider: turn a signed
//! identity token into a verified `{email, subject, name}` claims payload or
//! fail. Google verification goes through the tokeninfo endpoint over HTTPS.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::error;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider examined the token and said no.
    #[error("identity token rejected")]
    Rejected,

    /// The provider could not be reached or answered garbage.
    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Claims extracted from a verified identity token.
#[derive(Clone, Debug)]
pub struct FederatedIdentity {
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stable provider name used as the key in `Account::federated_ids`.
    fn name(&self) -> &str;

    /// Verify a provider-issued identity token.
    async fn verify(&self, token: &str) -> Result<FederatedIdentity, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
}

pub struct GoogleIdentityProvider {
    client: Client,
    client_id: String,
}

impl GoogleIdentityProvider {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(client_id: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build Google tokeninfo client")?;
        Ok(Self { client, client_id })
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn verify(&self, token: &str) -> Result<FederatedIdentity, ProviderError> {
        let response = self
            .client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", token)])
            .send()
            .await
            .context("tokeninfo request failed")?;

        // Google answers 4xx for anything it does not recognize as a token.
        if response.status() != StatusCode::OK {
            error!(status = %response.status(), "google rejected identity token");
            return Err(ProviderError::Rejected);
        }

        let info: GoogleTokenInfo = response
            .json()
            .await
            .context("tokeninfo payload was not valid JSON")?;

        into_identity(info, &self.client_id)
    }
}

fn into_identity(
    info: GoogleTokenInfo,
    expected_audience: &str,
) -> Result<FederatedIdentity, ProviderError> {
    if info.aud != expected_audience {
        error!("google identity token was issued for a different audience");
        return Err(ProviderError::Rejected);
    }

    let verified = info.email_verified.as_deref() == Some("true");
    let Some(email) = info.email.filter(|_| verified) else {
        return Err(ProviderError::Rejected);
    };

    Ok(FederatedIdentity {
        subject: info.sub,
        email,
        display_name: info.name,
    })
}
