//! Shared application state wired once at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::directory::UserDirectory;
use crate::email::{EmailSender, MessageBuilder};
use crate::flows::{CredentialFlow, EmailVerificationFlow, FederationAdapter, PasswordResetFlow};
use crate::guards::{AccessPolicy, RoleGuard, SessionGuard};
use crate::oauth::IdentityProvider;
use crate::password::PasswordService;
use crate::ratelimit::{FixedWindowLimiter, RateLimiter};
use crate::token::TokenService;

pub struct AppState {
    config: AuthConfig,
    directory: Arc<dyn UserDirectory>,
    credentials: CredentialFlow,
    reset: PasswordResetFlow,
    verification: EmailVerificationFlow,
    federation: Option<FederationAdapter>,
    policy: AccessPolicy,
    limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    /// Wire the flows and guards over the given collaborators. When
    /// `provider` is absent the federated login route answers 404.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        directory: Arc<dyn UserDirectory>,
        tokens: Arc<TokenService>,
        passwords: PasswordService,
        emails: Arc<dyn EmailSender>,
        provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::new(
            config.login_max_attempts(),
            Duration::from_secs(config.login_window_seconds()),
        ));
        let messages = MessageBuilder::new(config.base_url());

        let credentials = CredentialFlow::new(
            Arc::clone(&directory),
            passwords.clone(),
            Arc::clone(&tokens),
            Arc::clone(&limiter) as Arc<dyn RateLimiter>,
            Arc::clone(&emails),
            messages.clone(),
        );
        let reset = PasswordResetFlow::new(
            Arc::clone(&directory),
            passwords.clone(),
            emails,
            messages,
        );
        let verification = EmailVerificationFlow::new(Arc::clone(&directory));
        let federation = provider.map(|provider| {
            FederationAdapter::new(
                Arc::clone(&directory),
                passwords,
                Arc::clone(&tokens),
                provider,
            )
        });
        let policy = AccessPolicy::new(
            SessionGuard::new(tokens),
            RoleGuard::new(Arc::clone(&directory)),
        );

        Self {
            config,
            directory,
            credentials,
            reset,
            verification,
            federation,
            policy,
            limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Directory handle for the administrative surface.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialFlow {
        &self.credentials
    }

    #[must_use]
    pub fn reset(&self) -> &PasswordResetFlow {
        &self.reset
    }

    #[must_use]
    pub fn verification(&self) -> &EmailVerificationFlow {
        &self.verification
    }

    #[must_use]
    pub fn federation(&self) -> Option<&FederationAdapter> {
        self.federation.as_ref()
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Login attempt limiter, shared with the background sweeper.
    #[must_use]
    pub fn limiter(&self) -> Arc<FixedWindowLimiter> {
        Arc::clone(&self.limiter)
    }
}
