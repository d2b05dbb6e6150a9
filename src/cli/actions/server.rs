use crate::api::{self, AppState};
use crate::cli::actions::Action;
use crate::config::AuthConfig;
use crate::directory::{MemoryDirectory, UserDirectory};
use crate::email::{EmailSender, LogEmailSender};
use crate::oauth::{GoogleIdentityProvider, IdentityProvider};
use crate::password::PasswordService;
use crate::token::TokenService;
use anyhow::Result;
use std::sync::Arc;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            base_url,
            access_secret,
            refresh_secret,
            google_client_id,
        } => {
            let config = AuthConfig::new(base_url);
            let directory: Arc<dyn UserDirectory> = Arc::new(MemoryDirectory::new());
            let tokens = Arc::new(TokenService::new(&access_secret, &refresh_secret));
            let provider = match google_client_id {
                Some(client_id) => Some(
                    Arc::new(GoogleIdentityProvider::new(client_id)?) as Arc<dyn IdentityProvider>
                ),
                None => None,
            };

            let state = Arc::new(AppState::new(
                config,
                directory,
                tokens,
                PasswordService::new(),
                Arc::new(LogEmailSender) as Arc<dyn EmailSender>,
                provider,
            ));

            api::new(port, state).await?;
        }
    }

    Ok(())
}
