//! End-to-end account lifecycle scenarios over the wired application state.

use anyhow::Result;
use argon2::Params;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use custodia::api::AppState;
use custodia::config::AuthConfig;
use custodia::directory::{MemoryDirectory, ROLE_ADMIN, UserDirectory};
use custodia::email::{EmailMessage, EmailSender};
use custodia::error::AuthError;
use custodia::password::PasswordService;
use custodia::token::TokenService;
use secrecy::SecretString;

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingSender {
    fn last_token(&self) -> String {
        let sent = self.sent.lock().expect("lock");
        let body = &sent.last().expect("no email sent").body;
        body.rsplit('/').next().expect("token in link").to_string()
    }

    fn last_recipient(&self) -> String {
        let sent = self.sent.lock().expect("lock");
        sent.last().expect("no email sent").to.clone()
    }
}

impl EmailSender for RecordingSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

struct Fixture {
    state: Arc<AppState>,
    directory: Arc<MemoryDirectory>,
    sender: Arc<RecordingSender>,
}

fn fixture() -> Fixture {
    fixture_with_config(AuthConfig::new("http://localhost:3000".to_string()))
}

fn fixture_with_config(config: AuthConfig) -> Fixture {
    let directory = Arc::new(MemoryDirectory::new());
    let sender = Arc::new(RecordingSender::default());
    let tokens = Arc::new(TokenService::new(
        &SecretString::from("integration-access-secret".to_string()),
        &SecretString::from("integration-refresh-secret".to_string()),
    ));
    let passwords = PasswordService::new()
        .with_params(Params::new(4096, 1, 1, None).expect("test params"));
    let state = Arc::new(AppState::new(
        config,
        Arc::clone(&directory) as Arc<dyn UserDirectory>,
        tokens,
        passwords,
        Arc::clone(&sender) as Arc<dyn EmailSender>,
        None,
    ));
    Fixture {
        state,
        directory,
        sender,
    }
}

#[tokio::test]
async fn register_verify_login_round_trip() -> Result<()> {
    let fx = fixture();
    let state = &fx.state;

    let account = state
        .credentials()
        .register("ann@example.com", "Ann", "Passw0rd1")
        .await?;
    assert!(!account.verified);

    // Login before verification fails exactly like a bad password.
    let early = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await;
    assert!(matches!(early, Err(AuthError::Authentication)));

    let token = fx.sender.last_token();
    let verified = state.verification().verify(&token).await?;
    assert!(verified.verified);

    let (logged_in, pair) = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await?;
    assert_eq!(logged_in.id, account.id);

    // The access token authenticates /me-style lookups.
    let me = state.policy().authenticated_account(&pair.access_token).await?;
    assert_eq!(me.email, "ann@example.com");

    // Refresh keeps working until a global logout bumps the version.
    let (_, rotated) = state.credentials().refresh_session(&pair.refresh_token).await?;
    state.credentials().logout_everywhere(account.id).await?;
    let stale = state.credentials().refresh_session(&rotated.refresh_token).await;
    assert!(matches!(stale, Err(AuthError::SessionRevoked)));
    Ok(())
}

#[tokio::test]
async fn email_change_is_two_phase() -> Result<()> {
    let fx = fixture();
    let state = &fx.state;

    let account = state
        .credentials()
        .register("ann@example.com", "Ann", "Passw0rd1")
        .await?;
    state.verification().verify(&fx.sender.last_token()).await?;

    state
        .credentials()
        .change_email(account.id, "new@example.com", "Passw0rd1")
        .await?;
    assert_eq!(fx.sender.last_recipient(), "new@example.com");

    // The old address still logs in until the token is consumed.
    assert!(
        state
            .credentials()
            .login("ann@example.com", "Passw0rd1", "1.2.3.4")
            .await
            .is_ok()
    );

    let committed = state.verification().verify(&fx.sender.last_token()).await?;
    assert_eq!(committed.email, "new@example.com");
    assert!(committed.pending_email.is_none());

    assert!(
        state
            .credentials()
            .login("new@example.com", "Passw0rd1", "1.2.3.4")
            .await
            .is_ok()
    );
    let old = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await;
    assert!(matches!(old, Err(AuthError::Authentication)));
    Ok(())
}

#[tokio::test]
async fn password_reset_revokes_sessions_and_is_single_use() -> Result<()> {
    let fx = fixture();
    let state = &fx.state;

    let account = state
        .credentials()
        .register("ann@example.com", "Ann", "Passw0rd1")
        .await?;
    state.verification().verify(&fx.sender.last_token()).await?;
    let (_, pair) = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await?;

    // Unknown addresses get the same silent answer.
    state.reset().request_reset("ghost@example.com").await;
    state.reset().request_reset("ann@example.com").await;
    assert_eq!(fx.sender.last_recipient(), "ann@example.com");

    let reset_token = fx.sender.last_token();
    state.reset().reset_password(&reset_token, "NewPassw0rd").await?;

    // Old refresh token is dead, old password rejected, new one works.
    let stale = state.credentials().refresh_session(&pair.refresh_token).await;
    assert!(matches!(stale, Err(AuthError::SessionRevoked)));
    let old = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await;
    assert!(matches!(old, Err(AuthError::Authentication)));
    let (fresh, _) = state
        .credentials()
        .login("ann@example.com", "NewPassw0rd", "1.2.3.4")
        .await?;
    assert_eq!(fresh.id, account.id);

    // Consumed tokens vanish.
    let reused = state.reset().reset_password(&reset_token, "OtherPass1").await;
    assert!(matches!(reused, Err(AuthError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn login_attempts_share_a_per_address_budget() -> Result<()> {
    let config = AuthConfig::new("http://localhost:3000".to_string())
        .with_login_max_attempts(3)
        .with_login_window_seconds(900);
    let fx = fixture_with_config(config);
    let state = &fx.state;

    state
        .credentials()
        .register("ann@example.com", "Ann", "Passw0rd1")
        .await?;
    state.verification().verify(&fx.sender.last_token()).await?;

    for _ in 0..3 {
        let attempt = state
            .credentials()
            .login("ann@example.com", "WrongPass1", "9.9.9.9")
            .await;
        assert!(matches!(attempt, Err(AuthError::Authentication)));
    }
    let limited = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "9.9.9.9")
        .await;
    assert!(matches!(limited, Err(AuthError::RateLimited)));

    // A different address is unaffected.
    assert!(
        state
            .credentials()
            .login("ann@example.com", "Passw0rd1", "8.8.8.8")
            .await
            .is_ok()
    );
    Ok(())
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() -> Result<()> {
    let fx = fixture();
    let state = &fx.state;

    let account = state
        .credentials()
        .register("ann@example.com", "Ann", "Passw0rd1")
        .await?;
    state.verification().verify(&fx.sender.last_token()).await?;
    let (_, pair) = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await?;

    let denied = state.policy().require_roles(&pair.access_token, &[ROLE_ADMIN]).await;
    assert!(matches!(denied, Err(AuthError::Authorization)));

    fx.directory
        .update(account.id, &|account| {
            account.roles.insert(ROLE_ADMIN.to_string());
            Ok(())
        })
        .await?;

    // The same token passes once the role is granted: roles are re-read per
    // request, not baked into the token.
    let granted = state.policy().require_roles(&pair.access_token, &[ROLE_ADMIN]).await?;
    assert!(granted.has_any_role(&[ROLE_ADMIN]));
    Ok(())
}

#[tokio::test]
async fn deleted_accounts_lose_access_immediately() -> Result<()> {
    let fx = fixture();
    let state = &fx.state;

    let account = state
        .credentials()
        .register("ann@example.com", "Ann", "Passw0rd1")
        .await?;
    state.verification().verify(&fx.sender.last_token()).await?;
    let (_, pair) = state
        .credentials()
        .login("ann@example.com", "Passw0rd1", "1.2.3.4")
        .await?;

    state.credentials().delete_account(account.id, "Passw0rd1").await?;

    let me = state.policy().authenticated_account(&pair.access_token).await;
    assert!(matches!(me, Err(AuthError::Authentication)));
    let refresh = state.credentials().refresh_session(&pair.refresh_token).await;
    assert!(matches!(refresh, Err(AuthError::Authentication)));
    assert!(fx.directory.find_by_id(account.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn federated_login_route_is_disabled_without_a_provider() {
    let fx = fixture();
    assert!(fx.state.federation().is_none());
}

#[tokio::test]
async fn concurrent_registrations_for_one_address_create_one_account() -> Result<()> {
    let fx = fixture();

    let mut handles = Vec::new();
    for i in 0..4 {
        let state = Arc::clone(&fx.state);
        handles.push(tokio::spawn(async move {
            state
                .credentials()
                .register("ann@example.com", &format!("Ann {i}"), "Passw0rd1")
                .await
        }));
    }

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => created += 1,
            Err(AuthError::Conflict) => conflicts += 1,
            Err(err) => return Err(err.into()),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);
    assert_eq!(fx.directory.list().await?.len(), 1);

    // Health-style probe: the directory answers for an id that cannot exist.
    assert!(fx.directory.find_by_id(Uuid::nil()).await?.is_none());
    Ok(())
}
