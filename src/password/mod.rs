//! Credential hashing service.
//!
//! Argon2id with a tunable cost factor. Hashing is deliberately slow, so both
//! hash and verify run on the blocking pool behind a semaphore: a burst of
//! login attempts queues here instead of starving the request-accepting path.
//! Verification goes through `verify_password`, which compares in constant
//! time.

use anyhow::{Context, anyhow};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64ct::Encoding as _;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::AuthError;

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Clone)]
pub struct PasswordService {
    params: Params,
    permits: Arc<Semaphore>,
}

impl PasswordService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Params::default(),
            permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    /// Override the Argon2 cost parameters (tests use cheap ones).
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Bound on concurrent hashing jobs.
    #[must_use]
    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    /// Hash a password with a fresh random salt.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the hashing job cannot run.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AuthError::Internal(anyhow!("password hashing pool closed")))?;

        let params = self.params.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || {
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .context("password hashing job panicked")?
        .map_err(|err| AuthError::Internal(anyhow!("password hashing failed: {err}")))?;

        Ok(hash)
    }

    /// Verify a password against a stored PHC string.
    ///
    /// Unparseable hashes (e.g. a federated placeholder that was never a real
    /// hash) simply never match.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the verification job cannot run.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, AuthError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AuthError::Internal(anyhow!("password hashing pool closed")))?;

        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        let matched = tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&stored_hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await
        .context("password verification job panicked")?;

        Ok(matched)
    }

    /// Random unusable placeholder hash for federated-only accounts. The
    /// input is 32 random bytes that are thrown away, so no password can ever
    /// match it on purpose.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if the hashing job cannot run.
    pub async fn random_placeholder(&self) -> Result<String, AuthError> {
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let throwaway = base64ct::Base64UrlUnpadded::encode_string(&bytes);
        self.hash(&throwaway).await
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new()
    }
}

/// Password strength rules, checked before any directory access.
///
/// # Errors
/// Returns `AuthError::Validation` naming the first violated rule.
pub fn validate_strength(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(AuthError::validation(
            "Password must contain at least one letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::validation(
            "Password must contain at least one digit",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_service() -> PasswordService {
        let params = Params::new(4096, 1, 1, None).expect("test params");
        PasswordService::new().with_params(params).with_concurrency(2)
    }

    #[tokio::test]
    async fn hash_and_verify_round_trip() -> anyhow::Result<()> {
        let service = cheap_service();
        let hash = service.hash("Passw0rd1").await?;
        assert!(hash.starts_with("$argon2id$"));

        assert!(service.verify("Passw0rd1", &hash).await?);
        assert!(!service.verify("wrong-password1", &hash).await?);
        Ok(())
    }

    #[tokio::test]
    async fn same_password_hashes_differently() -> anyhow::Result<()> {
        let service = cheap_service();
        let first = service.hash("Passw0rd1").await?;
        let second = service.hash("Passw0rd1").await?;
        assert_ne!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn unparseable_hash_never_matches() -> anyhow::Result<()> {
        let service = cheap_service();
        assert!(!service.verify("Passw0rd1", "not-a-phc-string").await?);
        Ok(())
    }

    #[tokio::test]
    async fn placeholder_is_a_valid_hash_nobody_matches() -> anyhow::Result<()> {
        let service = cheap_service();
        let placeholder = service.random_placeholder().await?;
        assert!(placeholder.starts_with("$argon2id$"));
        assert!(!service.verify("Passw0rd1", &placeholder).await?);
        Ok(())
    }

    #[test]
    fn strength_rules() {
        assert!(validate_strength("Passw0rd1").is_ok());
        assert!(validate_strength("short1").is_err());
        assert!(validate_strength("12345678").is_err());
        assert!(validate_strength("passwords").is_err());
        let long = "a1".repeat(100);
        assert!(validate_strength(&long).is_err());
    }
}
