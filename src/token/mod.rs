//! Stateless access/refresh token signing and verification.
//!
//! Access and refresh tokens are signed with distinct secrets so compromise
//! of one key cannot forge the other token type. Verification is pure
//! cryptographic work with no shared state, safe to run from any task.

use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshClaimsWire {
    sub: Uuid,
    token_version: u32,
    iat: i64,
    exp: i64,
}

/// Verified refresh token contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshClaims {
    pub account_id: Uuid,
    pub token_version: u32,
}

pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(access_secret: &SecretString, refresh_secret: &SecretString) -> Self {
        Self::with_ttls(
            access_secret,
            refresh_secret,
            Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            Duration::days(REFRESH_TOKEN_TTL_DAYS),
        )
    }

    #[must_use]
    pub fn with_ttls(
        access_secret: &SecretString,
        refresh_secret: &SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Produce a fresh access/refresh pair for the account.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue(&self, account_id: Uuid, token_version: u32) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access = AccessClaims {
            sub: account_id,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        let refresh = RefreshClaimsWire {
            sub: account_id,
            token_version,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        let access_token = encode(&Header::default(), &access, &self.access_encoding)
            .context("failed to sign access token")?;
        let refresh_token = encode(&Header::default(), &refresh, &self.refresh_encoding)
            .context("failed to sign refresh token")?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify an access token and return the account id it was issued for.
    ///
    /// # Errors
    /// Returns `AuthError::Authentication` on bad signature, malformed
    /// payload, or expiry.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &validation())
            .map_err(|_| AuthError::Authentication)?;
        Ok(data.claims.sub)
    }

    /// Verify a refresh token and return its embedded claims. Whether the
    /// token version is still current is the caller's check against the
    /// directory.
    ///
    /// # Errors
    /// Returns `AuthError::Authentication` on bad signature, malformed
    /// payload, or expiry.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        let data = decode::<RefreshClaimsWire>(token, &self.refresh_decoding, &validation())
            .map_err(|_| AuthError::Authentication)?;
        Ok(RefreshClaims {
            account_id: data.claims.sub,
            token_version: data.claims.token_version,
        })
    }
}

fn validation() -> Validation {
    Validation::new(Algorithm::HS256)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> (SecretString, SecretString) {
        (
            SecretString::from("access-secret-for-tests".to_string()),
            SecretString::from("refresh-secret-for-tests".to_string()),
        )
    }

    fn service() -> TokenService {
        let (access, refresh) = secrets();
        TokenService::new(&access, &refresh)
    }

    #[test]
    fn issue_and_verify_round_trip() -> anyhow::Result<()> {
        let service = service();
        let account_id = Uuid::new_v4();

        let pair = service.issue(account_id, 3)?;
        assert_eq!(service.verify_access(&pair.access_token)?, account_id);

        let claims = service.verify_refresh(&pair.refresh_token)?;
        assert_eq!(claims.account_id, account_id);
        assert_eq!(claims.token_version, 3);
        Ok(())
    }

    #[test]
    fn tokens_are_not_interchangeable() -> anyhow::Result<()> {
        let service = service();
        let pair = service.issue(Uuid::new_v4(), 0)?;

        // Signed with different secrets, so each verifier rejects the other.
        assert!(service.verify_access(&pair.refresh_token).is_err());
        assert!(service.verify_refresh(&pair.access_token).is_err());
        Ok(())
    }

    #[test]
    fn verify_rejects_garbage_and_foreign_signatures() -> anyhow::Result<()> {
        let service = service();
        assert!(matches!(
            service.verify_access("not-a-token"),
            Err(AuthError::Authentication)
        ));

        let other = TokenService::new(
            &SecretString::from("other-access".to_string()),
            &SecretString::from("other-refresh".to_string()),
        );
        let pair = other.issue(Uuid::new_v4(), 0)?;
        assert!(service.verify_access(&pair.access_token).is_err());
        Ok(())
    }

    #[test]
    fn verify_rejects_expired_tokens() -> anyhow::Result<()> {
        let (access, refresh) = secrets();
        // Issued already past expiry, beyond the default leeway.
        let service = TokenService::with_ttls(
            &access,
            &refresh,
            Duration::minutes(-5),
            Duration::minutes(-5),
        );
        let pair = service.issue(Uuid::new_v4(), 0)?;

        assert!(matches!(
            service.verify_access(&pair.access_token),
            Err(AuthError::Authentication)
        ));
        assert!(matches!(
            service.verify_refresh(&pair.refresh_token),
            Err(AuthError::Authentication)
        ));
        Ok(())
    }
}
