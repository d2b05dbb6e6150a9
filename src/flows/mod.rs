//! Credential and session lifecycle flows.
//!
//! Each flow is an injectable struct over the collaborator traits: the
//! directory for account state, the password service for hashing, the token
//! service for JWTs, the sender for outbound email. Handlers stay thin and
//! the flows carry all of the semantics.

pub mod credentials;
pub mod federation;
pub mod reset;
pub mod verification;

pub use credentials::CredentialFlow;
pub use federation::FederationAdapter;
pub use reset::PasswordResetFlow;
pub use verification::EmailVerificationFlow;

use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use crate::error::AuthError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles")
});

/// Lowercase and trim an address so lookups and uniqueness checks agree.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// # Errors
/// Returns `AuthError::Validation` if the address is not shaped like an
/// email.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::validation("Invalid email address"))
    }
}

/// Mint a single-use token: 32 random bytes, URL-safe encoded. The raw value
/// goes into the email link; only its digest is stored.
#[must_use]
pub fn generate_token() -> String {
    use base64ct::Encoding as _;

    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64ct::Base64UrlUnpadded::encode_string(&bytes)
}

/// SHA-256 digest of a single-use token, the form the directory stores.
#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}
