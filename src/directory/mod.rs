//! User directory contract and account model.
//!
//! The directory is the only stateful collaborator the auth flows talk to.
//! It must support lookup by id/email/token hash, create with a global email
//! uniqueness guarantee, and an atomic read-modify-write update so concurrent
//! requests for the same account (say a password change racing a token
//! refresh) can never observe a half-applied row.

pub mod memory;

pub use memory::MemoryDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use uuid::Uuid;

pub const ROLE_USER: &str = "USER";
pub const ROLE_ADMIN: &str = "ADMIN";

/// Identity record. Plain data: hashing and validation live in services, not
/// on the entity.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Argon2 PHC string. Never empty, even for federated-only accounts,
    /// which carry an unusable random hash.
    pub password_hash: String,
    /// Bumped whenever all outstanding refresh tokens must die.
    pub token_version: u32,
    pub verified: bool,
    /// SHA-256 digest of the emailed verification token; the raw value is
    /// only ever sent to the user.
    pub verification_token_hash: Option<Vec<u8>>,
    pub reset_token_hash: Option<Vec<u8>>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    /// Email change lands here until the verification token is consumed.
    pub pending_email: Option<String>,
    pub roles: BTreeSet<String>,
    /// Provider name to provider-subject id.
    pub federated_ids: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub fn has_any_role(&self, required: &[&str]) -> bool {
        required.iter().any(|role| self.roles.contains(*role))
    }
}

/// Fields the directory needs to mint a new account row.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub verified: bool,
    pub verification_token_hash: Option<Vec<u8>>,
    pub roles: BTreeSet<String>,
    pub federated_ids: BTreeMap<String, String>,
}

impl NewAccount {
    /// Local registration: unverified, default role set.
    #[must_use]
    pub fn local(
        email: String,
        display_name: String,
        password_hash: String,
        verification_token_hash: Vec<u8>,
    ) -> Self {
        Self {
            email,
            display_name,
            password_hash,
            verified: false,
            verification_token_hash: Some(verification_token_hash),
            roles: default_roles(),
            federated_ids: BTreeMap::new(),
        }
    }

    /// Federated auto-provisioning: verified up front, no pending token.
    #[must_use]
    pub fn federated(
        email: String,
        display_name: String,
        password_hash: String,
        provider: String,
        subject: String,
    ) -> Self {
        Self {
            email,
            display_name,
            password_hash,
            verified: true,
            verification_token_hash: None,
            roles: default_roles(),
            federated_ids: BTreeMap::from([(provider, subject)]),
        }
    }
}

#[must_use]
pub fn default_roles() -> BTreeSet<String> {
    BTreeSet::from([ROLE_USER.to_string()])
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("email already in use")]
    EmailTaken,

    #[error("account not found")]
    NotFound,

    /// An `update` mutation observed state it refused to touch (e.g. a
    /// single-use token that was consumed by a concurrent request).
    #[error("update precondition failed")]
    PreconditionFailed,

    #[error(transparent)]
    Unavailable(#[from] anyhow::Error),
}

/// Mutation applied under the row lock by [`UserDirectory::update`].
///
/// Returning an error aborts the update without persisting anything, which is
/// how flows make token consumption single-use.
pub type Mutation<'a> = &'a (dyn Fn(&mut Account) -> Result<(), DirectoryError> + Send + Sync);

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DirectoryError>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError>;

    /// Lookup by verification token digest.
    async fn find_by_verification_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<Account>, DirectoryError>;

    /// Lookup by reset token digest. Expiry is the caller's concern so it can
    /// distinguish "unknown token" from "expired token".
    async fn find_by_reset_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<Account>, DirectoryError>;

    /// Create an account; fails with [`DirectoryError::EmailTaken`] on a
    /// duplicate address.
    async fn create(&self, account: NewAccount) -> Result<Account, DirectoryError>;

    /// Atomic read-modify-write. The mutation runs under the row lock; email
    /// uniqueness is re-validated before the row is persisted.
    async fn update(&self, id: Uuid, mutation: Mutation<'_>) -> Result<Account, DirectoryError>;

    /// Remove an account. Terminal.
    async fn delete(&self, id: Uuid) -> Result<(), DirectoryError>;

    /// All accounts, oldest first. Administrative surface only.
    async fn list(&self) -> Result<Vec<Account>, DirectoryError>;
}
