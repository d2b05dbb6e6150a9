//! In-memory reference implementation of the user directory.
//!
//! Accounts and the email index live behind a single `RwLock`, so `create`
//! and `update` validate email uniqueness and persist the row under one
//! write lock. That makes every update an atomic read-modify-write, which is
//! all the flows require from a production directory as well.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Account, DirectoryError, Mutation, NewAccount, UserDirectory};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    by_email: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct MemoryDirectory {
    inner: RwLock<Inner>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DirectoryError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DirectoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn find_by_verification_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<Account>, DirectoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| {
                account
                    .verification_token_hash
                    .as_deref()
                    .is_some_and(|hash| hash == token_hash)
            })
            .cloned())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<Account>, DirectoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| {
                account
                    .reset_token_hash
                    .as_deref()
                    .is_some_and(|hash| hash == token_hash)
            })
            .cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<Account, DirectoryError> {
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&account.email) {
            return Err(DirectoryError::EmailTaken);
        }

        let id = Uuid::new_v4();
        let row = Account {
            id,
            email: account.email.clone(),
            display_name: account.display_name,
            password_hash: account.password_hash,
            token_version: 0,
            verified: account.verified,
            verification_token_hash: account.verification_token_hash,
            reset_token_hash: None,
            reset_token_expires_at: None,
            pending_email: None,
            roles: account.roles,
            federated_ids: account.federated_ids,
            created_at: Utc::now(),
        };
        inner.by_email.insert(account.email, id);
        inner.accounts.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, id: Uuid, mutation: Mutation<'_>) -> Result<Account, DirectoryError> {
        let mut inner = self.inner.write().await;
        let current = inner.accounts.get(&id).ok_or(DirectoryError::NotFound)?;

        let mut updated = current.clone();
        mutation(&mut updated)?;

        // Re-validate email uniqueness under the same write lock.
        if updated.email != current.email {
            if inner
                .by_email
                .get(&updated.email)
                .is_some_and(|other| *other != id)
            {
                return Err(DirectoryError::EmailTaken);
            }
            let previous = current.email.clone();
            inner.by_email.remove(&previous);
            inner.by_email.insert(updated.email.clone(), id);
        }

        inner.accounts.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().await;
        let account = inner.accounts.remove(&id).ok_or(DirectoryError::NotFound)?;
        inner.by_email.remove(&account.email);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Account>, DirectoryError> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<Account> = inner.accounts.values().cloned().collect();
        accounts.sort_by_key(|account| account.created_at);
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::default_roles;
    use anyhow::Result;

    fn new_account(email: &str) -> NewAccount {
        NewAccount::local(
            email.to_string(),
            "Test".to_string(),
            "$argon2id$stub".to_string(),
            vec![1, 2, 3],
        )
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() -> Result<()> {
        let directory = MemoryDirectory::new();
        directory.create(new_account("a@example.com")).await?;

        let err = directory.create(new_account("a@example.com")).await;
        assert!(matches!(err, Err(DirectoryError::EmailTaken)));
        Ok(())
    }

    #[tokio::test]
    async fn new_accounts_start_with_default_roles_and_version_zero() -> Result<()> {
        let directory = MemoryDirectory::new();
        let account = directory.create(new_account("a@example.com")).await?;
        assert_eq!(account.token_version, 0);
        assert_eq!(account.roles, default_roles());
        assert!(!account.verified);
        Ok(())
    }

    #[tokio::test]
    async fn update_applies_mutation_atomically() -> Result<()> {
        let directory = MemoryDirectory::new();
        let account = directory.create(new_account("a@example.com")).await?;

        let updated = directory
            .update(account.id, &|row| {
                row.token_version += 1;
                row.verified = true;
                Ok(())
            })
            .await?;
        assert_eq!(updated.token_version, 1);
        assert!(updated.verified);

        let reloaded = directory.find_by_id(account.id).await?;
        assert_eq!(reloaded.map(|row| row.token_version), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn update_aborts_without_persisting_on_mutation_error() -> Result<()> {
        let directory = MemoryDirectory::new();
        let account = directory.create(new_account("a@example.com")).await?;

        let err = directory
            .update(account.id, &|row| {
                row.token_version += 1;
                Err(DirectoryError::PreconditionFailed)
            })
            .await;
        assert!(matches!(err, Err(DirectoryError::PreconditionFailed)));

        let reloaded = directory.find_by_id(account.id).await?;
        assert_eq!(reloaded.map(|row| row.token_version), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn update_rejects_email_collision() -> Result<()> {
        let directory = MemoryDirectory::new();
        directory.create(new_account("a@example.com")).await?;
        let second = directory.create(new_account("b@example.com")).await?;

        let err = directory
            .update(second.id, &|row| {
                row.email = "a@example.com".to_string();
                Ok(())
            })
            .await;
        assert!(matches!(err, Err(DirectoryError::EmailTaken)));
        Ok(())
    }

    #[tokio::test]
    async fn delete_frees_the_email_for_reuse() -> Result<()> {
        let directory = MemoryDirectory::new();
        let account = directory.create(new_account("a@example.com")).await?;
        directory.delete(account.id).await?;

        assert!(directory.find_by_email("a@example.com").await?.is_none());
        directory.create(new_account("a@example.com")).await?;
        Ok(())
    }

    #[tokio::test]
    async fn token_lookups_match_on_digest() -> Result<()> {
        let directory = MemoryDirectory::new();
        let account = directory.create(new_account("a@example.com")).await?;

        let found = directory.find_by_verification_token(&[1, 2, 3]).await?;
        assert_eq!(found.map(|row| row.id), Some(account.id));

        assert!(directory.find_by_verification_token(&[9]).await?.is_none());
        assert!(directory.find_by_reset_token(&[1, 2, 3]).await?.is_none());
        Ok(())
    }
}
