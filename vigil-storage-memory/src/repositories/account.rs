//! In-memory account repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use vigil_core::{
    Error,
    account::{Account, AccountId, MfaState, NewAccount},
    crypto::constant_time_compare,
    error::StorageError,
    repositories::AccountRepository,
};

/// Account repository backed by concurrent hash maps.
///
/// Mutations go through `DashMap::get_mut`, which holds the shard lock for
/// the duration of the closure. That lock is what makes
/// `consume_backup_code` an atomic check-and-remove.
#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: DashMap<AccountId, Account>,
    by_identifier: DashMap<String, AccountId>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Administratively disable or re-enable an account.
    pub fn set_disabled(&self, id: &AccountId, disabled: bool) {
        if let Some(mut account) = self.accounts.get_mut(id) {
            account.disabled = disabled;
            account.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create(&self, account: &NewAccount) -> Result<Account, Error> {
        // The identifier index entry is the uniqueness gate; holding its
        // entry lock keeps two concurrent creates from both succeeding.
        match self.by_identifier.entry(account.identifier.clone()) {
            Entry::Occupied(_) => {
                return Err(StorageError::Constraint(format!(
                    "identifier already registered: {}",
                    account.identifier
                ))
                .into());
            }
            Entry::Vacant(entry) => {
                entry.insert(account.id.clone());
            }
        }

        let now = Utc::now();
        let record = Account {
            id: account.id.clone(),
            identifier: account.identifier.clone(),
            password_hash: account.password_hash.clone(),
            disabled: false,
            locked_until: None,
            mfa: MfaState::Disabled,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(account.id.clone(), record.clone());

        Ok(record)
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<Account>, Error> {
        let Some(id) = self.by_identifier.get(identifier) else {
            return Ok(None);
        };
        Ok(self.accounts.get(id.value()).map(|a| a.value().clone()))
    }

    async fn update_lockout(
        &self,
        id: &AccountId,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        if let Some(mut account) = self.accounts.get_mut(id) {
            account.locked_until = locked_until;
            account.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_mfa_state(&self, id: &AccountId, state: MfaState) -> Result<(), Error> {
        let Some(mut account) = self.accounts.get_mut(id) else {
            return Err(StorageError::NotFound.into());
        };
        account.mfa = state;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn consume_backup_code(&self, id: &AccountId, code_hash: &str) -> Result<bool, Error> {
        let Some(mut account) = self.accounts.get_mut(id) else {
            return Err(StorageError::NotFound.into());
        };

        let hashes = match &mut account.mfa {
            MfaState::Enabled {
                backup_code_hashes, ..
            } => backup_code_hashes,
            _ => return Ok(false),
        };

        // Hashes are compared in constant time even though the inputs are
        // already SHA256 digests; the stored set is small and the cost is
        // negligible.
        let Some(position) = hashes
            .iter()
            .position(|h| constant_time_compare(h.as_bytes(), code_hash.as_bytes()))
        else {
            return Ok(false);
        };
        hashes.remove(position);
        account.updated_at = Utc::now();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_account(identifier: &str) -> NewAccount {
        NewAccount::new(identifier, Some("$argon2id$fake".to_string()))
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = MemoryAccountRepository::new();
        let created = repo.create(&new_account("user@example.com")).await.unwrap();

        let found = repo
            .get_by_identifier("user@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert!(!found.disabled);
        assert!(found.locked_until.is_none());
        assert_eq!(found.mfa, MfaState::Disabled);
    }

    #[tokio::test]
    async fn test_duplicate_identifier_rejected() {
        let repo = MemoryAccountRepository::new();
        repo.create(&new_account("user@example.com")).await.unwrap();

        let result = repo.create(&new_account("user@example.com")).await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Constraint(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_none() {
        let repo = MemoryAccountRepository::new();
        assert!(
            repo.get_by_identifier("nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_lockout_roundtrip() {
        let repo = MemoryAccountRepository::new();
        let account = repo.create(&new_account("user@example.com")).await.unwrap();

        let until = Utc::now() + chrono::Duration::minutes(30);
        repo.update_lockout(&account.id, Some(until)).await.unwrap();
        let locked = repo
            .get_by_identifier("user@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(locked.locked_until, Some(until));

        repo.update_lockout(&account.id, None).await.unwrap();
        let cleared = repo
            .get_by_identifier("user@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.locked_until.is_none());
    }

    #[tokio::test]
    async fn test_lockout_update_for_unknown_account_is_noop() {
        let repo = MemoryAccountRepository::new();
        let ghost = AccountId::new_random();
        assert!(repo.update_lockout(&ghost, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_backup_code_consumption() {
        let repo = Arc::new(MemoryAccountRepository::new());
        let account = repo.create(&new_account("user@example.com")).await.unwrap();

        repo.update_mfa_state(
            &account.id,
            MfaState::Enabled {
                secret: "SECRET".to_string(),
                backup_code_hashes: vec!["hash-1".to_string(), "hash-2".to_string()],
            },
        )
        .await
        .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            let id = account.id.clone();
            handles.push(tokio::spawn(async move {
                repo.consume_backup_code(&id, "hash-1").await.unwrap()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }
        // The same code must redeem exactly once no matter the contention
        assert_eq!(succeeded, 1);

        // The other code is untouched
        assert!(
            repo.consume_backup_code(&account.id, "hash-2")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_consume_rejects_near_miss_hash() {
        let repo = MemoryAccountRepository::new();
        let account = repo.create(&new_account("user@example.com")).await.unwrap();

        let stored = vigil_core::crypto::hash_token("AAAAA-BBBBB");
        repo.update_mfa_state(
            &account.id,
            MfaState::Enabled {
                secret: "SECRET".to_string(),
                backup_code_hashes: vec![stored.clone()],
            },
        )
        .await
        .unwrap();

        // Same length, differs only in the final character
        let mut near_miss = stored.clone();
        let flipped = if near_miss.ends_with('0') { '1' } else { '0' };
        near_miss.pop();
        near_miss.push(flipped);

        assert!(!repo.consume_backup_code(&account.id, &near_miss).await.unwrap());
        assert!(repo.consume_backup_code(&account.id, &stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_backup_code_requires_enabled_state() {
        let repo = MemoryAccountRepository::new();
        let account = repo.create(&new_account("user@example.com")).await.unwrap();

        repo.update_mfa_state(
            &account.id,
            MfaState::Pending {
                secret: "SECRET".to_string(),
                backup_code_hashes: vec!["hash-1".to_string()],
            },
        )
        .await
        .unwrap();

        assert!(
            !repo
                .consume_backup_code(&account.id, "hash-1")
                .await
                .unwrap()
        );
    }
}
