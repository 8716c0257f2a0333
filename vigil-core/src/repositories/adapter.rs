//! Adapters that wrap a [`RepositoryProvider`] and implement the individual
//! repository traits, so services generic over one repository can be built
//! from a shared provider handle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, MfaState, NewAccount},
    attempt::AttemptRecord,
    repositories::{
        AccountRepository, AccountRepositoryProvider, AttemptLog, AttemptLogProvider,
        RepositoryProvider, RevocationStore, RevocationStoreProvider,
    },
};

pub struct AccountRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AccountRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AccountRepository for AccountRepositoryAdapter<R> {
    async fn create(&self, account: &NewAccount) -> Result<Account, Error> {
        self.provider.accounts().create(account).await
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<Account>, Error> {
        self.provider.accounts().get_by_identifier(identifier).await
    }

    async fn update_lockout(
        &self,
        id: &AccountId,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        self.provider.accounts().update_lockout(id, locked_until).await
    }

    async fn update_mfa_state(&self, id: &AccountId, state: MfaState) -> Result<(), Error> {
        self.provider.accounts().update_mfa_state(id, state).await
    }

    async fn consume_backup_code(&self, id: &AccountId, code_hash: &str) -> Result<bool, Error> {
        self.provider
            .accounts()
            .consume_backup_code(id, code_hash)
            .await
    }
}

pub struct AttemptLogAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptLogAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AttemptLog for AttemptLogAdapter<R> {
    async fn append(&self, record: &AttemptRecord) -> Result<(), Error> {
        self.provider.attempts().append(record).await
    }

    async fn count_failures_since(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        self.provider
            .attempts()
            .count_failures_since(identifier, since)
            .await
    }

    async fn last_success_at(&self, identifier: &str) -> Result<Option<DateTime<Utc>>, Error> {
        self.provider.attempts().last_success_at(identifier).await
    }
}

pub struct RevocationStoreAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> RevocationStoreAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> RevocationStore for RevocationStoreAdapter<R> {
    async fn insert(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        self.provider.revocations().insert(jti, expires_at).await
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, Error> {
        self.provider.revocations().is_revoked(jti).await
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.revocations().prune_expired(now).await
    }
}
