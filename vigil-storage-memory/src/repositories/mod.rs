//! Repository implementations for in-memory storage

pub mod account;
pub mod attempt;
pub mod revocation;

pub use account::MemoryAccountRepository;
pub use attempt::MemoryAttemptLog;
pub use revocation::MemoryRevocationStore;

use std::sync::Arc;

use async_trait::async_trait;
use vigil_core::{
    Error,
    repositories::{
        AccountRepositoryProvider, AttemptLogProvider, RepositoryProvider,
        RevocationStoreProvider,
    },
};

/// Repository provider implementation for in-memory storage
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct MemoryRepositoryProvider {
    accounts: Arc<MemoryAccountRepository>,
    attempts: Arc<MemoryAttemptLog>,
    revocations: Arc<MemoryRevocationStore>,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(MemoryAccountRepository::new()),
            attempts: Arc::new(MemoryAttemptLog::new()),
            revocations: Arc::new(MemoryRevocationStore::new()),
        }
    }
}

impl Default for MemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountRepositoryProvider for MemoryRepositoryProvider {
    type AccountRepo = MemoryAccountRepository;

    fn accounts(&self) -> &Self::AccountRepo {
        &self.accounts
    }
}

impl AttemptLogProvider for MemoryRepositoryProvider {
    type AttemptRepo = MemoryAttemptLog;

    fn attempts(&self) -> &Self::AttemptRepo {
        &self.attempts
    }
}

impl RevocationStoreProvider for MemoryRepositoryProvider {
    type RevocationRepo = MemoryRevocationStore;

    fn revocations(&self) -> &Self::RevocationRepo {
        &self.revocations
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn health_check(&self) -> Result<(), Error> {
        // Purely in-process, nothing to probe
        Ok(())
    }
}
