//! Repository traits for the data access layer
//!
//! These traits are the storage-agnostic boundary between the decision
//! engine and whatever persistence layer backs it. Services only ever talk
//! to these interfaces.
//!
//! # Trait hierarchy
//!
//! - Individual `*Repository` traits define the operations for each data
//!   domain
//! - Individual `*Provider` traits expose each repository through an
//!   associated type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits
//!   plus a health check
//!
//! Storage backends implement the repository traits once and gain the
//! unified provider interface for free.

pub mod account;
pub mod adapter;
pub mod attempt;
pub mod revocation;

pub use account::AccountRepository;
pub use adapter::{AccountRepositoryAdapter, AttemptLogAdapter, RevocationStoreAdapter};
pub use attempt::AttemptLog;
pub use revocation::RevocationStore;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for account repository access.
pub trait AccountRepositoryProvider: Send + Sync + 'static {
    /// The account repository implementation type
    type AccountRepo: AccountRepository;

    /// Get the account repository
    fn accounts(&self) -> &Self::AccountRepo;
}

/// Provider trait for attempt log access.
pub trait AttemptLogProvider: Send + Sync + 'static {
    /// The attempt log implementation type
    type AttemptRepo: AttemptLog;

    /// Get the attempt log
    fn attempts(&self) -> &Self::AttemptRepo;
}

/// Provider trait for revocation store access.
pub trait RevocationStoreProvider: Send + Sync + 'static {
    /// The revocation store implementation type
    type RevocationRepo: RevocationStore;

    /// Get the revocation store
    fn revocations(&self) -> &Self::RevocationRepo;
}

/// Provider trait that storage implementations must implement to provide all
/// repositories.
///
/// # Implementing a custom storage backend
///
/// 1. Implement each individual `*Repository` trait for your backend
/// 2. Implement each individual `*Provider` trait
/// 3. Implement `RepositoryProvider` with `health_check()`
#[async_trait]
pub trait RepositoryProvider:
    AccountRepositoryProvider + AttemptLogProvider + RevocationStoreProvider
{
    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
