//! Repository trait for the session revocation ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Error;

/// Denylist of revoked session token identifiers.
///
/// # Consistency contract
///
/// An `insert` must be visible to all subsequent `is_revoked` calls without
/// unbounded delay. The in-memory implementation is strongly consistent;
/// backends built on an eventually-consistent store must document their
/// maximum staleness window as part of the deployment's security contract,
/// because that window is exactly how long a revoked token keeps working.
#[async_trait]
pub trait RevocationStore: Send + Sync + 'static {
    /// Insert a revocation entry for `jti`.
    ///
    /// `expires_at` mirrors the token's own expiry so the entry can be
    /// pruned once the token would have expired anyway.
    async fn insert(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), Error>;

    /// Whether `jti` has been revoked.
    async fn is_revoked(&self, jti: &str) -> Result<bool, Error>;

    /// Remove entries whose expiry is at or before `now`.
    ///
    /// Returns the number of entries removed. Keeps ledger growth bounded by
    /// the token lifetime.
    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
