//! In-memory session revocation ledger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use vigil_core::{Error, repositories::RevocationStore};

/// Revocation ledger backed by a concurrent map. Strongly consistent: an
/// insert is visible to every subsequent lookup.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: DashMap<String, DateTime<Utc>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn insert(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), Error> {
        self.entries.insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, Error> {
        Ok(self.entries.contains_key(jti))
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        Ok((before - self.entries.len()) as u64)
    }
}
