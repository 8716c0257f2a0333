//! In-memory attempt log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use vigil_core::{Error, attempt::AttemptRecord, repositories::AttemptLog};

/// Append-only attempt log keyed by identifier.
#[derive(Default)]
pub struct MemoryAttemptLog {
    records: DashMap<String, Vec<AttemptRecord>>,
}

impl MemoryAttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records for an identifier, oldest first. Test and forensics
    /// helper; the engine itself only uses the trait methods.
    pub fn records_for(&self, identifier: &str) -> Vec<AttemptRecord> {
        self.records
            .get(identifier)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AttemptLog for MemoryAttemptLog {
    async fn append(&self, record: &AttemptRecord) -> Result<(), Error> {
        self.records
            .entry(record.identifier.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn count_failures_since(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count = self
            .records
            .get(identifier)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.outcome.is_failure() && r.attempted_at >= since)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u32)
    }

    async fn last_success_at(&self, identifier: &str) -> Result<Option<DateTime<Utc>>, Error> {
        let last = self.records.get(identifier).and_then(|records| {
            records
                .iter()
                .filter(|r| !r.outcome.is_failure())
                .map(|r| r.attempted_at)
                .max()
        });
        Ok(last)
    }
}
