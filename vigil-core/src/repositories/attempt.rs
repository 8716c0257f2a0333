//! Repository trait for the append-only attempt log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, attempt::AttemptRecord};

/// Append-only log of authentication attempts.
///
/// The lockout state machine derives its failure window from this log
/// rather than keeping a mutable counter, so the audit trail is preserved:
/// a success supersedes earlier failures by filtering, not deletion.
#[async_trait]
pub trait AttemptLog: Send + Sync + 'static {
    /// Append an attempt record. Records are never mutated afterwards.
    async fn append(&self, record: &AttemptRecord) -> Result<(), Error>;

    /// Count failure records for an identifier at or after `since`.
    async fn count_failures_since(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Timestamp of the most recent successful attempt for an identifier,
    /// if any. Used to supersede failures that predate the last success.
    async fn last_success_at(&self, identifier: &str) -> Result<Option<DateTime<Utc>>, Error>;
}
