//! Append-only authentication attempt records
//!
//! Every authentication attempt produces an [`AttemptRecord`]. Records are
//! never mutated after creation; the lockout state machine derives its
//! failure window by counting records, and audit consumers read them as a
//! trail. Attempts are recorded for unknown identifiers too, to avoid
//! leaking which accounts exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason code attached to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The presented secret did not match, or the account does not exist.
    InvalidCredentials,
    /// The account is administratively disabled.
    AccountDisabled,
    /// A TOTP code was presented and rejected.
    InvalidMfaCode,
    /// A backup code was presented and rejected (or already consumed).
    InvalidBackupCode,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidCredentials => "invalid_credentials",
            FailureReason::AccountDisabled => "account_disabled",
            FailureReason::InvalidMfaCode => "invalid_mfa_code",
            FailureReason::InvalidBackupCode => "invalid_backup_code",
        }
    }
}

/// Outcome of a recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success,
    Failure(FailureReason),
}

impl AttemptOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, AttemptOutcome::Failure(_))
    }
}

/// Origin metadata captured with each attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOrigin {
    /// Network address of the client, if known.
    pub ip_address: Option<String>,
    /// Client signature string (user agent), if known.
    pub user_agent: Option<String>,
}

/// A single authentication attempt, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// The identifier that was attempted (may or may not exist).
    pub identifier: String,
    pub outcome: AttemptOutcome,
    pub origin: AttemptOrigin,
    pub attempted_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn failure(identifier: &str, reason: FailureReason, origin: AttemptOrigin) -> Self {
        Self {
            identifier: identifier.to_string(),
            outcome: AttemptOutcome::Failure(reason),
            origin,
            attempted_at: Utc::now(),
        }
    }

    pub fn success(identifier: &str, origin: AttemptOrigin) -> Self {
        Self {
            identifier: identifier.to_string(),
            outcome: AttemptOutcome::Success,
            origin,
            attempted_at: Utc::now(),
        }
    }

    pub fn at(mut self, attempted_at: DateTime<Utc>) -> Self {
        self.attempted_at = attempted_at;
        self
    }
}
