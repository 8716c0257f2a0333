//! Audit events
//!
//! Every component of the decision engine reports security-relevant activity
//! through the [`AuditLog`]. Events carry the full internal detail (threat
//! scores, reasons, counters) that is deliberately withheld from callers.
//!
//! Delivery is fire-and-forget: a failing or slow sink must never change an
//! authentication outcome, so sink errors are logged and swallowed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{attempt::FailureReason, error::EventError};

/// Reason why an account was unlocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockReason {
    /// A successful authentication cleared the lock.
    SuccessfulAuthentication,
    /// Lockout period expired naturally.
    LockoutExpired,
    /// Administrator manually unlocked the account.
    AdminAction,
}

/// Security events emitted by the decision engine.
///
/// All events contain the internal detail needed for monitoring and
/// forensics. Callers of the public API only ever see the coarse outcome;
/// this is where the rest goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuditEvent {
    /// An authentication attempt failed.
    AttemptFailed {
        identifier: String,
        reason: FailureReason,
        /// Number of failures in the current lockout window
        failed_attempts: u32,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An authentication attempt succeeded end to end.
    AttemptSucceeded {
        identifier: String,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An account became locked due to too many failed attempts.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        identifier: String,
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An account was unlocked.
    AccountUnlocked {
        identifier: String,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },

    /// The threat scorer denied or challenged an attempt. The full score and
    /// reasons are recorded here and never surfaced to the caller.
    ThreatAssessed {
        identifier: String,
        score: u16,
        verdict: String,
        reasons: Vec<String>,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The rate limiter denied an attempt.
    RateLimited {
        identifier: String,
        action: String,
        retry_after_seconds: i64,
        timestamp: DateTime<Utc>,
    },

    /// A session token was issued.
    SessionIssued {
        account_id: String,
        jti: String,
        expires_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A session token was revoked.
    SessionRevoked {
        jti: String,
        timestamp: DateTime<Utc>,
    },

    /// Multi-factor enrollment was completed.
    MfaEnabled {
        account_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Multi-factor enrollment was removed.
    MfaDisabled {
        account_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A single-use backup code was consumed.
    BackupCodeConsumed {
        account_id: String,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Short name used for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::AttemptFailed { .. } => "attempt_failed",
            AuditEvent::AttemptSucceeded { .. } => "attempt_succeeded",
            AuditEvent::AccountLocked { .. } => "account_locked",
            AuditEvent::AccountUnlocked { .. } => "account_unlocked",
            AuditEvent::ThreatAssessed { .. } => "threat_assessed",
            AuditEvent::RateLimited { .. } => "rate_limited",
            AuditEvent::SessionIssued { .. } => "session_issued",
            AuditEvent::SessionRevoked { .. } => "session_revoked",
            AuditEvent::MfaEnabled { .. } => "mfa_enabled",
            AuditEvent::MfaDisabled { .. } => "mfa_disabled",
            AuditEvent::BackupCodeConsumed { .. } => "backup_code_consumed",
        }
    }
}

/// A sink for audit events.
///
/// Implementors can be registered with the [`AuditLog`] to receive every
/// event the engine emits. Sinks must not block for long: delivery happens
/// on the request path.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn emit(&self, event: &AuditEvent) -> Result<(), EventError>;
}

/// Fan-out of audit events to registered sinks.
///
/// Emission is fire-and-forget: sink failures are logged via `tracing` and
/// never propagate to the authentication outcome.
#[derive(Clone)]
pub struct AuditLog {
    sinks: Arc<RwLock<Vec<Arc<dyn AuditSink>>>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a log with an initial set of sinks.
    pub fn with_sinks(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self {
            sinks: Arc::new(RwLock::new(sinks)),
        }
    }

    /// Register an audit sink.
    pub async fn register(&self, sink: Arc<dyn AuditSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Emit an event to all registered sinks, swallowing sink errors.
    pub async fn emit(&self, event: &AuditEvent) {
        for sink in self.sinks.read().await.iter() {
            if let Err(e) = sink.emit(event).await {
                tracing::warn!(
                    error = %e,
                    event = event.kind(),
                    "Audit sink failed; continuing"
                );
            }
        }
    }
}

/// An [`AuditSink`] that writes events through `tracing`.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<(), EventError> {
        let detail =
            serde_json::to_string(event).map_err(|e| EventError::SinkError(e.to_string()))?;
        tracing::info!(event = event.kind(), %detail, "audit");
        Ok(())
    }
}
