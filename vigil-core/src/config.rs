//! Configuration for the decision engine
//!
//! All tuning values live here as injected configuration rather than
//! compile-time constants. The defaults are reasonable starting points, not
//! authoritative policy; deployments are expected to tune them.

use chrono::Duration;

/// Configuration for the sliding-window rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum attempts allowed inside the window.
    pub max_attempts: u32,
    /// Length of the sliding window.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            window: Duration::minutes(15),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }
}

/// Configuration for account lockout.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Whether lockout is enforced at all.
    pub enabled: bool,
    /// Failures within the window that trigger a lock.
    pub max_failed_attempts: u32,
    /// Trailing window over which failures are counted.
    pub window: Duration,
    /// How long a triggered lock lasts. Stored as an absolute expiry.
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 5,
            window: Duration::minutes(15),
            lock_duration: Duration::minutes(30),
        }
    }
}

impl LockoutConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Signal weights for the threat scorer.
///
/// Each matched signal contributes its weight to the total score; the
/// verdict thresholds live in [`ThreatConfig`].
#[derive(Debug, Clone)]
pub struct ThreatWeights {
    /// The client address has a bad reputation.
    pub flagged_network: u16,
    /// The user agent matches a bot/scanner heuristic.
    pub suspicious_user_agent: u16,
    /// Added per recent failure for the (account, address) pair.
    pub per_recent_failure: u16,
    /// The attempt falls into the account's anomalous time-of-day band.
    pub off_hours: u16,
}

impl Default for ThreatWeights {
    fn default() -> Self {
        Self {
            flagged_network: 100,
            suspicious_user_agent: 60,
            per_recent_failure: 20,
            off_hours: 30,
        }
    }
}

/// Configuration for the threat scorer.
#[derive(Debug, Clone)]
pub struct ThreatConfig {
    pub weights: ThreatWeights,
    /// Score at or above which the verdict is Block with critical risk.
    pub block_critical_threshold: u16,
    /// Score at or above which the verdict is Block with high risk.
    pub block_threshold: u16,
    /// Score at or above which the verdict is Challenge.
    pub challenge_threshold: u16,
    /// Cap on how many recent failures contribute to the score, so a long
    /// failure history cannot overflow the arithmetic.
    pub max_counted_failures: u32,
    /// Upper bound on an external reputation lookup before falling open to a
    /// neutral score.
    pub reputation_timeout: std::time::Duration,
    /// Reputation score at or above which an address counts as flagged.
    pub reputation_flag_threshold: u16,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            weights: ThreatWeights::default(),
            block_critical_threshold: 200,
            block_threshold: 150,
            challenge_threshold: 100,
            max_counted_failures: 20,
            reputation_timeout: std::time::Duration::from_millis(300),
            reputation_flag_threshold: 50,
        }
    }
}

impl ThreatConfig {
    pub fn with_weights(mut self, weights: ThreatWeights) -> Self {
        self.weights = weights;
        self
    }
}

/// Configuration for multi-factor verification.
#[derive(Debug, Clone)]
pub struct MfaConfig {
    /// Issuer label embedded in otpauth enrollment URIs.
    pub issuer: String,
    /// Number of single-use backup codes generated at enrollment.
    pub backup_code_count: usize,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            issuer: "vigil".to_string(),
            backup_code_count: 10,
        }
    }
}

impl MfaConfig {
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// Lifetime configuration for issued sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The duration until an issued session expires.
    pub expires_in: Duration,
    /// Tokens validated after this much of their life has elapsed get a
    /// re-signed replacement attached, refreshing expiry without requiring
    /// re-authentication.
    pub reissue_after: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires_in: Duration::days(30),
            reissue_after: Duration::hours(24),
        }
    }
}
