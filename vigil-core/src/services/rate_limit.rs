//! Sliding-window rate limiting
//!
//! Counters are kept in a single concurrent map keyed by
//! `(action, identifier)` rather than ad hoc globals, so the layout stays
//! portable to a distributed store. Each check prunes expired timestamps,
//! then either records the attempt and allows it, or denies it without
//! recording.
//!
//! All mutation for one key happens under that key's map entry guard, so two
//! concurrent checks cannot both observe `count == max - 1` and both pass.
//!
//! Policy note: this limiter guards authentication actions, so the pipeline
//! treats it fail-closed: if counter state were ever unavailable the
//! attempt is denied, never waved through.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Action types with independent rate budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAction {
    /// Primary credential presentation.
    Login,
    /// TOTP / backup code verification.
    MfaVerify,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateAction::Login => "login",
            RateAction::MfaVerify => "mfa_verify",
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The attempt was recorded and may proceed.
    Allowed {
        /// Attempts left in the window after this one.
        remaining: u32,
    },
    /// The attempt was denied and not recorded.
    Limited {
        /// Seconds until the oldest counted attempt falls out of the window.
        retry_after_seconds: i64,
    },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Concurrent sliding-window rate limiter.
///
/// Entries are created lazily on first attempt and pruned lazily on each
/// check; nothing sweeps the map in the background.
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Vec<DateTime<Utc>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and record an attempt for `(action, identifier)` at `now`.
    ///
    /// Taking `now` explicitly keeps the window arithmetic testable without
    /// a clock abstraction.
    pub fn check_at(
        &self,
        action: RateAction,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> RateDecision {
        let key = format!("{}:{identifier}", action.as_str());
        let cutoff = now - self.config.window;

        // The entry guard holds the shard lock for this key, serializing
        // the prune-count-record sequence against concurrent checks.
        let mut stamps = self.windows.entry(key).or_default();
        stamps.retain(|t| *t > cutoff);

        if (stamps.len() as u32) < self.config.max_attempts {
            stamps.push(now);
            RateDecision::Allowed {
                remaining: self.config.max_attempts - stamps.len() as u32,
            }
        } else {
            // Denied attempts are not recorded; a client backing off is not
            // pushed further out by its own retries.
            let oldest = stamps.iter().min().copied().unwrap_or(now);
            let retry_after_seconds = ((oldest + self.config.window) - now).num_seconds().max(1);
            RateDecision::Limited {
                retry_after_seconds,
            }
        }
    }

    /// Check and record an attempt at the current time.
    pub fn check(&self, action: RateAction, identifier: &str) -> RateDecision {
        self.check_at(action, identifier, Utc::now())
    }

    /// Drop all recorded attempts for `(action, identifier)`.
    pub fn reset(&self, action: RateAction, identifier: &str) {
        let key = format!("{}:{identifier}", action.as_str());
        self.windows.remove(&key);
    }
}
