//! Domain services
//!
//! Each service owns one concern of the authentication pipeline and talks
//! to storage only through the repository traits, so backends swap without
//! touching policy logic.

mod credential;
mod lockout;
mod mfa;
mod rate_limit;
mod session;
mod threat;

pub use credential::CredentialVerifier;
pub use lockout::{LockoutService, LockoutState, LockoutStatus, effective_lockout};
pub use mfa::{MfaEnrollment, MfaService};
pub use rate_limit::{RateAction, RateDecision, SlidingWindowRateLimiter};
pub use session::{SessionService, ValidatedSession};
pub use threat::{
    ReputationLookup, RiskLevel, ThreatAssessment, ThreatScorer, ThreatSignals, Verdict,
};
