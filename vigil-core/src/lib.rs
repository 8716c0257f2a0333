//! Core functionality for the vigil project
//!
//! This crate holds the domain model and services of the authentication
//! security core: accounts, attempt records, threat assessment, lockout,
//! MFA, sessions, and the repository traits that storage backends
//! implement.
//!
//! It is designed to be used through a storage backend crate and the
//! top-level `vigil` facade rather than directly by application code.

pub mod account;
pub mod attempt;
pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod repositories;
pub mod services;
pub mod session;

pub use account::{Account, AccountId, MfaState, NewAccount};
pub use attempt::{AttemptOrigin, AttemptOutcome, AttemptRecord, FailureReason};
pub use config::{
    LockoutConfig, MfaConfig, RateLimitConfig, SessionConfig, ThreatConfig, ThreatWeights,
};
pub use error::Error;
pub use events::{AuditEvent, AuditLog, AuditSink, TracingAuditSink, UnlockReason};
pub use repositories::{
    AccountRepository, AccountRepositoryAdapter, AccountRepositoryProvider, AttemptLog,
    AttemptLogAdapter, AttemptLogProvider, RepositoryProvider, RevocationStore,
    RevocationStoreAdapter, RevocationStoreProvider,
};
pub use services::{
    CredentialVerifier, LockoutService, LockoutState, LockoutStatus, MfaEnrollment, MfaService,
    RateAction, RateDecision, ReputationLookup, RiskLevel, SessionService, SlidingWindowRateLimiter,
    ThreatAssessment, ThreatScorer, ThreatSignals, ValidatedSession, Verdict,
};
pub use session::{JwtAlgorithm, JwtConfig, SessionClaims, SessionToken};
