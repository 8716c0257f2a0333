//! # Vigil
//!
//! Vigil is an authentication security core: the decision engine that sits
//! behind a login endpoint and decides whether a credential-presentation
//! attempt succeeds, is challenged, or is blocked. It is not a web framework
//! integration or an identity-provider protocol; it is the policy layer you
//! wire your own handlers and storage to.
//!
//! An inbound authentication request flows through a fixed pipeline:
//!
//! rate limiter → threat scorer → lockout check → credential verifier →
//! MFA decision → session issue
//!
//! Each stage can short-circuit with a terminal [`AuthResult`]. Internal
//! detail (threat scores, counter state) goes to the audit sinks and is never
//! surfaced to callers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use vigil::{AuthRequest, AuthResult, Vigil};
//! use vigil_storage_memory::MemoryRepositoryProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repositories = Arc::new(MemoryRepositoryProvider::new());
//!     let vigil = Vigil::builder(repositories).build();
//!
//!     vigil.register("user@example.com", "correct horse battery staple").await?;
//!
//!     let result = vigil
//!         .authenticate(AuthRequest::new("user@example.com", "correct horse battery staple"))
//!         .await?;
//!
//!     match result {
//!         AuthResult::Success { token } => println!("session: {token}"),
//!         other => println!("not authenticated: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use vigil_core::{
    account::MfaState,
    crypto::generate_secure_token,
    repositories::AccountRepository,
    repositories::{AccountRepositoryAdapter, AttemptLogAdapter, RevocationStoreAdapter},
    services::{
        CredentialVerifier, LockoutService, MfaService, RateAction, RateDecision, SessionService,
        SlidingWindowRateLimiter, ThreatScorer, Verdict,
    },
};

/// Re-export core types from vigil_core
///
/// These types are commonly used when working with the Vigil API.
pub use vigil_core::{
    Account, AccountId, AttemptOrigin, AuditEvent, AuditLog, AuditSink, Error, FailureReason,
    JwtAlgorithm, JwtConfig, LockoutConfig, LockoutState, MfaConfig, MfaEnrollment, NewAccount,
    RateLimitConfig, RepositoryProvider, ReputationLookup, SessionClaims, SessionConfig,
    SessionToken, ThreatConfig, ThreatSignals, TracingAuditSink, UnlockReason, ValidatedSession,
    error::{AuthError, MfaError, SessionError, StorageError},
};

/// Re-export storage backends
#[cfg(feature = "memory")]
pub use vigil_storage_memory::MemoryRepositoryProvider;

/// One authentication request presented to the pipeline.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Login identifier, typically an email address.
    pub identifier: String,
    /// The presented secret.
    pub password: String,
    /// Time-based code, if the caller collected one.
    pub mfa_code: Option<String>,
    /// Single-use backup code, if the caller collected one.
    pub backup_code: Option<String>,
    /// Context signals for threat scoring.
    pub signals: ThreatSignals,
}

impl AuthRequest {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
            mfa_code: None,
            backup_code: None,
            signals: ThreatSignals::default(),
        }
    }

    pub fn with_mfa_code(mut self, code: impl Into<String>) -> Self {
        self.mfa_code = Some(code.into());
        self
    }

    pub fn with_backup_code(mut self, code: impl Into<String>) -> Self {
        self.backup_code = Some(code.into());
        self
    }

    pub fn with_signals(mut self, signals: ThreatSignals) -> Self {
        self.signals = signals;
        self
    }
}

/// Why an attempt was challenged instead of allowed or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeReason {
    /// The account requires a second factor and none was presented.
    MfaCodeRequired,
    /// The threat scorer requires step-up verification, but the account has
    /// no second factor enrolled to satisfy it.
    StepUpVerification,
}

/// Why an attempt was blocked before credentials were even considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Too many attempts inside the rate window.
    RateLimited { retry_after_seconds: i64 },
    /// The account is locked out until the given instant.
    AccountLocked { until: DateTime<Utc> },
    /// The threat scorer blocked the attempt. Deliberately carries no
    /// detail; the full assessment goes to the audit sinks only.
    ThreatBlocked,
}

/// Terminal outcome of one pass through the authentication pipeline.
///
/// Policy failures are values, not errors: `Err` from
/// [`Vigil::authenticate`] means the engine itself could not run
/// (storage down, malformed stored state), never "wrong password".
#[derive(Debug, Clone)]
pub enum AuthResult {
    /// Fully authenticated; a session token was issued.
    Success { token: SessionToken },
    /// More proof is required before a decision can be made.
    Challenge { reason: ChallengeReason },
    /// Refused before credential evaluation.
    Blocked { reason: BlockReason },
    /// Credentials or second factor did not verify.
    Failure { reason: FailureReason },
}

impl AuthResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthResult::Success { .. })
    }
}

/// What the MFA stage should do with a request, as a pure function of four
/// flags. Kept as an explicit table so every combination is enumerable in
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MfaDecision {
    /// No second factor involved; continue to session issue.
    Proceed,
    VerifyTotp,
    VerifyBackupCode,
    CodeRequired,
    StepUpRequired,
}

fn mfa_decision(enabled: bool, challenged: bool, has_totp: bool, has_backup: bool) -> MfaDecision {
    match (enabled, challenged, has_totp, has_backup) {
        (false, false, _, _) => MfaDecision::Proceed,
        (false, true, _, _) => MfaDecision::StepUpRequired,
        // A presented TOTP code wins over a presented backup code
        (true, _, true, _) => MfaDecision::VerifyTotp,
        (true, _, false, true) => MfaDecision::VerifyBackupCode,
        (true, _, false, false) => MfaDecision::CodeRequired,
    }
}

/// Builder for [`Vigil`]: repository provider plus tuning knobs.
pub struct VigilBuilder<R: RepositoryProvider> {
    repositories: Arc<R>,
    jwt: Option<JwtConfig>,
    rate_limit: RateLimitConfig,
    lockout: LockoutConfig,
    threat: ThreatConfig,
    mfa: MfaConfig,
    session: SessionConfig,
    reputation: Option<Arc<dyn ReputationLookup>>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl<R: RepositoryProvider> VigilBuilder<R> {
    pub fn new(repositories: Arc<R>) -> Self {
        Self {
            repositories,
            jwt: None,
            rate_limit: RateLimitConfig::default(),
            lockout: LockoutConfig::default(),
            threat: ThreatConfig::default(),
            mfa: MfaConfig::default(),
            session: SessionConfig::default(),
            reputation: None,
            sinks: Vec::new(),
        }
    }

    /// Set the JWT signing configuration. Without this, a random HS256
    /// secret is generated per process and sessions do not survive restarts.
    pub fn with_jwt_config(mut self, jwt: JwtConfig) -> Self {
        self.jwt = Some(jwt);
        self
    }

    pub fn with_rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    pub fn with_lockout_config(mut self, config: LockoutConfig) -> Self {
        self.lockout = config;
        self
    }

    pub fn with_threat_config(mut self, config: ThreatConfig) -> Self {
        self.threat = config;
        self
    }

    pub fn with_mfa_config(mut self, config: MfaConfig) -> Self {
        self.mfa = config;
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Attach an external address-reputation provider. Lookups run under the
    /// threat config's timeout and fail open to a neutral score.
    pub fn with_reputation_lookup(mut self, lookup: Arc<dyn ReputationLookup>) -> Self {
        self.reputation = Some(lookup);
        self
    }

    /// Register an audit sink to receive every emitted security event.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Vigil<R> {
        let accounts = Arc::new(AccountRepositoryAdapter::new(self.repositories.clone()));
        let attempts = Arc::new(AttemptLogAdapter::new(self.repositories.clone()));
        let revocations = Arc::new(RevocationStoreAdapter::new(self.repositories.clone()));

        let audit = AuditLog::with_sinks(self.sinks);
        let jwt = self
            .jwt
            .unwrap_or_else(|| JwtConfig::new_hs256(generate_secure_token().into_bytes()));

        Vigil {
            repositories: self.repositories,
            accounts: accounts.clone(),
            credentials: CredentialVerifier::new(),
            rate_limiter: SlidingWindowRateLimiter::new(self.rate_limit),
            threat_scorer: ThreatScorer::new(self.threat),
            lockout: LockoutService::new(
                accounts.clone(),
                attempts,
                self.lockout,
                audit.clone(),
            ),
            mfa: MfaService::new(accounts, self.mfa, audit.clone()),
            sessions: SessionService::new(revocations, jwt, self.session, audit.clone()),
            reputation: self.reputation,
            audit,
        }
    }
}

/// The authentication decision engine, wired over a repository provider.
///
/// All state lives behind the repository traits; `Vigil` itself is cheap to
/// share behind an `Arc` and safe to call from many tasks concurrently.
pub struct Vigil<R: RepositoryProvider> {
    repositories: Arc<R>,
    accounts: Arc<AccountRepositoryAdapter<R>>,
    credentials: CredentialVerifier,
    rate_limiter: SlidingWindowRateLimiter,
    threat_scorer: ThreatScorer,
    lockout: LockoutService<AccountRepositoryAdapter<R>, AttemptLogAdapter<R>>,
    mfa: MfaService<AccountRepositoryAdapter<R>>,
    sessions: SessionService<RevocationStoreAdapter<R>>,
    reputation: Option<Arc<dyn ReputationLookup>>,
    audit: AuditLog,
}

impl<R: RepositoryProvider> Vigil<R> {
    /// Start configuring an engine over a repository provider.
    pub fn builder(repositories: Arc<R>) -> VigilBuilder<R> {
        VigilBuilder::new(repositories)
    }

    /// Build an engine with default configuration.
    pub fn new(repositories: Arc<R>) -> Self {
        VigilBuilder::new(repositories).build()
    }

    /// Health check for all repositories.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Register an additional audit sink after construction.
    pub async fn register_audit_sink(&self, sink: Arc<dyn AuditSink>) {
        self.audit.register(sink).await;
    }

    /// Create an account with an argon2-hashed secret.
    pub async fn register(&self, identifier: &str, password: &str) -> Result<Account, Error> {
        let password_hash = self.credentials.hash(password);
        let new_account = NewAccount::new(identifier, Some(password_hash));

        match self.accounts.create(&new_account).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "Account registered");
                Ok(account)
            }
            Err(Error::Storage(StorageError::Constraint(_))) => {
                Err(AuthError::AccountAlreadyExists.into())
            }
            Err(e) => Err(e.into_unavailable()),
        }
    }

    /// Run one authentication attempt through the full pipeline.
    ///
    /// Policy outcomes come back as [`AuthResult`]; `Err` is reserved for
    /// engine faults, with transient storage failures collapsed to
    /// [`Error::ServiceUnavailable`] (fail closed, no internal retry).
    pub async fn authenticate(&self, request: AuthRequest) -> Result<AuthResult, Error> {
        let now = Utc::now();
        let identifier = request.identifier.as_str();
        let origin = AttemptOrigin {
            ip_address: request.signals.ip_address.clone(),
            user_agent: request.signals.user_agent.clone(),
        };

        // Rate limiter
        if let RateDecision::Limited {
            retry_after_seconds,
        } = self.rate_limiter.check_at(RateAction::Login, identifier, now)
        {
            self.emit_rate_limited(identifier, RateAction::Login, retry_after_seconds, now)
                .await;
            return Ok(AuthResult::Blocked {
                reason: BlockReason::RateLimited {
                    retry_after_seconds,
                },
            });
        }

        // Threat scorer. Recent-failure count is taken from the attempt log;
        // callers can only raise it via the signals, never lower it.
        let mut signals = request.signals.clone();
        let recent = self
            .lockout
            .recent_failures(identifier, now)
            .await
            .map_err(Error::into_unavailable)?;
        signals.recent_failures = signals.recent_failures.max(recent);

        let assessment = self
            .threat_scorer
            .assess(&signals, self.reputation.as_deref())
            .await;

        if assessment.verdict != Verdict::Allow {
            self.audit
                .emit(&AuditEvent::ThreatAssessed {
                    identifier: identifier.to_string(),
                    score: assessment.score,
                    verdict: assessment.verdict.as_str().to_string(),
                    reasons: assessment.reasons.clone(),
                    ip_address: signals.ip_address.clone(),
                    timestamp: now,
                })
                .await;
        }
        if assessment.verdict == Verdict::Block {
            return Ok(AuthResult::Blocked {
                reason: BlockReason::ThreatBlocked,
            });
        }
        let challenged = assessment.verdict == Verdict::Challenge;

        // Lockout gate
        let account = self
            .accounts
            .get_by_identifier(identifier)
            .await
            .map_err(Error::into_unavailable)?;

        if let Some(account) = &account {
            let status = self
                .lockout
                .status_at(account, now)
                .await
                .map_err(Error::into_unavailable)?;
            if let LockoutState::Locked { until } = status.state {
                return Ok(AuthResult::Blocked {
                    reason: BlockReason::AccountLocked { until },
                });
            }
        }

        // Credential verification. Unknown accounts take the same argon2
        // cost as a mismatch, and both yield the same outcome.
        let stored_hash = account.as_ref().and_then(|a| a.password_hash.as_deref());
        if !self.credentials.verify(stored_hash, &request.password) {
            self.lockout
                .record_failure(
                    account.as_ref(),
                    identifier,
                    FailureReason::InvalidCredentials,
                    &origin,
                )
                .await
                .map_err(Error::into_unavailable)?;
            return Ok(AuthResult::Failure {
                reason: FailureReason::InvalidCredentials,
            });
        }

        let Some(account) = account else {
            // verify() cannot pass without a stored hash
            return Ok(AuthResult::Failure {
                reason: FailureReason::InvalidCredentials,
            });
        };

        if !account.is_active() {
            self.lockout
                .record_failure(
                    Some(&account),
                    identifier,
                    FailureReason::AccountDisabled,
                    &origin,
                )
                .await
                .map_err(Error::into_unavailable)?;
            return Ok(AuthResult::Failure {
                reason: FailureReason::AccountDisabled,
            });
        }

        // MFA decision table
        match mfa_decision(
            account.mfa.is_enabled(),
            challenged,
            request.mfa_code.is_some(),
            request.backup_code.is_some(),
        ) {
            MfaDecision::Proceed => {}
            MfaDecision::StepUpRequired => {
                return Ok(AuthResult::Challenge {
                    reason: ChallengeReason::StepUpVerification,
                });
            }
            MfaDecision::CodeRequired => {
                return Ok(AuthResult::Challenge {
                    reason: ChallengeReason::MfaCodeRequired,
                });
            }
            decision @ (MfaDecision::VerifyTotp | MfaDecision::VerifyBackupCode) => {
                if let RateDecision::Limited {
                    retry_after_seconds,
                } = self
                    .rate_limiter
                    .check_at(RateAction::MfaVerify, identifier, now)
                {
                    self.emit_rate_limited(
                        identifier,
                        RateAction::MfaVerify,
                        retry_after_seconds,
                        now,
                    )
                    .await;
                    return Ok(AuthResult::Blocked {
                        reason: BlockReason::RateLimited {
                            retry_after_seconds,
                        },
                    });
                }

                if let Some(failure) = self
                    .verify_second_factor(&account, &request, decision, now, &origin)
                    .await?
                {
                    return Ok(AuthResult::Failure { reason: failure });
                }
            }
        }

        // Success: supersede failures, clear any stored lock, issue a session
        self.lockout
            .record_success(&account, &origin)
            .await
            .map_err(Error::into_unavailable)?;

        let token = self
            .sessions
            .issue(&account.id)
            .await
            .map_err(Error::into_unavailable)?;

        Ok(AuthResult::Success { token })
    }

    /// Verify the presented second factor. Returns the failure reason if it
    /// did not verify, `None` if it did.
    async fn verify_second_factor(
        &self,
        account: &Account,
        request: &AuthRequest,
        decision: MfaDecision,
        now: DateTime<Utc>,
        origin: &AttemptOrigin,
    ) -> Result<Option<FailureReason>, Error> {
        let MfaState::Enabled { secret, .. } = &account.mfa else {
            return Err(MfaError::NotEnrolled.into());
        };

        let (verified, reason) = match decision {
            MfaDecision::VerifyTotp => {
                let code = request.mfa_code.as_deref().unwrap_or_default();
                (
                    self.mfa.verify_totp(secret, code, now)?,
                    FailureReason::InvalidMfaCode,
                )
            }
            MfaDecision::VerifyBackupCode => {
                let code = request.backup_code.as_deref().unwrap_or_default();
                (
                    self.mfa
                        .consume_backup_code(account, code)
                        .await
                        .map_err(Error::into_unavailable)?,
                    FailureReason::InvalidBackupCode,
                )
            }
            _ => return Ok(None),
        };

        if verified {
            return Ok(None);
        }

        self.lockout
            .record_failure(Some(account), &account.identifier, reason, origin)
            .await
            .map_err(Error::into_unavailable)?;
        Ok(Some(reason))
    }

    async fn emit_rate_limited(
        &self,
        identifier: &str,
        action: RateAction,
        retry_after_seconds: i64,
        now: DateTime<Utc>,
    ) {
        self.audit
            .emit(&AuditEvent::RateLimited {
                identifier: identifier.to_string(),
                action: action.as_str().to_string(),
                retry_after_seconds,
                timestamp: now,
            })
            .await;
    }

    /// Look up an account by its login identifier.
    pub async fn get_account(&self, identifier: &str) -> Result<Account, Error> {
        self.accounts
            .get_by_identifier(identifier)
            .await?
            .ok_or_else(|| StorageError::NotFound.into())
    }

    /// Begin MFA enrollment: generate a secret and backup codes, stored
    /// pending until [`enable_mfa`](Self::enable_mfa) proves possession.
    pub async fn setup_mfa(&self, identifier: &str) -> Result<MfaEnrollment, Error> {
        let account = self.get_account(identifier).await?;
        self.mfa.setup(&account).await
    }

    /// Complete MFA enrollment with one valid current code.
    pub async fn enable_mfa(&self, identifier: &str, code: &str) -> Result<(), Error> {
        let account = self.get_account(identifier).await?;
        self.mfa.enable(&account, code, Utc::now()).await
    }

    /// Remove any MFA enrollment, pending or enabled.
    pub async fn disable_mfa(&self, identifier: &str) -> Result<(), Error> {
        let account = self.get_account(identifier).await?;
        self.mfa.disable(&account).await
    }

    /// Replace the unused backup code set, returning the new plaintext codes.
    pub async fn regenerate_backup_codes(&self, identifier: &str) -> Result<Vec<String>, Error> {
        let account = self.get_account(identifier).await?;
        self.mfa.regenerate_backup_codes(&account).await
    }

    /// Validate a session token: signature, expiry, revocation ledger.
    pub async fn validate_session(&self, token: &SessionToken) -> Result<ValidatedSession, Error> {
        self.sessions.validate(token).await
    }

    /// Revoke a session token. Takes effect for all subsequent validations.
    pub async fn revoke_session(&self, token: &SessionToken) -> Result<(), Error> {
        self.sessions.revoke(token).await
    }

    /// Drop revocation entries for sessions that have expired on their own.
    pub async fn prune_revocations(&self) -> Result<u64, Error> {
        self.sessions.prune_revocations(Utc::now()).await
    }

    /// Administratively clear an account's lockout.
    ///
    /// Returns `true` if the account was effectively locked.
    pub async fn unlock_account(&self, identifier: &str) -> Result<bool, Error> {
        let account = self.get_account(identifier).await?;
        self.lockout.unlock(&account).await
    }
}
