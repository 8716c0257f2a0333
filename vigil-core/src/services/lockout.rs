//! Account lockout state machine
//!
//! Two states, `Active` and `Locked`, driven by the failure count within a
//! trailing window. A triggered lock is stored as an absolute expiry
//! timestamp (not a duration-since-lock) so repeated reads cannot drift.
//!
//! The `Locked -> Active` transition is lazy: no background job flips the
//! state. Every reader goes through [`effective_lockout`], which treats an
//! expired expiry as `Active`, and the next successful authentication clears
//! the stored field explicitly.
//!
//! Failures are counted from the append-only attempt log, filtered to
//! records after the last success. A success therefore supersedes earlier
//! failures without deleting them, preserving the audit trail.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::Account,
    attempt::{AttemptOrigin, AttemptRecord, FailureReason},
    config::LockoutConfig,
    events::{AuditEvent, AuditLog, UnlockReason},
    repositories::{AccountRepository, AttemptLog},
};

/// Effective lockout state at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Active,
    Locked { until: DateTime<Utc> },
}

impl LockoutState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutState::Locked { .. })
    }
}

/// Pure state function: how a stored `locked_until` field reads at `now`.
///
/// An expiry at or before `now` reads as `Active`; callers never observe a
/// locked account whose expiry has passed.
pub fn effective_lockout(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> LockoutState {
    match locked_until {
        Some(until) if until > now => LockoutState::Locked { until },
        _ => LockoutState::Active,
    }
}

/// Snapshot of an identifier's lockout standing.
#[derive(Debug, Clone)]
pub struct LockoutStatus {
    pub identifier: String,
    /// Failures counted in the current window (since the last success).
    pub failed_attempts: u32,
    pub state: LockoutState,
}

impl LockoutStatus {
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    /// Seconds until the lock expires, if locked.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.state {
            LockoutState::Locked { until } => Some((until - now).num_seconds().max(0)),
            LockoutState::Active => None,
        }
    }
}

/// Service coordinating the attempt log and account lockout fields.
///
/// Thread-safe; shared across tasks via the `Arc`'d repositories.
pub struct LockoutService<A: AccountRepository, L: AttemptLog> {
    accounts: Arc<A>,
    attempts: Arc<L>,
    config: LockoutConfig,
    audit: AuditLog,
}

impl<A: AccountRepository, L: AttemptLog> LockoutService<A, L> {
    pub fn new(accounts: Arc<A>, attempts: Arc<L>, config: LockoutConfig, audit: AuditLog) -> Self {
        Self {
            accounts,
            attempts,
            config,
            audit,
        }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Start of the failure-counting window at `now`: the trailing window,
    /// shortened to the last success if one is more recent.
    async fn window_start(&self, identifier: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
        let window_start = now - self.config.window;
        match self.attempts.last_success_at(identifier).await? {
            Some(last_success) if last_success > window_start => Ok(last_success),
            _ => Ok(window_start),
        }
    }

    /// Count of lockout-relevant failures for an identifier at `now`.
    pub async fn recent_failures(&self, identifier: &str, now: DateTime<Utc>) -> Result<u32, Error> {
        let since = self.window_start(identifier, now).await?;
        self.attempts.count_failures_since(identifier, since).await
    }

    /// Current lockout standing for an account at `now`.
    ///
    /// The gate reads the stored absolute expiry through
    /// [`effective_lockout`]; the failure count is reported alongside for
    /// audit purposes.
    pub async fn status_at(&self, account: &Account, now: DateTime<Utc>) -> Result<LockoutStatus, Error> {
        if !self.config.enabled {
            return Ok(LockoutStatus {
                identifier: account.identifier.clone(),
                failed_attempts: 0,
                state: LockoutState::Active,
            });
        }

        Ok(LockoutStatus {
            identifier: account.identifier.clone(),
            failed_attempts: self.recent_failures(&account.identifier, now).await?,
            state: effective_lockout(account.locked_until, now),
        })
    }

    /// Record a failed attempt and apply the `Active -> Locked` transition
    /// if the failure count reaches the threshold.
    ///
    /// The attempt is recorded even for unknown identifiers, so probing
    /// non-existent accounts leaves the same trail as probing real ones.
    pub async fn record_failure(
        &self,
        account: Option<&Account>,
        identifier: &str,
        reason: FailureReason,
        origin: &AttemptOrigin,
    ) -> Result<LockoutStatus, Error> {
        let record = AttemptRecord::failure(identifier, reason, origin.clone());
        let now = record.attempted_at;
        self.attempts.append(&record).await?;

        if !self.config.enabled {
            return Ok(LockoutStatus {
                identifier: identifier.to_string(),
                failed_attempts: 0,
                state: LockoutState::Active,
            });
        }

        let failed_attempts = self.recent_failures(identifier, now).await?;

        self.audit
            .emit(&AuditEvent::AttemptFailed {
                identifier: identifier.to_string(),
                reason,
                failed_attempts,
                ip_address: origin.ip_address.clone(),
                timestamp: now,
            })
            .await;

        let mut state = match account {
            Some(account) => effective_lockout(account.locked_until, now),
            None => LockoutState::Active,
        };

        // Transition only when the threshold is met and the account exists
        // and is not already locked.
        if !state.is_locked() && failed_attempts >= self.config.max_failed_attempts {
            if let Some(account) = account {
                let until = now + self.config.lock_duration;
                self.accounts
                    .update_lockout(&account.id, Some(until))
                    .await?;
                state = LockoutState::Locked { until };

                tracing::warn!(
                    identifier,
                    failed_attempts,
                    locked_until = %until,
                    "Account locked after repeated failures"
                );
                self.audit
                    .emit(&AuditEvent::AccountLocked {
                        identifier: identifier.to_string(),
                        failed_attempts,
                        locked_until: until,
                        ip_address: origin.ip_address.clone(),
                        timestamp: now,
                    })
                    .await;
            }
        }

        Ok(LockoutStatus {
            identifier: identifier.to_string(),
            failed_attempts,
            state,
        })
    }

    /// Record a successful attempt, superseding prior failures and clearing
    /// any stored lock field.
    pub async fn record_success(
        &self,
        account: &Account,
        origin: &AttemptOrigin,
    ) -> Result<(), Error> {
        let record = AttemptRecord::success(&account.identifier, origin.clone());
        self.attempts.append(&record).await?;

        self.audit
            .emit(&AuditEvent::AttemptSucceeded {
                identifier: account.identifier.clone(),
                ip_address: origin.ip_address.clone(),
                timestamp: record.attempted_at,
            })
            .await;

        // Explicitly clear a stored (possibly already expired) lock.
        if account.locked_until.is_some() {
            self.accounts.update_lockout(&account.id, None).await?;
            self.audit
                .emit(&AuditEvent::AccountUnlocked {
                    identifier: account.identifier.clone(),
                    reason: UnlockReason::SuccessfulAuthentication,
                    timestamp: record.attempted_at,
                })
                .await;
        }

        Ok(())
    }

    /// Administratively unlock an account.
    ///
    /// Returns `true` if the account was effectively locked at the time.
    pub async fn unlock(&self, account: &Account) -> Result<bool, Error> {
        let now = Utc::now();
        let was_locked = effective_lockout(account.locked_until, now).is_locked();
        self.accounts.update_lockout(&account.id, None).await?;
        self.audit
            .emit(&AuditEvent::AccountUnlocked {
                identifier: account.identifier.clone(),
                reason: UnlockReason::AdminAction,
                timestamp: now,
            })
            .await;
        Ok(was_locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountId, MfaState, NewAccount};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    struct MockAccountRepository {
        locked_until: Mutex<Option<DateTime<Utc>>>,
    }

    impl MockAccountRepository {
        fn new() -> Self {
            Self {
                locked_until: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl AccountRepository for MockAccountRepository {
        async fn create(&self, _account: &NewAccount) -> Result<Account, Error> {
            unimplemented!("not used by lockout tests")
        }

        async fn get_by_identifier(&self, _identifier: &str) -> Result<Option<Account>, Error> {
            Ok(None)
        }

        async fn update_lockout(
            &self,
            _id: &AccountId,
            locked_until: Option<DateTime<Utc>>,
        ) -> Result<(), Error> {
            *self.locked_until.lock().unwrap() = locked_until;
            Ok(())
        }

        async fn update_mfa_state(&self, _id: &AccountId, _state: MfaState) -> Result<(), Error> {
            Ok(())
        }

        async fn consume_backup_code(
            &self,
            _id: &AccountId,
            _code_hash: &str,
        ) -> Result<bool, Error> {
            Ok(false)
        }
    }

    struct MockAttemptLog {
        records: Mutex<Vec<AttemptRecord>>,
    }

    impl MockAttemptLog {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AttemptLog for MockAttemptLog {
        async fn append(&self, record: &AttemptRecord) -> Result<(), Error> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn count_failures_since(
            &self,
            identifier: &str,
            since: DateTime<Utc>,
        ) -> Result<u32, Error> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| {
                    r.identifier == identifier
                        && r.outcome.is_failure()
                        && r.attempted_at >= since
                })
                .count() as u32)
        }

        async fn last_success_at(&self, identifier: &str) -> Result<Option<DateTime<Utc>>, Error> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.identifier == identifier && !r.outcome.is_failure())
                .map(|r| r.attempted_at)
                .max())
        }
    }

    fn test_account(locked_until: Option<DateTime<Utc>>) -> Account {
        Account {
            id: AccountId::new_random(),
            identifier: "test@example.com".to_string(),
            password_hash: Some("hash".to_string()),
            disabled: false,
            locked_until,
            mfa: MfaState::Disabled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(
        accounts: Arc<MockAccountRepository>,
        attempts: Arc<MockAttemptLog>,
        config: LockoutConfig,
    ) -> LockoutService<MockAccountRepository, MockAttemptLog> {
        LockoutService::new(accounts, attempts, config, AuditLog::default())
    }

    #[test]
    fn test_effective_lockout_is_lazy() {
        let now = Utc::now();

        assert_eq!(effective_lockout(None, now), LockoutState::Active);

        // Expired lock reads as Active without any write
        assert_eq!(
            effective_lockout(Some(now - Duration::minutes(1)), now),
            LockoutState::Active
        );

        let until = now + Duration::minutes(30);
        assert_eq!(
            effective_lockout(Some(until), now),
            LockoutState::Locked { until }
        );
    }

    #[tokio::test]
    async fn test_lock_after_threshold() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts.clone(), attempts, LockoutConfig::default());
        let account = test_account(None);

        for i in 0..4 {
            let status = service
                .record_failure(
                    Some(&account),
                    &account.identifier,
                    FailureReason::InvalidCredentials,
                    &AttemptOrigin::default(),
                )
                .await
                .unwrap();
            assert!(!status.is_locked(), "attempt {} should not lock", i + 1);
        }

        // 5th failure triggers the lock
        let status = service
            .record_failure(
                Some(&account),
                &account.identifier,
                FailureReason::InvalidCredentials,
                &AttemptOrigin::default(),
            )
            .await
            .unwrap();

        assert!(status.is_locked());
        assert_eq!(status.failed_attempts, 5);
        assert!(accounts.locked_until.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_expiry_is_absolute() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let config = LockoutConfig {
            max_failed_attempts: 1,
            ..LockoutConfig::default()
        };
        let service = service(accounts.clone(), attempts, config.clone());
        let account = test_account(None);

        let before = Utc::now();
        let status = service
            .record_failure(
                Some(&account),
                &account.identifier,
                FailureReason::InvalidCredentials,
                &AttemptOrigin::default(),
            )
            .await
            .unwrap();
        let after = Utc::now();

        match status.state {
            LockoutState::Locked { until } => {
                assert!(until >= before + config.lock_duration);
                assert!(until <= after + config.lock_duration);
            }
            LockoutState::Active => panic!("expected locked"),
        }
    }

    #[tokio::test]
    async fn test_success_supersedes_prior_failures() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts, attempts.clone(), LockoutConfig::default());
        let account = test_account(None);

        for _ in 0..3 {
            service
                .record_failure(
                    Some(&account),
                    &account.identifier,
                    FailureReason::InvalidCredentials,
                    &AttemptOrigin::default(),
                )
                .await
                .unwrap();
        }

        service
            .record_success(&account, &AttemptOrigin::default())
            .await
            .unwrap();

        // History is preserved but the failure count restarts
        assert_eq!(attempts.records.lock().unwrap().len(), 4);
        let count = service
            .recent_failures(&account.identifier, Utc::now())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_success_clears_stored_lock() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts.clone(), attempts, LockoutConfig::default());

        // Lock has naturally expired but the field is still set
        let account = test_account(Some(Utc::now() - Duration::minutes(1)));
        *accounts.locked_until.lock().unwrap() = account.locked_until;

        service
            .record_success(&account, &AttemptOrigin::default())
            .await
            .unwrap();

        assert!(accounts.locked_until.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_reads_expired_lock_as_active() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts, attempts, LockoutConfig::default());

        let account = test_account(Some(Utc::now() - Duration::seconds(1)));
        let status = service.status_at(&account, Utc::now()).await.unwrap();
        assert!(!status.is_locked());
    }

    #[tokio::test]
    async fn test_disabled_config_never_locks() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts.clone(), attempts, LockoutConfig::disabled());
        let account = test_account(None);

        for _ in 0..10 {
            let status = service
                .record_failure(
                    Some(&account),
                    &account.identifier,
                    FailureReason::InvalidCredentials,
                    &AttemptOrigin::default(),
                )
                .await
                .unwrap();
            assert!(!status.is_locked());
        }
        assert!(accounts.locked_until.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_identifier_recorded_without_lock_write() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts.clone(), attempts.clone(), LockoutConfig::default());

        for _ in 0..6 {
            service
                .record_failure(
                    None,
                    "ghost@example.com",
                    FailureReason::InvalidCredentials,
                    &AttemptOrigin::default(),
                )
                .await
                .unwrap();
        }

        // Attempts leave a trail but no account exists to lock
        assert_eq!(attempts.records.lock().unwrap().len(), 6);
        assert!(accounts.locked_until.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unlock_reports_prior_state() {
        let accounts = Arc::new(MockAccountRepository::new());
        let attempts = Arc::new(MockAttemptLog::new());
        let service = service(accounts.clone(), attempts, LockoutConfig::default());

        let locked = test_account(Some(Utc::now() + Duration::minutes(30)));
        assert!(service.unlock(&locked).await.unwrap());
        assert!(accounts.locked_until.lock().unwrap().is_none());

        let unlocked = test_account(None);
        assert!(!service.unlock(&unlocked).await.unwrap());
    }
}
