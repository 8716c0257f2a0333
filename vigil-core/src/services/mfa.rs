//! Multi-factor verification
//!
//! Time-based one-time codes (RFC 6238: SHA1, 6 digits, 30-second step) with
//! a ±1 step tolerance for clock skew, plus single-use backup codes.
//!
//! Enrollment is deliberately two-phase. `setup` generates a secret and
//! backup codes but stores them **pending**; only `enable`, presented with
//! one valid current code, flips the account to enabled. An account can
//! therefore never be locked behind a secret its owner never proved
//! possession of.
//!
//! Backup codes are stored as SHA256 hashes and consumed through the
//! repository's atomic check-and-remove, so concurrent redemptions of the
//! same code cannot both succeed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::{
    Error,
    account::{Account, MfaState},
    config::MfaConfig,
    crypto::{generate_backup_code, hash_token},
    error::MfaError,
    events::{AuditEvent, AuditLog},
    repositories::AccountRepository,
};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1; // ±1 step
const TOTP_STEP_SECONDS: u64 = 30;

/// Result of starting an enrollment.
///
/// `secret` and `backup_codes` are returned in the clear exactly once, here;
/// only hashes (and the secret needed for future verification) persist.
#[derive(Debug, Clone)]
pub struct MfaEnrollment {
    /// Base32-encoded TOTP secret, for manual entry.
    pub secret: String,
    /// otpauth:// URI for QR provisioning.
    pub otpauth_uri: String,
    /// Plaintext single-use backup codes.
    pub backup_codes: Vec<String>,
}

/// Service for multi-factor enrollment and verification.
pub struct MfaService<A: AccountRepository> {
    accounts: Arc<A>,
    config: MfaConfig,
    audit: AuditLog,
}

impl<A: AccountRepository> MfaService<A> {
    pub fn new(accounts: Arc<A>, config: MfaConfig, audit: AuditLog) -> Self {
        Self {
            accounts,
            config,
            audit,
        }
    }

    pub fn config(&self) -> &MfaConfig {
        &self.config
    }

    fn build_totp(&self, secret: &str, account_label: &str) -> Result<TOTP, Error> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| MfaError::MalformedSecret(format!("{e:?}")))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP_SECONDS,
            secret_bytes,
            Some(self.config.issuer.clone()),
            account_label.to_string(),
        )
        .map_err(|e| MfaError::MalformedSecret(e.to_string()).into())
    }

    /// Check a time-based code against a secret at an explicit instant.
    ///
    /// Accepts codes from the current step and one step either side
    /// (effectively ±30s of drift); anything further is rejected.
    pub fn verify_totp(&self, secret: &str, code: &str, at: DateTime<Utc>) -> Result<bool, Error> {
        let totp = self.build_totp(secret, "account")?;
        Ok(totp.check(code, at.timestamp().max(0) as u64))
    }

    /// Generate a secret and backup codes, stored in the pending state.
    ///
    /// Calling this again before `enable` replaces any previous pending
    /// enrollment.
    pub async fn setup(&self, account: &Account) -> Result<MfaEnrollment, Error> {
        let secret = Secret::generate_secret();
        let encoded = secret.to_encoded().to_string();

        let totp = self.build_totp(&encoded, &account.identifier)?;
        let otpauth_uri = totp.get_url();

        let backup_codes: Vec<String> = (0..self.config.backup_code_count)
            .map(|_| generate_backup_code())
            .collect();
        let backup_code_hashes = backup_codes.iter().map(|c| hash_token(c)).collect();

        self.accounts
            .update_mfa_state(
                &account.id,
                MfaState::Pending {
                    secret: encoded.clone(),
                    backup_code_hashes,
                },
            )
            .await?;

        Ok(MfaEnrollment {
            secret: encoded,
            otpauth_uri,
            backup_codes,
        })
    }

    /// Prove possession of a pending secret and enable MFA.
    ///
    /// An invalid code leaves the pending state untouched.
    pub async fn enable(&self, account: &Account, code: &str, at: DateTime<Utc>) -> Result<(), Error> {
        let (secret, backup_code_hashes) = match &account.mfa {
            MfaState::Pending {
                secret,
                backup_code_hashes,
            } => (secret.clone(), backup_code_hashes.clone()),
            _ => return Err(MfaError::NotPending.into()),
        };

        if !self.verify_totp(&secret, code, at)? {
            return Err(MfaError::InvalidCode.into());
        }

        self.accounts
            .update_mfa_state(
                &account.id,
                MfaState::Enabled {
                    secret,
                    backup_code_hashes,
                },
            )
            .await?;

        self.audit
            .emit(&AuditEvent::MfaEnabled {
                account_id: account.id.to_string(),
                timestamp: Utc::now(),
            })
            .await;

        Ok(())
    }

    /// Remove any multi-factor enrollment (enabled or pending).
    pub async fn disable(&self, account: &Account) -> Result<(), Error> {
        self.accounts
            .update_mfa_state(&account.id, MfaState::Disabled)
            .await?;

        self.audit
            .emit(&AuditEvent::MfaDisabled {
                account_id: account.id.to_string(),
                timestamp: Utc::now(),
            })
            .await;

        Ok(())
    }

    /// Replace the unused backup code set for an enabled account.
    ///
    /// Returns the new plaintext codes; previously issued codes stop
    /// working.
    pub async fn regenerate_backup_codes(&self, account: &Account) -> Result<Vec<String>, Error> {
        let secret = match &account.mfa {
            MfaState::Enabled { secret, .. } => secret.clone(),
            _ => return Err(MfaError::NotEnrolled.into()),
        };

        let backup_codes: Vec<String> = (0..self.config.backup_code_count)
            .map(|_| generate_backup_code())
            .collect();
        let backup_code_hashes = backup_codes.iter().map(|c| hash_token(c)).collect();

        self.accounts
            .update_mfa_state(
                &account.id,
                MfaState::Enabled {
                    secret,
                    backup_code_hashes,
                },
            )
            .await?;

        Ok(backup_codes)
    }

    /// Redeem a single-use backup code.
    ///
    /// The match is case-sensitive and exact. Check-and-remove happens as
    /// one repository operation; of any number of concurrent redemptions of
    /// the same code, exactly one succeeds.
    pub async fn consume_backup_code(&self, account: &Account, code: &str) -> Result<bool, Error> {
        let remaining_before = match &account.mfa {
            MfaState::Enabled {
                backup_code_hashes, ..
            } => backup_code_hashes.len(),
            _ => return Err(MfaError::NotEnrolled.into()),
        };

        let consumed = self
            .accounts
            .consume_backup_code(&account.id, &hash_token(code))
            .await?;

        if consumed {
            self.audit
                .emit(&AuditEvent::BackupCodeConsumed {
                    account_id: account.id.to_string(),
                    remaining: remaining_before.saturating_sub(1),
                    timestamp: Utc::now(),
                })
                .await;
        }

        Ok(consumed)
    }
}
