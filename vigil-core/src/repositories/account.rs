//! Repository trait for account state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, MfaState, NewAccount},
};

/// Repository for account records.
///
/// # Security considerations
///
/// - `get_by_identifier` returning `None` must not be observable through
///   timing differences at the API surface; the credential verifier runs a
///   dummy hash comparison for missing accounts.
/// - `consume_backup_code` must be an atomic check-and-remove: two
///   concurrent redemptions of the same code must not both succeed.
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Create a new account.
    ///
    /// Returns a constraint violation if the identifier is already taken.
    async fn create(&self, account: &NewAccount) -> Result<Account, Error>;

    /// Look up an account by its login identifier.
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<Account>, Error>;

    /// Set or clear the absolute lockout expiry for an account.
    ///
    /// `Some(expiry)` locks the account until that instant; `None` clears
    /// the lock. May be a no-op for unknown accounts, which is intentional
    /// to prevent enumeration.
    async fn update_lockout(
        &self,
        id: &AccountId,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), Error>;

    /// Replace the account's multi-factor enrollment state.
    async fn update_mfa_state(&self, id: &AccountId, state: MfaState) -> Result<(), Error>;

    /// Atomically consume a backup code by its hash.
    ///
    /// The check-and-remove must happen as one operation: if the hash is
    /// present in the account's unused code set it is removed and `true` is
    /// returned; otherwise `false`. Exactly one of any number of concurrent
    /// calls presenting the same hash may succeed.
    async fn consume_backup_code(&self, id: &AccountId, code_hash: &str) -> Result<bool, Error>;
}
