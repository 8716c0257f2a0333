//! Account data model
//!
//! Accounts are the subjects of every authentication decision. The core
//! account struct is defined as follows:
//!
//! | Field           | Type               | Description                                              |
//! | --------------- | ------------------ | -------------------------------------------------------- |
//! | `id`            | `AccountId`        | The unique identifier for the account.                   |
//! | `identifier`    | `String`           | The login identifier (typically an email address).       |
//! | `password_hash` | `Option<String>`   | Argon2 hash of the account's secret.                     |
//! | `disabled`      | `bool`             | Whether the account has been administratively disabled.  |
//! | `locked_until`  | `Option<DateTime>` | Absolute lockout expiry, if the account is locked.       |
//! | `mfa`           | `MfaState`         | Multi-factor enrollment state.                           |
//! | `created_at`    | `DateTime`         | The timestamp when the account was created.              |
//! | `updated_at`    | `DateTime`         | The timestamp when the account was last updated.         |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for a specific account.
/// This value should be treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        AccountId(id.to_string())
    }

    pub fn new_random() -> Self {
        AccountId(generate_prefixed_id("acct"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the correct format for an account ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "acct")
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Multi-factor enrollment state for an account.
///
/// Enrollment is a two-step flow: `setup` stores the secret in `Pending`, and
/// only a valid TOTP code presented to `enable` moves it to `Enabled`. This
/// prevents an account from being locked out by a secret the owner never
/// successfully used.
///
/// Backup codes are stored as SHA256 hex hashes, never in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MfaState {
    /// No multi-factor enrollment.
    Disabled,
    /// A secret has been generated but possession has not been proven yet.
    Pending {
        /// Base32-encoded TOTP secret
        secret: String,
        /// SHA256 hashes of the unused single-use backup codes
        backup_code_hashes: Vec<String>,
    },
    /// Multi-factor verification is required for this account.
    Enabled {
        /// Base32-encoded TOTP secret
        secret: String,
        /// SHA256 hashes of the unused single-use backup codes
        backup_code_hashes: Vec<String>,
    },
}

impl MfaState {
    /// Whether the account requires a second factor to authenticate.
    pub fn is_enabled(&self) -> bool {
        matches!(self, MfaState::Enabled { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MfaState::Pending { .. })
    }
}

/// Representation of an account in vigil.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The unique identifier for the account.
    pub id: AccountId,

    /// The login identifier, typically an email address.
    pub identifier: String,

    /// Argon2 hash of the account's secret. `None` for accounts that
    /// authenticate through an external provider.
    pub password_hash: Option<String>,

    /// Whether the account has been administratively disabled.
    pub disabled: bool,

    /// Absolute lockout expiry. Readers must treat an expiry in the past as
    /// unlocked; see `services::lockout::effective_lockout`.
    pub locked_until: Option<DateTime<Utc>>,

    /// Multi-factor enrollment state.
    pub mfa: MfaState,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether the account is eligible to authenticate at all.
    pub fn is_active(&self) -> bool {
        !self.disabled
    }
}

/// Parameters for creating a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub id: AccountId,
    pub identifier: String,
    pub password_hash: Option<String>,
}

impl NewAccount {
    pub fn new(identifier: impl Into<String>, password_hash: Option<String>) -> Self {
        Self {
            id: AccountId::new_random(),
            identifier: identifier.into(),
            password_hash,
        }
    }

    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = id;
        self
    }
}
