use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("MFA error: {0}")]
    Mfa(#[from] MfaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Returned when the backing store is unreachable. The core fails closed
    /// and leaves retry policy to the caller.
    #[error("Service unavailable")]
    ServiceUnavailable,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong secret or unknown account. The two cases are intentionally
    /// indistinguishable to the caller.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account already exists")]
    AccountAlreadyExists,

    #[error("Account is locked until {until}")]
    AccountLocked {
        until: chrono::DateTime<chrono::Utc>,
    },

    #[error("Too many attempts, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: i64 },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session expired")]
    Expired,

    #[error("Session revoked")]
    Revoked,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Error)]
pub enum MfaError {
    #[error("MFA code required")]
    CodeRequired,

    #[error("Invalid MFA code")]
    InvalidCode,

    #[error("Invalid backup code")]
    InvalidBackupCode,

    #[error("MFA is not enrolled for this account")]
    NotEnrolled,

    #[error("MFA enrollment is not pending for this account")]
    NotPending,

    #[error("Malformed MFA secret: {0}")]
    MalformedSecret(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Audit sink error: {0}")]
    SinkError(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing failed: {0}")]
    JwtSigning(String),

    #[error("JWT verification failed: {0}")]
    JwtVerification(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("TOTP operation failed: {0}")]
    Totp(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::ServiceUnavailable)
    }

    pub fn is_mfa_error(&self) -> bool {
        matches!(self, Error::Mfa(_))
    }

    /// Collapse transient storage failures into the generic fail-closed
    /// variant surfaced to callers.
    pub fn into_unavailable(self) -> Error {
        match self {
            Error::Storage(_) => Error::ServiceUnavailable,
            other => other,
        }
    }
}
