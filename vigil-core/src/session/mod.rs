//! Session tokens
//!
//! Sessions are self-contained signed JWTs. The claims carried in each token:
//!
//! | Claim | Type             | Description                                       |
//! | ----- | ---------------- | ------------------------------------------------- |
//! | `sub` | `String`         | The account identifier the session belongs to.    |
//! | `jti` | `String`         | Unique token identifier, used as revocation key.  |
//! | `iat` | `i64`            | Issued-at as a UTC timestamp in seconds.          |
//! | `exp` | `i64`            | Expiry as a UTC timestamp in seconds.             |
//! | `iss` | `Option<String>` | Issuer, if configured.                            |
//!
//! Signature and expiry are necessary but not sufficient for validity: a
//! token whose `jti` appears in the revocation ledger is invalid regardless.
//! That check lives in [`crate::services::SessionService`].

use std::path::Path;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::AccountId,
    error::{CryptoError, SessionError},
};

/// An encoded, signed session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: &str) -> Self {
        SessionToken(token.to_string())
    }

    /// Sign the given claims into a new token.
    pub fn sign(claims: &SessionClaims, config: &JwtConfig) -> Result<Self, Error> {
        let header = Header::new(config.jwt_algorithm());
        let encoding_key = config.get_encoding_key()?;

        let token = encode(&header, claims, &encoding_key)
            .map_err(|e| CryptoError::JwtSigning(e.to_string()))?;

        Ok(SessionToken(token))
    }

    /// Verify the token's signature and expiry and return its claims.
    ///
    /// Expiry is checked with zero leeway. Revocation is not checked here.
    pub fn verify(&self, config: &JwtConfig) -> Result<SessionClaims, Error> {
        let decoding_key = config.get_decoding_key()?;
        let validation = config.get_validation();

        let token_data = decode::<SessionClaims>(&self.0, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Error::Session(SessionError::Expired)
                }
                _ => Error::Session(SessionError::InvalidToken(e.to_string())),
            })?;

        Ok(token_data.claims)
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Claims carried in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject - account ID
    pub sub: String,
    /// Unique token identifier (revocation key)
    pub jti: String,
    /// Issued at in seconds (as UTC timestamp)
    pub iat: i64,
    /// Expiration time in seconds (as UTC timestamp)
    pub exp: i64,
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl SessionClaims {
    pub fn account_id(&self) -> AccountId {
        AccountId::new(&self.sub)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_else(Utc::now)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// JWT algorithm type
#[derive(Debug, Clone)]
pub enum JwtAlgorithm {
    /// RS256 - RSA with SHA-256
    RS256 {
        /// Private key for signing (PEM format)
        private_key: Vec<u8>,
        /// Public key for verifying (PEM format)
        public_key: Vec<u8>,
    },
    /// HS256 - HMAC with SHA-256
    HS256 {
        /// Secret key for both signing and verifying
        secret_key: Vec<u8>,
    },
}

/// Configuration for signing and verifying session tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Algorithm and keys
    pub algorithm: JwtAlgorithm,
    /// Issuer claim
    pub issuer: Option<String>,
}

impl JwtConfig {
    /// Create a new JWT configuration with RS256 algorithm
    pub fn new_rs256(private_key: Vec<u8>, public_key: Vec<u8>) -> Self {
        Self {
            algorithm: JwtAlgorithm::RS256 {
                private_key,
                public_key,
            },
            issuer: None,
        }
    }

    /// Create a new JWT configuration with HS256 algorithm
    pub fn new_hs256(secret_key: Vec<u8>) -> Self {
        Self {
            algorithm: JwtAlgorithm::HS256 { secret_key },
            issuer: None,
        }
    }

    /// Create a new JWT configuration from RSA key files (PEM format)
    pub fn from_rs256_pem_files(
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        use std::fs::read;

        let private_key = read(private_key_path)
            .map_err(|e| CryptoError::JwtSigning(format!("Failed to read private key: {e}")))?;

        let public_key = read(public_key_path)
            .map_err(|e| CryptoError::JwtVerification(format!("Failed to read public key: {e}")))?;

        Ok(Self::new_rs256(private_key, public_key))
    }

    /// Set the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Get the algorithm to use with jsonwebtoken
    pub fn jwt_algorithm(&self) -> Algorithm {
        match &self.algorithm {
            JwtAlgorithm::RS256 { .. } => Algorithm::RS256,
            JwtAlgorithm::HS256 { .. } => Algorithm::HS256,
        }
    }

    /// Get the encoding key for signing
    pub fn get_encoding_key(&self) -> Result<EncodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::RS256 { private_key, .. } => EncodingKey::from_rsa_pem(private_key)
                .map_err(|e| CryptoError::JwtSigning(format!("Invalid RSA private key: {e}")).into()),
            JwtAlgorithm::HS256 { secret_key } => Ok(EncodingKey::from_secret(secret_key)),
        }
    }

    /// Get the decoding key for verification
    pub fn get_decoding_key(&self) -> Result<DecodingKey, Error> {
        match &self.algorithm {
            JwtAlgorithm::RS256 { public_key, .. } => {
                DecodingKey::from_rsa_pem(public_key).map_err(|e| {
                    CryptoError::JwtVerification(format!("Invalid RSA public key: {e}")).into()
                })
            }
            JwtAlgorithm::HS256 { secret_key } => Ok(DecodingKey::from_secret(secret_key)),
        }
    }

    /// Build validation parameters. Expiry is enforced with zero leeway so
    /// expiry behavior is deterministic under test.
    pub fn get_validation(&self) -> Validation {
        let mut validation = Validation::new(self.jwt_algorithm());
        validation.leeway = 0;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}
