//! Session issuance, validation, and revocation
//!
//! Sessions are self-contained signed JWTs; the revocation ledger is the
//! one piece of server-side state, keyed by jti. Validation order is
//! signature, expiry, then ledger: a revoked jti fails validation no matter
//! how valid the rest of the token is.
//!
//! Tokens validated after the rolling re-issue threshold get a freshly
//! signed replacement attached, so long-lived clients refresh expiry without
//! re-authenticating.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::decode;
use uuid::Uuid;

use crate::{
    Error,
    account::AccountId,
    config::SessionConfig,
    error::SessionError,
    events::{AuditEvent, AuditLog},
    repositories::RevocationStore,
    session::{JwtConfig, SessionClaims, SessionToken},
};

/// Result of validating a token.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub account_id: AccountId,
    pub claims: SessionClaims,
    /// A re-signed replacement token, present when the validated token had
    /// aged past the rolling re-issue threshold. The original stays valid
    /// until its own expiry; callers wanting single-token semantics can
    /// revoke the old jti.
    pub refreshed: Option<SessionToken>,
}

/// Service minting and validating session tokens against the revocation
/// ledger.
pub struct SessionService<R: RevocationStore> {
    revocations: Arc<R>,
    jwt: JwtConfig,
    config: SessionConfig,
    audit: AuditLog,
}

impl<R: RevocationStore> SessionService<R> {
    pub fn new(revocations: Arc<R>, jwt: JwtConfig, config: SessionConfig, audit: AuditLog) -> Self {
        Self {
            revocations,
            jwt,
            config,
            audit,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Mint a signed token for an account with issuance time `now`.
    pub async fn issue_at(
        &self,
        account_id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, Error> {
        let expires_at = now + self.config.expires_in;
        let claims = SessionClaims {
            sub: account_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.jwt.issuer.clone(),
        };

        let token = SessionToken::sign(&claims, &self.jwt)?;

        self.audit
            .emit(&AuditEvent::SessionIssued {
                account_id: account_id.to_string(),
                jti: claims.jti,
                expires_at,
                timestamp: now,
            })
            .await;

        Ok(token)
    }

    /// Mint a signed token for an account.
    pub async fn issue(&self, account_id: &AccountId) -> Result<SessionToken, Error> {
        self.issue_at(account_id, Utc::now()).await
    }

    /// Validate a token at `now`: signature, expiry, then revocation ledger.
    pub async fn validate_at(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<ValidatedSession, Error> {
        let claims = token.verify(&self.jwt)?;

        if now > claims.expires_at() {
            return Err(SessionError::Expired.into());
        }

        if self.revocations.is_revoked(&claims.jti).await? {
            return Err(SessionError::Revoked.into());
        }

        let refreshed = if now - claims.issued_at() >= self.config.reissue_after {
            Some(self.issue_at(&claims.account_id(), now).await?)
        } else {
            None
        };

        Ok(ValidatedSession {
            account_id: claims.account_id(),
            claims,
            refreshed,
        })
    }

    /// Validate a token at the current time.
    pub async fn validate(&self, token: &SessionToken) -> Result<ValidatedSession, Error> {
        self.validate_at(token, Utc::now()).await
    }

    /// Revoke a token by inserting its jti into the ledger.
    ///
    /// The signature must verify (revocation is not an oracle for forged
    /// tokens), but an already-expired token is accepted: revoking it is a
    /// harmless no-op that still lands in the ledger until pruned.
    pub async fn revoke(&self, token: &SessionToken) -> Result<(), Error> {
        let claims = self.decode_ignoring_expiry(token)?;
        self.revoke_jti(&claims.jti, claims.expires_at()).await
    }

    /// Revoke by jti directly. `token_expires_at` becomes the ledger
    /// entry's own expiry so pruning stays bounded by the token lifetime.
    pub async fn revoke_jti(&self, jti: &str, token_expires_at: DateTime<Utc>) -> Result<(), Error> {
        self.revocations.insert(jti, token_expires_at).await?;

        self.audit
            .emit(&AuditEvent::SessionRevoked {
                jti: jti.to_string(),
                timestamp: Utc::now(),
            })
            .await;

        Ok(())
    }

    /// Drop ledger entries for tokens that have expired on their own.
    pub async fn prune_revocations(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let pruned = self.revocations.prune_expired(now).await?;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired revocation entries");
        }
        Ok(pruned)
    }

    /// Decode claims with signature verification but without the expiry
    /// check, for revocation of tokens that may already be expired.
    fn decode_ignoring_expiry(&self, token: &SessionToken) -> Result<SessionClaims, Error> {
        let decoding_key = self.jwt.get_decoding_key()?;
        let mut validation = self.jwt.get_validation();
        validation.validate_exp = false;

        let data = decode::<SessionClaims>(token.as_str(), &decoding_key, &validation)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}
