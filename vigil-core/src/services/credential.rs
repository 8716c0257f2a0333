//! Credential verification
//!
//! Pure, stateless check of a presented secret against a stored argon2
//! hash, via `password_auth`.
//!
//! # Timing
//!
//! "Account not found" and "wrong password" must be indistinguishable to a
//! caller measuring response times, or the difference becomes an account
//! enumeration oracle. When there is no stored hash, [`verify`] runs the
//! same argon2 comparison against a precomputed dummy hash before returning
//! failure, so both paths pay the full KDF cost.
//!
//! [`verify`]: CredentialVerifier::verify

use password_auth::{generate_hash, verify_password};

use crate::crypto::generate_secure_token;

/// Stateless verifier for account secrets.
pub struct CredentialVerifier {
    /// Hash of a random throwaway secret, used to equalize the cost of the
    /// account-not-found path. No presented secret can match it.
    dummy_hash: String,
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier {
    pub fn new() -> Self {
        Self {
            dummy_hash: generate_hash(generate_secure_token()),
        }
    }

    /// Hash a secret for storage (argon2, salted).
    pub fn hash(&self, password: &str) -> String {
        generate_hash(password)
    }

    /// Check a presented secret against a stored hash.
    ///
    /// `stored_hash` of `None` (unknown account, or account without a
    /// password) always fails, but only after an equivalent-cost dummy
    /// comparison.
    pub fn verify(&self, stored_hash: Option<&str>, presented: &str) -> bool {
        match stored_hash {
            Some(hash) => verify_password(presented, hash).is_ok(),
            None => {
                // Burn the same KDF cost as the mismatch path.
                let _ = verify_password(presented, &self.dummy_hash);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_correct_password() {
        let verifier = CredentialVerifier::new();
        let hash = verifier.hash("correct horse battery staple");
        assert!(verifier.verify(Some(&hash), "correct horse battery staple"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let verifier = CredentialVerifier::new();
        let hash = verifier.hash("correct horse battery staple");
        assert!(!verifier.verify(Some(&hash), "Tr0ub4dor&3"));
    }

    #[test]
    fn test_verify_missing_hash_fails() {
        let verifier = CredentialVerifier::new();
        assert!(!verifier.verify(None, "anything"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let verifier = CredentialVerifier::new();
        let a = verifier.hash("same password");
        let b = verifier.hash("same password");
        assert_ne!(a, b);
        assert!(verifier.verify(Some(&a), "same password"));
        assert!(verifier.verify(Some(&b), "same password"));
    }

    #[test]
    fn test_malformed_stored_hash_fails_closed() {
        let verifier = CredentialVerifier::new();
        assert!(!verifier.verify(Some("not-a-phc-string"), "anything"));
    }
}
