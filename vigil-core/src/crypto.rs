//! Cryptographic utilities for secure token handling
//!
//! This module provides secure token hashing and constant-time verification
//! to prevent timing attacks on token and backup-code verification.
//!
//! # Security
//!
//! Verification is vulnerable to timing attacks when using standard string
//! comparison because the comparison may exit early on the first mismatch.
//! This module addresses this by:
//!
//! 1. Storing SHA256 hashes of codes instead of plaintext
//! 2. Using constant-time comparison via the `subtle` crate
//! 3. Providing hash-based lookups to avoid iterating over all codes
//!
//! SHA256 (rather than argon2) is sufficient here because backup codes and
//! tokens are generated from a CSPRNG with enough entropy that brute-force
//! attacks against the hash are infeasible. Low-entropy secrets (passwords)
//! go through `password_auth` instead.

use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Alphabet for backup codes. Excludes characters that read ambiguously
/// when written down (0/O, 1/I/L).
const BACKUP_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Generate a cryptographically secure random token.
///
/// This produces a 256-bit (32-byte) random token encoded as URL-safe base64.
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure (e.g., /dev/urandom unavailable) from which recovery is not
/// possible for security-sensitive operations.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32]; // 256 bits of entropy
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Generate a single-use backup code in the form `XXXXX-XXXXX`.
///
/// Codes are drawn from an unambiguous alphabet and carry roughly 49 bits of
/// entropy, enough that online guessing is bounded by the rate limiter and
/// offline guessing against the stored SHA256 hash is infeasible.
///
/// # Panics
///
/// Panics if the OS random number generator fails (see
/// [`generate_secure_token`]).
pub fn generate_backup_code() -> String {
    let mut bytes = [0u8; 10];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");

    let chars: Vec<char> = bytes
        .iter()
        .map(|b| BACKUP_CODE_ALPHABET[*b as usize % BACKUP_CODE_ALPHABET.len()] as char)
        .collect();

    format!(
        "{}-{}",
        chars[..5].iter().collect::<String>(),
        chars[5..].iter().collect::<String>()
    )
}

/// Hash a token or backup code for secure storage using SHA256.
///
/// This produces a deterministic hash that can be used for storage lookups.
///
/// # Returns
///
/// A hex-encoded SHA256 hash of the input
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Perform constant-time comparison of two byte slices.
///
/// This function uses the `subtle` crate to ensure the comparison takes
/// the same amount of time regardless of where (or if) the bytes differ.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_token() {
        let token = "test_token_12345";
        let hash = hash_token(token);

        assert!(constant_time_compare(
            hash_token(token).as_bytes(),
            hash.as_bytes()
        ));
        assert!(!constant_time_compare(
            hash_token("wrong_token").as_bytes(),
            hash.as_bytes()
        ));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let token = "test_token";
        assert_eq!(hash_token(token), hash_token(token));
    }

    #[test]
    fn test_hash_produces_hex_string() {
        let hash = hash_token("test_token");

        // SHA256 produces 32 bytes = 64 hex chars
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_backup_code_format() {
        let code = generate_backup_code();
        assert_eq!(code.len(), 11);
        assert_eq!(code.as_bytes()[5], b'-');
        assert!(
            code.bytes()
                .all(|b| b == b'-' || BACKUP_CODE_ALPHABET.contains(&b))
        );
    }

    #[test]
    fn test_backup_codes_are_unique() {
        let a = generate_backup_code();
        let b = generate_backup_code();
        assert_ne!(a, b);
    }

    #[test]
    fn test_backup_code_hashing_is_case_sensitive() {
        let code = generate_backup_code();
        assert_ne!(hash_token(&code), hash_token(&code.to_lowercase()));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(constant_time_compare(b"", b""));
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"short", b"longer_string"));
    }

    #[test]
    fn test_secure_tokens_are_unique() {
        assert_ne!(generate_secure_token(), generate_secure_token());
    }
}
