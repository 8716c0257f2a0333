//! Multi-factor enrollment and verification through the facade.

use std::sync::Arc;

use totp_rs::{Algorithm, Secret, TOTP};
use vigil::{
    AuthRequest, AuthResult, ChallengeReason, Error, FailureReason, MemoryRepositoryProvider,
    MfaError, Vigil,
};

const PASSWORD: &str = "correct horse battery staple";

// Guaranteed-invalid TOTP input: five digits can never match a six-digit code
const BAD_CODE: &str = "00000";

fn engine() -> Vigil<MemoryRepositoryProvider> {
    let _ = tracing_subscriber::fmt::try_init();
    Vigil::builder(Arc::new(MemoryRepositoryProvider::new())).build()
}

fn current_code(secret: &str) -> String {
    let secret = Secret::Encoded(secret.to_string())
        .to_bytes()
        .expect("enrollment secret should be valid base32");
    let totp = TOTP::new(Algorithm::SHA1, 6, 1, 30, secret, None, "account".to_string())
        .expect("TOTP parameters should be valid");
    totp.generate_current().expect("system clock should be readable")
}

#[tokio::test]
async fn test_enrollment_requires_proof_of_possession() {
    let vigil = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let enrollment = vigil.setup_mfa("user@example.com").await.unwrap();
    assert!(enrollment.otpauth_uri.starts_with("otpauth://totp/"));
    assert_eq!(enrollment.backup_codes.len(), 10);

    // An invalid code must not flip the flag
    let result = vigil.enable_mfa("user@example.com", BAD_CODE).await;
    assert!(matches!(result, Err(Error::Mfa(MfaError::InvalidCode))));

    // Enrollment still pending: authentication does not demand a code
    assert!(
        vigil
            .authenticate(AuthRequest::new("user@example.com", PASSWORD))
            .await
            .unwrap()
            .is_success()
    );

    // A valid code completes enrollment
    let code = current_code(&enrollment.secret);
    vigil.enable_mfa("user@example.com", &code).await.unwrap();

    let result = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD))
        .await
        .unwrap();
    assert!(matches!(
        result,
        AuthResult::Challenge {
            reason: ChallengeReason::MfaCodeRequired
        }
    ));
}

#[tokio::test]
async fn test_totp_code_completes_authentication() {
    let vigil = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let enrollment = vigil.setup_mfa("user@example.com").await.unwrap();
    vigil
        .enable_mfa("user@example.com", &current_code(&enrollment.secret))
        .await
        .unwrap();

    let result = vigil
        .authenticate(
            AuthRequest::new("user@example.com", PASSWORD)
                .with_mfa_code(current_code(&enrollment.secret)),
        )
        .await
        .unwrap();
    assert!(result.is_success(), "got {result:?}");

    let result = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD).with_mfa_code(BAD_CODE))
        .await
        .unwrap();
    assert!(matches!(
        result,
        AuthResult::Failure {
            reason: FailureReason::InvalidMfaCode
        }
    ));
}

#[tokio::test]
async fn test_backup_code_is_single_use() {
    let vigil = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let enrollment = vigil.setup_mfa("user@example.com").await.unwrap();
    vigil
        .enable_mfa("user@example.com", &current_code(&enrollment.secret))
        .await
        .unwrap();

    let code = enrollment.backup_codes[0].clone();

    let first = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD).with_backup_code(&code))
        .await
        .unwrap();
    assert!(first.is_success(), "got {first:?}");

    let second = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD).with_backup_code(&code))
        .await
        .unwrap();
    assert!(matches!(
        second,
        AuthResult::Failure {
            reason: FailureReason::InvalidBackupCode
        }
    ));
}

#[tokio::test]
async fn test_concurrent_redemption_of_one_backup_code() {
    let vigil = Arc::new(engine());
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let enrollment = vigil.setup_mfa("user@example.com").await.unwrap();
    vigil
        .enable_mfa("user@example.com", &current_code(&enrollment.secret))
        .await
        .unwrap();

    let code = enrollment.backup_codes[0].clone();
    let mut handles = Vec::new();
    for _ in 0..4 {
        let vigil = vigil.clone();
        let code = code.clone();
        handles.push(tokio::spawn(async move {
            vigil
                .authenticate(
                    AuthRequest::new("user@example.com", PASSWORD).with_backup_code(code),
                )
                .await
                .unwrap()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_success() {
            successes += 1;
        }
    }
    // Exactly one of the simultaneous redemptions may win
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn test_disable_removes_requirement() {
    let vigil = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let enrollment = vigil.setup_mfa("user@example.com").await.unwrap();
    vigil
        .enable_mfa("user@example.com", &current_code(&enrollment.secret))
        .await
        .unwrap();
    vigil.disable_mfa("user@example.com").await.unwrap();

    assert!(
        vigil
            .authenticate(AuthRequest::new("user@example.com", PASSWORD))
            .await
            .unwrap()
            .is_success()
    );
}

#[tokio::test]
async fn test_regenerated_codes_invalidate_old_set() {
    let vigil = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let enrollment = vigil.setup_mfa("user@example.com").await.unwrap();
    vigil
        .enable_mfa("user@example.com", &current_code(&enrollment.secret))
        .await
        .unwrap();

    let fresh = vigil
        .regenerate_backup_codes("user@example.com")
        .await
        .unwrap();
    assert_eq!(fresh.len(), 10);

    let old = vigil
        .authenticate(
            AuthRequest::new("user@example.com", PASSWORD)
                .with_backup_code(&enrollment.backup_codes[0]),
        )
        .await
        .unwrap();
    assert!(matches!(
        old,
        AuthResult::Failure {
            reason: FailureReason::InvalidBackupCode
        }
    ));

    let new = vigil
        .authenticate(
            AuthRequest::new("user@example.com", PASSWORD).with_backup_code(&fresh[0]),
        )
        .await
        .unwrap();
    assert!(new.is_success(), "got {new:?}");
}
