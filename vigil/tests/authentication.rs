//! Pipeline tests: rate limiting, threat gating, and credential outcomes.

use std::sync::Arc;

use chrono::Duration;
use vigil::{
    AuthError, AuthRequest, AuthResult, BlockReason, ChallengeReason, Error, FailureReason,
    MemoryRepositoryProvider, RateLimitConfig, ThreatSignals, Vigil,
};
use vigil_core::repositories::AccountRepositoryProvider;

const PASSWORD: &str = "correct horse battery staple";

fn engine() -> (Arc<MemoryRepositoryProvider>, Vigil<MemoryRepositoryProvider>) {
    let _ = tracing_subscriber::fmt::try_init();
    let repositories = Arc::new(MemoryRepositoryProvider::new());
    let vigil = Vigil::builder(repositories.clone()).build();
    (repositories, vigil)
}

#[tokio::test]
async fn test_successful_authentication_issues_session() {
    let (_, vigil) = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let result = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD))
        .await
        .unwrap();

    let AuthResult::Success { token } = result else {
        panic!("expected success, got {result:?}");
    };

    let session = vigil.validate_session(&token).await.unwrap();
    let account = vigil.get_account("user@example.com").await.unwrap();
    assert_eq!(session.account_id, account.id);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_account_are_indistinguishable() {
    let (_, vigil) = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let wrong = vigil
        .authenticate(AuthRequest::new("user@example.com", "not the password"))
        .await
        .unwrap();
    let unknown = vigil
        .authenticate(AuthRequest::new("nobody@example.com", PASSWORD))
        .await
        .unwrap();

    for result in [wrong, unknown] {
        assert!(matches!(
            result,
            AuthResult::Failure {
                reason: FailureReason::InvalidCredentials
            }
        ));
    }
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let (_, vigil) = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    let result = vigil.register("user@example.com", "another password").await;
    assert!(matches!(
        result,
        Err(Error::Auth(AuthError::AccountAlreadyExists))
    ));
}

#[tokio::test]
async fn test_disabled_account_fails_with_reason() {
    let (repositories, vigil) = engine();
    let account = vigil.register("user@example.com", PASSWORD).await.unwrap();
    repositories.accounts().set_disabled(&account.id, true);

    let result = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD))
        .await
        .unwrap();

    assert!(matches!(
        result,
        AuthResult::Failure {
            reason: FailureReason::AccountDisabled
        }
    ));
}

#[tokio::test]
async fn test_rate_limit_blocks_before_credentials() {
    let repositories = Arc::new(MemoryRepositoryProvider::new());
    let vigil = Vigil::builder(repositories)
        .with_rate_limit_config(RateLimitConfig::new(3, Duration::minutes(15)))
        .build();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    for _ in 0..3 {
        let result = vigil
            .authenticate(AuthRequest::new("user@example.com", "wrong"))
            .await
            .unwrap();
        assert!(matches!(result, AuthResult::Failure { .. }));
    }

    // Budget exhausted: even the correct password is refused, with a hint
    let result = vigil
        .authenticate(AuthRequest::new("user@example.com", PASSWORD))
        .await
        .unwrap();
    let AuthResult::Blocked {
        reason: BlockReason::RateLimited {
            retry_after_seconds,
        },
    } = result
    else {
        panic!("expected rate limit, got {result:?}");
    };
    assert!(retry_after_seconds > 0);
}

#[tokio::test]
async fn test_threat_block_reveals_no_detail() {
    let (_, vigil) = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    // Flagged network (100) + automation user agent (60) crosses the block
    // threshold (150)
    let result = vigil
        .authenticate(
            AuthRequest::new("user@example.com", PASSWORD).with_signals(ThreatSignals {
                ip_address: Some("203.0.113.9".to_string()),
                user_agent: Some("curl/8.5.0".to_string()),
                flagged_network: true,
                ..ThreatSignals::default()
            }),
        )
        .await
        .unwrap();

    assert!(matches!(
        result,
        AuthResult::Blocked {
            reason: BlockReason::ThreatBlocked
        }
    ));
}

#[tokio::test]
async fn test_threat_challenge_without_mfa_enrollment() {
    let (_, vigil) = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    // Flagged network alone (100) lands in the challenge band
    let result = vigil
        .authenticate(
            AuthRequest::new("user@example.com", PASSWORD).with_signals(ThreatSignals {
                flagged_network: true,
                ..ThreatSignals::default()
            }),
        )
        .await
        .unwrap();

    assert!(matches!(
        result,
        AuthResult::Challenge {
            reason: ChallengeReason::StepUpVerification
        }
    ));
}

#[tokio::test]
async fn test_suspicious_agent_alone_still_allows() {
    let (_, vigil) = engine();
    vigil.register("user@example.com", PASSWORD).await.unwrap();

    // 60 points is below every threshold
    let result = vigil
        .authenticate(
            AuthRequest::new("user@example.com", PASSWORD).with_signals(ThreatSignals {
                user_agent: Some("python-requests/2.31".to_string()),
                ..ThreatSignals::default()
            }),
        )
        .await
        .unwrap();

    assert!(result.is_success());
}

#[tokio::test]
async fn test_health_check() {
    let (_, vigil) = engine();
    vigil.health_check().await.unwrap();
}
