use warden::auth::totp::current_totp;
use warden::error::AuthError;
use warden::service::LoginOutcome;
use warden::testing::test_service;
use warden::AuthService;

async fn enrolled_user(service: &AuthService) -> (i32, String) {
    let user = service
        .register("alice", "alice@example.com", "pw123456", None)
        .await
        .unwrap();

    let setup = service.twofa_start_setup(user.id).await.unwrap();
    let code = current_totp(&setup.secret).unwrap();
    service
        .twofa_confirm(user.id, &setup.setup_token, &code)
        .await
        .expect("confirm failed");

    (user.id, setup.secret)
}

#[tokio::test]
async fn test_full_enrollment_and_challenge_flow() {
    let service = test_service().await;
    let (_user_id, secret) = enrolled_user(&service).await;

    // Password login now yields a challenge instead of a session.
    let challenge = match service.login("alice", "pw123456").await.unwrap() {
        LoginOutcome::TwoFaRequired { challenge_token } => challenge_token,
        LoginOutcome::Session { .. } => panic!("expected 2FA challenge"),
    };

    let code = current_totp(&secret).unwrap();
    let (token, user) = service
        .twofa_challenge(&challenge, &code)
        .await
        .expect("challenge failed");
    assert_eq!(user.username, "alice");
    assert!(service.validate_token(&token).await.is_ok());
}

#[tokio::test]
async fn test_setup_returns_secret_and_uri() {
    let service = test_service().await;
    let user = service
        .register("bob", "bob@example.com", "pw123456", None)
        .await
        .unwrap();

    let setup = service.twofa_start_setup(user.id).await.unwrap();
    assert!(!setup.secret.is_empty());
    assert!(setup.otpauth_uri.starts_with("otpauth://totp/"));
    assert!(!setup.setup_token.is_empty());
}

#[tokio::test]
async fn test_confirm_without_setup_fails() {
    let service = test_service().await;
    let user = service
        .register("carol", "carol@example.com", "pw123456", None)
        .await
        .unwrap();

    let err = service
        .twofa_confirm(user.id, "garbage-token", "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::BadRequest(_)));
}

#[tokio::test]
async fn test_confirm_with_wrong_code_fails() {
    let service = test_service().await;
    let user = service
        .register("dave", "dave@example.com", "pw123456", None)
        .await
        .unwrap();

    let setup = service.twofa_start_setup(user.id).await.unwrap();
    let err = service
        .twofa_confirm(user.id, &setup.setup_token, "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));

    // Enrollment is still pending; a correct code finishes it.
    let code = current_totp(&setup.secret).unwrap();
    assert!(service
        .twofa_confirm(user.id, &setup.setup_token, &code)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_restarting_setup_invalidates_old_setup_token() {
    let service = test_service().await;
    let user = service
        .register("erin", "erin@example.com", "pw123456", None)
        .await
        .unwrap();

    let first = service.twofa_start_setup(user.id).await.unwrap();
    let second = service.twofa_start_setup(user.id).await.unwrap();
    assert_ne!(first.secret, second.secret);

    // The first token is bound to a secret that is no longer pending.
    let code = current_totp(&first.secret).unwrap();
    let err = service
        .twofa_confirm(user.id, &first.setup_token, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::BadRequest(_)));

    let code = current_totp(&second.secret).unwrap();
    assert!(service
        .twofa_confirm(user.id, &second.setup_token, &code)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_setup_when_already_enabled_fails() {
    let service = test_service().await;
    let (user_id, _secret) = enrolled_user(&service).await;

    let err = service.twofa_start_setup(user_id).await.unwrap_err();
    assert!(matches!(err, AuthError::BadRequest(_)));
}

#[tokio::test]
async fn test_challenge_with_wrong_code_fails() {
    let service = test_service().await;
    let (_user_id, _secret) = enrolled_user(&service).await;

    let challenge = match service.login("alice", "pw123456").await.unwrap() {
        LoginOutcome::TwoFaRequired { challenge_token } => challenge_token,
        LoginOutcome::Session { .. } => panic!("expected 2FA challenge"),
    };

    let err = service.twofa_challenge(&challenge, "000000").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));
}

#[tokio::test]
async fn test_session_token_rejected_as_challenge_token() {
    let service = test_service().await;
    let (_user_id, secret) = enrolled_user(&service).await;

    // Get a real session via the challenge, then try to replay it as a
    // challenge token.
    let challenge = match service.login("alice", "pw123456").await.unwrap() {
        LoginOutcome::TwoFaRequired { challenge_token } => challenge_token,
        LoginOutcome::Session { .. } => panic!("expected 2FA challenge"),
    };
    let code = current_totp(&secret).unwrap();
    let (session_token, _) = service.twofa_challenge(&challenge, &code).await.unwrap();

    let code = current_totp(&secret).unwrap();
    let err = service
        .twofa_challenge(&session_token, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));
}

#[tokio::test]
async fn test_enabling_revokes_existing_sessions() {
    let service = test_service().await;
    let user = service
        .register("frank", "frank@example.com", "pw123456", None)
        .await
        .unwrap();

    let old_token = match service.login("frank", "pw123456").await.unwrap() {
        LoginOutcome::Session { token, .. } => token,
        _ => panic!("expected session"),
    };

    let setup = service.twofa_start_setup(user.id).await.unwrap();
    let code = current_totp(&setup.secret).unwrap();
    let new_token = service
        .twofa_confirm(user.id, &setup.setup_token, &code)
        .await
        .unwrap();

    assert!(service.validate_token(&old_token).await.is_err());
    assert!(service.validate_token(&new_token).await.is_ok());
}

#[tokio::test]
async fn test_wrong_confirm_code_leaves_sessions_untouched() {
    let service = test_service().await;
    let user = service
        .register("grace", "grace@example.com", "pw123456", None)
        .await
        .unwrap();

    let session = match service.login("grace", "pw123456").await.unwrap() {
        LoginOutcome::Session { token, .. } => token,
        _ => panic!("expected session"),
    };

    let setup = service.twofa_start_setup(user.id).await.unwrap();
    let err = service
        .twofa_confirm(user.id, &setup.setup_token, "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));

    // Failed confirmation must not revoke anything.
    assert!(service.validate_token(&session).await.is_ok());
}

#[tokio::test]
async fn test_full_lifecycle_multi_session() {
    let service = test_service().await;
    let user = service
        .register("heidi", "heidi@example.com", "pw123456", None)
        .await
        .unwrap();

    // Plain login: session S1.
    let s1 = match service.login("heidi", "pw123456").await.unwrap() {
        LoginOutcome::Session { token, .. } => token,
        _ => panic!("expected session"),
    };

    // Enroll. Confirmation revokes S1 and hands back S2.
    let setup = service.twofa_start_setup(user.id).await.unwrap();
    let code = current_totp(&setup.secret).unwrap();
    let s2 = service
        .twofa_confirm(user.id, &setup.setup_token, &code)
        .await
        .unwrap();
    assert!(service.validate_token(&s1).await.is_err());
    assert!(service.validate_token(&s2).await.is_ok());

    // Second login goes through the challenge and yields S3 without
    // disturbing S2.
    let challenge = match service.login("heidi", "pw123456").await.unwrap() {
        LoginOutcome::TwoFaRequired { challenge_token } => challenge_token,
        _ => panic!("expected 2FA challenge"),
    };
    let code = current_totp(&setup.secret).unwrap();
    let (s3, _) = service.twofa_challenge(&challenge, &code).await.unwrap();
    assert!(service.validate_token(&s2).await.is_ok());
    assert!(service.validate_token(&s3).await.is_ok());

    // Disabling 2FA kills both, leaving only the fresh token.
    let s4 = service.twofa_disable(user.id, "pw123456").await.unwrap();
    assert!(service.validate_token(&s2).await.is_err());
    assert!(service.validate_token(&s3).await.is_err());
    assert!(service.validate_token(&s4).await.is_ok());
}

#[tokio::test]
async fn test_disable_requires_password_and_enabled_state() {
    let service = test_service().await;
    let (user_id, _secret) = enrolled_user(&service).await;

    let bad_pw = service.twofa_disable(user_id, "wrongpass").await.unwrap_err();
    assert!(matches!(bad_pw, AuthError::Unauthorized(_)));

    let token = service
        .twofa_disable(user_id, "pw123456")
        .await
        .expect("disable failed");
    assert!(service.validate_token(&token).await.is_ok());

    // Login is plain again.
    match service.login("alice", "pw123456").await.unwrap() {
        LoginOutcome::Session { .. } => {}
        LoginOutcome::TwoFaRequired { .. } => panic!("2FA should be off"),
    }

    // Disabling twice is a state error.
    let again = service.twofa_disable(user_id, "pw123456").await.unwrap_err();
    assert!(matches!(again, AuthError::BadRequest(_)));
}
