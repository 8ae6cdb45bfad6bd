use warden::auth::jwt::{issue, TokenKind};
use warden::error::AuthError;
use warden::service::LoginOutcome;
use warden::testing::{test_config, test_service, test_service_with};

async fn login_token(service: &warden::AuthService, identifier: &str, password: &str) -> String {
    match service.login(identifier, password).await.unwrap() {
        LoginOutcome::Session { token, .. } => token,
        LoginOutcome::TwoFaRequired { .. } => panic!("unexpected 2FA challenge"),
    }
}

#[tokio::test]
async fn test_register_login_validate_logout() {
    let service = test_service().await;
    let user = service
        .register("alice", "alice@example.com", "hunter22", None)
        .await
        .expect("register failed");

    let token = login_token(&service, "alice", "hunter22").await;
    let validated = service.validate_token(&token).await.expect("validate failed");
    assert_eq!(validated, user.id);

    service.logout(user.id).await.expect("logout failed");
    assert!(service.validate_token(&token).await.is_err());
}

#[tokio::test]
async fn test_login_by_email() {
    let service = test_service().await;
    service
        .register("bob", "bob@example.com", "pass1234", None)
        .await
        .unwrap();

    // Identifier containing '@' routes to email lookup.
    let token = login_token(&service, "bob@example.com", "pass1234").await;
    assert!(service.validate_token(&token).await.is_ok());
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let service = test_service().await;
    service
        .register("carol", "carol@example.com", "pw123456", None)
        .await
        .unwrap();

    let dup_name = service
        .register("carol", "other@example.com", "pw123456", None)
        .await;
    assert!(matches!(dup_name, Err(AuthError::Conflict(_))));

    let dup_email = service
        .register("carol2", "carol@example.com", "pw123456", None)
        .await;
    assert!(matches!(dup_email, Err(AuthError::Conflict(_))));
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_same_message() {
    let service = test_service().await;
    service
        .register("dave", "dave@example.com", "rightpass", None)
        .await
        .unwrap();

    let wrong_pw = service.login("dave", "wrongpass").await.unwrap_err();
    let no_user = service.login("nobody", "whatever").await.unwrap_err();
    assert_eq!(wrong_pw.to_string(), no_user.to_string());
}

#[tokio::test]
async fn test_forged_token_rejected() {
    let service = test_service().await;
    let user = service
        .register("erin", "erin@example.com", "pw123456", None)
        .await
        .unwrap();

    // Well-signed but never issued through the store: the revocation
    // check must reject it.
    let forged = issue(
        TokenKind::User,
        Some(user.id),
        None,
        "test-secret-key-for-testing",
        3600,
    )
    .unwrap();
    assert!(service.validate_token(&forged).await.is_err());
}

#[tokio::test]
async fn test_token_of_other_user_rejected() {
    let service = test_service().await;
    service
        .register("frank", "frank@example.com", "pw123456", None)
        .await
        .unwrap();
    let grace = service
        .register("grace", "grace@example.com", "pw123456", None)
        .await
        .unwrap();

    let frank_token = login_token(&service, "frank", "pw123456").await;

    // Re-sign frank's session under grace's id: claims and row no longer
    // agree, so validation must fail with the generic message.
    let cross = issue(
        TokenKind::User,
        Some(grace.id),
        None,
        "test-secret-key-for-testing",
        3600,
    )
    .unwrap();
    assert!(service.validate_token(&cross).await.is_err());
    assert!(service.validate_token(&frank_token).await.is_ok());
}

#[tokio::test]
async fn test_change_password_revokes_old_sessions() {
    let service = test_service().await;
    let user = service
        .register("heidi", "heidi@example.com", "oldpass1", None)
        .await
        .unwrap();

    let old_token = login_token(&service, "heidi", "oldpass1").await;
    let new_token = service
        .change_password(user.id, "oldpass1", "newpass1")
        .await
        .expect("change_password failed");

    assert!(service.validate_token(&old_token).await.is_err());
    assert!(service.validate_token(&new_token).await.is_ok());

    // Old password no longer works, new one does.
    assert!(service.login("heidi", "oldpass1").await.is_err());
    assert!(service.login("heidi", "newpass1").await.is_ok());
}

#[tokio::test]
async fn test_change_password_wrong_old_password() {
    let service = test_service().await;
    let user = service
        .register("ivan", "ivan@example.com", "pw123456", None)
        .await
        .unwrap();

    let err = service
        .change_password(user.id, "wrong", "newpass1")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));
}

#[tokio::test]
async fn test_delete_account_removes_user_and_sessions() {
    let service = test_service().await;
    let user = service
        .register("judy", "judy@example.com", "pw123456", None)
        .await
        .unwrap();
    let token = login_token(&service, "judy", "pw123456").await;

    service.delete_account(user.id).await.expect("delete failed");
    assert!(service.validate_token(&token).await.is_err());
    assert!(matches!(
        service.profile(user.id).await,
        Err(AuthError::NotFound(_))
    ));
    assert!(service.login("judy", "pw123456").await.is_err());
}

#[tokio::test]
async fn test_expired_session_token_rejected() {
    let config = warden::Config {
        session_ttl_secs: 0,
        ..test_config()
    };
    let service = test_service_with(config).await;
    service
        .register("kim", "kim@example.com", "pw123456", None)
        .await
        .unwrap();

    let token = login_token(&service, "kim", "pw123456").await;
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    assert!(service.validate_token(&token).await.is_err());
}

#[tokio::test]
async fn test_update_profile_and_conflicts() {
    let service = test_service().await;
    service
        .register("liam", "liam@example.com", "pw123456", None)
        .await
        .unwrap();
    let mia = service
        .register("mia", "mia@example.com", "pw123456", None)
        .await
        .unwrap();

    let updated = service
        .update_profile(
            mia.id,
            Some("mia2".to_string()),
            None,
            Some("https://example.com/a.png".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(updated.username, "mia2");
    assert_eq!(updated.avatar.as_deref(), Some("https://example.com/a.png"));

    let clash = service
        .update_profile(mia.id, Some("liam".to_string()), None, None)
        .await;
    assert!(matches!(clash, Err(AuthError::Conflict(_))));

    let email_clash = service
        .update_profile(mia.id, None, Some("liam@example.com".to_string()), None)
        .await;
    assert!(matches!(email_clash, Err(AuthError::Conflict(_))));
}
