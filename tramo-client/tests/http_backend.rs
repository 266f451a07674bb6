use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tramo_client::HttpBackend;
use tramo_core::{AuthBackend, AuthError, LoginOutcome, RecoveryMethod};

async fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(&server.uri()).unwrap()
}

#[tokio::test]
async fn test_login_reports_pending_second_factor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_partial_json(json!({ "email": "ana@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "requires2FA": true, "tempToken": "tmp-123" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = backend(&server)
        .await
        .login("ana@example.com", "Valid1!@")
        .await
        .unwrap();
    match outcome {
        LoginOutcome::TwoFactorRequired { temp_token } => assert_eq!(temp_token, "tmp-123"),
        other => panic!("expected a pending second factor, got {other:?}"),
    }
}

#[tokio::test]
async fn test_login_without_second_factor_establishes_directly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "token": "session-token",
                "user": {
                    "id": "u1",
                    "email": "ana@example.com",
                    "name": "Ana",
                    "role": "CLIENTE"
                }
            }
        })))
        .mount(&server)
        .await;

    let outcome = backend(&server)
        .await
        .login("ana@example.com", "Valid1!@")
        .await
        .unwrap();
    match outcome {
        LoginOutcome::Established(verified) => {
            assert_eq!(verified.credential, "session-token");
            assert_eq!(verified.user.email, "ana@example.com");
        }
        other => panic!("expected an established session, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejection_carries_message_and_attempts_left() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/verify-2fa"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "Incorrect code",
            "attemptsLeft": 2
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .await
        .verify_two_factor("tmp-123", "000000")
        .await
        .unwrap_err();
    match &err {
        AuthError::Rejected {
            message,
            attempts_left,
        } => {
            assert_eq!(message, "Incorrect code");
            assert_eq!(*attempts_left, Some(2));
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(err.user_message().contains("Attempts left: 2"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_server_fault_maps_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "error": "boom"
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .await
        .login("ana@example.com", "Valid1!@")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_transport_failure_maps_to_unavailable() {
    // nothing listening on this port
    let backend = HttpBackend::new("http://127.0.0.1:9").unwrap();
    let err = backend.login("ana@example.com", "Valid1!@").await.unwrap_err();
    assert!(matches!(err, AuthError::Unavailable(_)));
}

#[tokio::test]
async fn test_forgot_password_without_data_stays_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_partial_json(json!({ "method": "code" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true
        })))
        .mount(&server)
        .await;

    let challenge = backend(&server)
        .await
        .forgot_password("ana@example.com", RecoveryMethod::Code)
        .await
        .unwrap();
    assert!(challenge.temp_token.is_none());
    assert!(challenge.question.is_none());
    assert!(!challenge.message.is_empty());
}

#[tokio::test]
async fn test_forgot_password_surfaces_security_question() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_partial_json(json!({ "method": "security_question" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Answer your security question",
            "data": {
                "tempToken": "sec-token",
                "securityQuestion": "First pet?"
            }
        })))
        .mount(&server)
        .await;

    let challenge = backend(&server)
        .await
        .forgot_password("ana@example.com", RecoveryMethod::SecurityQuestion)
        .await
        .unwrap();
    assert_eq!(challenge.temp_token.as_deref(), Some("sec-token"));
    assert_eq!(challenge.question.as_deref(), Some("First pet?"));
}

#[tokio::test]
async fn test_reset_link_check_uses_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/verify-reset-id/link-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "isValid": true, "tempToken": "reset-tmp" }
        })))
        .mount(&server)
        .await;

    let check = backend(&server)
        .await
        .verify_reset_token("link-42")
        .await
        .unwrap();
    assert!(check.is_valid);
    assert_eq!(check.temp_token.as_deref(), Some("reset-tmp"));
}

#[tokio::test]
async fn test_credential_rides_as_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "user": {
                    "id": "u1",
                    "email": "ana@example.com",
                    "name": "Ana",
                    "role": "ADMIN"
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    backend.set_credential("session-token");
    let user = backend.profile().await.unwrap();
    assert_eq!(user.name, "Ana");
}

#[tokio::test]
async fn test_refresh_rotates_the_stored_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": "fresh-token" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend(&server).await;
    let token = backend.refresh_token().await.unwrap();
    assert_eq!(token, "fresh-token");
    backend.logout().await.unwrap();
}
