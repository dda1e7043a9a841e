//! Integration tests for admin login, profile and logout
//!
//! Both identity providers are served by a single wiremock server; the
//! router, middleware and token services are the production ones.

use identity_service::models::{SubjectKind, PROVIDER_MOBILE_BACKEND, PROVIDER_XINCHUAN_AUTH};
use identity_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_xinchuan_user(provider: &MockServer, code: &str, user_id: Value) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains(format!("code={}", code)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "upstream-token",
            "user": { "id": user_id, "name": "Test Admin" }
        })))
        .mount(provider)
        .await;
}

async fn login(server: &TestIdentityServer, provider: &str, code: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/auth/admin", server.url()))
        .json(&json!({ "provider": provider, "code": code }))
        .send()
        .await
        .expect("login request")
}

async fn error_code(response: reqwest::Response) -> Result<String, anyhow::Error> {
    let body: Value = response.json().await?;
    Ok(body["error"]["code"].as_str().unwrap_or_default().to_string())
}

async fn login_alice(server: &TestIdentityServer, provider: &MockServer) -> String {
    mount_xinchuan_user(provider, TEST_AUTH_CODE_ALICE, json!(4242)).await;
    let response = login(server, PROVIDER_XINCHUAN_AUTH, TEST_AUTH_CODE_ALICE).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("token response");
    body["access_token"]
        .as_str()
        .expect("access_token")
        .to_string()
}

#[tokio::test]
async fn test_admin_login_via_primary_provider() -> Result<(), anyhow::Error> {
    // Arrange
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    server.directory().add_admin(alice());
    mount_xinchuan_user(&provider, TEST_AUTH_CODE_ALICE, json!(4242)).await;

    // Act
    let response = login(&server, PROVIDER_XINCHUAN_AUTH, TEST_AUTH_CODE_ALICE).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["expires_at"].is_string());

    let token = body["access_token"].as_str().unwrap_or_default().to_string();
    token
        .assert_valid_jwt()
        .assert_signed_by(server.keys().key_id())
        .assert_kind(SubjectKind::Admin)
        .assert_for_subject(&TEST_ADMIN_ALICE.to_string())
        .assert_expires_in(3600);

    assert_eq!(server.store().len(), 1, "issuance must persist one record");
    Ok(())
}

#[tokio::test]
async fn test_admin_login_via_mobile_backend() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    server.directory().add_admin(test_admin(
        TEST_ADMIN_BOB,
        PROVIDER_MOBILE_BACKEND,
        TEST_MOBILE_SUBJECT_BOB,
    ));

    Mock::given(method("POST"))
        .and(path("/auth/verify"))
        .and(header("X-Api-Secret", TEST_MOBILE_BACKEND_SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": TEST_MOBILE_SUBJECT_BOB
        })))
        .expect(1)
        .mount(&provider)
        .await;

    let response = login(&server, PROVIDER_MOBILE_BACKEND, TEST_DEVICE_TOKEN_BOB).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    let token = body["access_token"].as_str().unwrap_or_default().to_string();
    token.assert_for_subject(&TEST_ADMIN_BOB.to_string());
    Ok(())
}

/// A valid external identity that no admin is linked to is not a login.
#[tokio::test]
async fn test_unlinked_identity_is_rejected() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    mount_xinchuan_user(&provider, "someone-else", json!(9999)).await;

    let response = login(&server, PROVIDER_XINCHUAN_AUTH, "someone-else").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "INVALID_CREDENTIALS");
    assert!(server.store().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_deactivated_admin_cannot_log_in() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    server.directory().add_admin(test_admin(
        TEST_ADMIN_DEACTIVATED,
        PROVIDER_XINCHUAN_AUTH,
        TEST_XINCHUAN_SUBJECT_DEACTIVATED,
    ));
    server.directory().deactivate_admin(TEST_ADMIN_DEACTIVATED);
    mount_xinchuan_user(&provider, "code-deactivated", json!("4343")).await;

    let response = login(&server, PROVIDER_XINCHUAN_AUTH, "code-deactivated").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "INVALID_CREDENTIALS");
    Ok(())
}

#[tokio::test]
async fn test_unsupported_provider_is_bad_request() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = login(&server, "facebook", "whatever").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await?, "UNSUPPORTED_PROVIDER");
    Ok(())
}

#[tokio::test]
async fn test_provider_rejection_is_unauthorized() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Authorization code expired"
        })))
        .mount(&provider)
        .await;

    let response = login(&server, PROVIDER_XINCHUAN_AUTH, "stale-code").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "PROVIDER_REJECTED");
    Ok(())
}

#[tokio::test]
async fn test_provider_outage_is_bad_gateway() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&provider)
        .await;

    let response = login(&server, PROVIDER_XINCHUAN_AUTH, TEST_AUTH_CODE_ALICE).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await?, "PROVIDER_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn test_get_admin_returns_profile() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    server.directory().add_admin(alice());
    let token = login_alice(&server, &provider).await;

    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["id"], TEST_ADMIN_ALICE.to_string());
    assert_eq!(body["provider"], PROVIDER_XINCHUAN_AUTH);
    Ok(())
}

/// Logout deletes the record; the same token is refused afterwards.
#[tokio::test]
async fn test_logout_revokes_token() -> Result<(), anyhow::Error> {
    let provider = MockServer::start().await;
    let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
    server.directory().add_admin(alice());
    let token = login_alice(&server, &provider).await;
    let client = reqwest::Client::new();

    let logout = client
        .delete(format!("{}/auth/admin", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);
    assert!(server.store().is_empty());

    let after = client
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(after).await?, "TOKEN_REVOKED");
    Ok(())
}

/// Logging out one session leaves other sessions of the same admin intact.
#[tokio::test]
async fn test_logout_only_revokes_presented_token() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.directory().add_admin(alice());
    let principal = identity_service::models::Principal::Admin(alice());
    let first = server.issue_token(&principal).await?;
    let second = server.issue_token(&principal).await?;
    let client = reqwest::Client::new();

    client
        .delete(format!("{}/auth/admin", server.url()))
        .bearer_auth(&first)
        .send()
        .await?;

    let response = client
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(&second)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_system_token_forbidden_on_admin_route() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let system = test_system(TEST_SYSTEM_BILLING);
    server.directory().add_system(system.clone(), TEST_SYSTEM_SECRET);
    let token = server
        .issue_token(&identity_service::models::Principal::System(system))
        .await?;

    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response).await?, "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn test_missing_authorization_header() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/auth/admin", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "AUTHENTICATION_REQUIRED");

    let response = client
        .get(format!("{}/auth/admin", server.url()))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "AUTHENTICATION_REQUIRED");
    Ok(())
}
