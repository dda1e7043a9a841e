//! Integration tests for system (machine account) login, profile and logout

use identity_service::models::SubjectKind;
use identity_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn system_login(
    server: &TestIdentityServer,
    system_id: &str,
    secret_key: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(reqwest::Client::new()
        .post(format!("{}/auth/system", server.url()))
        .json(&json!({ "system_id": system_id, "secret_key": secret_key }))
        .send()
        .await?)
}

async fn spawn_with_billing() -> Result<TestIdentityServer, anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server
        .directory()
        .add_system(test_system(TEST_SYSTEM_BILLING), TEST_SYSTEM_SECRET);
    Ok(server)
}

#[tokio::test]
async fn test_system_login_success() -> Result<(), anyhow::Error> {
    // Arrange
    let server = spawn_with_billing().await?;

    // Act
    let response = system_login(
        &server,
        &TEST_SYSTEM_BILLING.to_string(),
        TEST_SYSTEM_SECRET,
    )
    .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["token_type"], "Bearer");

    let token = body["access_token"].as_str().unwrap_or_default().to_string();
    token
        .assert_valid_jwt()
        .assert_signed_by(server.keys().key_id())
        .assert_kind(SubjectKind::System)
        .assert_for_subject(&TEST_SYSTEM_BILLING.to_string());

    assert_eq!(server.store().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_system_login_wrong_secret() -> Result<(), anyhow::Error> {
    let server = spawn_with_billing().await?;

    let response = system_login(&server, &TEST_SYSTEM_BILLING.to_string(), "wrong-secret").await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
    assert!(server.store().is_empty());
    Ok(())
}

/// Unknown ids and wrong secrets are indistinguishable to the caller.
#[tokio::test]
async fn test_system_login_unknown_id_matches_wrong_secret() -> Result<(), anyhow::Error> {
    let server = spawn_with_billing().await?;

    let unknown = system_login(
        &server,
        &TEST_SYSTEM_REPORTING.to_string(),
        TEST_SYSTEM_SECRET,
    )
    .await?;
    let wrong = system_login(&server, &TEST_SYSTEM_BILLING.to_string(), "wrong-secret").await?;

    assert_eq!(unknown.status(), wrong.status());
    let unknown_body: Value = unknown.json().await?;
    let wrong_body: Value = wrong.json().await?;
    assert_eq!(unknown_body, wrong_body);
    Ok(())
}

#[tokio::test]
async fn test_system_login_non_uuid_id() -> Result<(), anyhow::Error> {
    let server = spawn_with_billing().await?;

    let response = system_login(&server, "billing", TEST_SYSTEM_SECRET).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_system_login_missing_fields() -> Result<(), anyhow::Error> {
    let server = spawn_with_billing().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/auth/system", server.url()))
        .json(&json!({ "system_id": TEST_SYSTEM_BILLING.to_string() }))
        .send()
        .await?;

    assert!(response.status().is_client_error());
    assert!(server.store().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_get_system_and_logout() -> Result<(), anyhow::Error> {
    let server = spawn_with_billing().await?;
    let client = reqwest::Client::new();

    let login: Value = system_login(
        &server,
        &TEST_SYSTEM_BILLING.to_string(),
        TEST_SYSTEM_SECRET,
    )
    .await?
    .json()
    .await?;
    let token = login["access_token"].as_str().unwrap_or_default().to_string();

    let profile = client
        .get(format!("{}/auth/system", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(profile.status(), StatusCode::OK);
    let body: Value = profile.json().await?;
    assert_eq!(body["id"], TEST_SYSTEM_BILLING.to_string());
    assert_eq!(body["organization_id"], TEST_ORG_XINCHUAN.to_string());

    let logout = client
        .delete(format!("{}/auth/system", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after = client
        .get(format!("{}/auth/system", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
    let body: Value = after.json().await?;
    assert_eq!(body["error"]["code"], "TOKEN_REVOKED");
    Ok(())
}

#[tokio::test]
async fn test_admin_token_forbidden_on_system_route() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.directory().add_admin(alice());
    let token = server
        .issue_token(&identity_service::models::Principal::Admin(alice()))
        .await?;

    let response = reqwest::Client::new()
        .delete(format!("{}/auth/system", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.store().len(), 1, "forbidden logout must not revoke");
    Ok(())
}
