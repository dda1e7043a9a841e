//! Revocation store failures
//!
//! A store outage must never produce a token the store does not know about,
//! and must never be reported to clients as a credential problem.

use identity_service::models::Principal;
use identity_test_utils::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn error_code(response: reqwest::Response) -> Result<String, anyhow::Error> {
    let body: Value = response.json().await?;
    Ok(body["error"]["code"].as_str().unwrap_or_default().to_string())
}

/// Issuance fails closed: no token is returned and nothing is recorded.
#[tokio::test]
async fn test_login_fails_when_record_cannot_be_written() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestIdentityServer::spawn().await?;
    server
        .directory()
        .add_system(test_system(TEST_SYSTEM_BILLING), TEST_SYSTEM_SECRET);
    server.store().fail_inserts(true);

    // Act
    let response = reqwest::Client::new()
        .post(format!("{}/auth/system", server.url()))
        .json(&json!({
            "system_id": TEST_SYSTEM_BILLING.to_string(),
            "secret_key": TEST_SYSTEM_SECRET
        }))
        .send()
        .await?;

    // Assert
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "DATABASE_ERROR");
    assert!(body.get("access_token").is_none());
    assert!(server.store().is_empty());
    Ok(())
}

/// Once the store recovers, issuance works again without a restart.
#[tokio::test]
async fn test_login_recovers_after_store_outage() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.directory().add_admin(alice());
    let principal = Principal::Admin(alice());

    server.store().fail_inserts(true);
    assert!(server.issue_token(&principal).await.is_err());

    server.store().fail_inserts(false);
    let token = server.issue_token(&principal).await?;

    token.assert_valid_jwt();
    assert_eq!(server.store().len(), 1);
    Ok(())
}

/// A lookup failure is a server error, not a revoked token.
#[tokio::test]
async fn test_lookup_failure_is_server_error() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.directory().add_admin(alice());
    let token = server.issue_token(&Principal::Admin(alice())).await?;
    server.store().fail_finds(true);

    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(response).await?, "DATABASE_ERROR");

    server.store().fail_finds(false);
    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

/// Structural checks happen before the store is consulted.
#[tokio::test]
async fn test_bad_tokens_rejected_without_store() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.store().fail_finds(true);

    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "MALFORMED_TOKEN");
    Ok(())
}
