//! Integration tests for bearer token validation on protected routes
//!
//! Every rejection is exercised through `GET /auth/admin`, so the error
//! codes checked here are exactly what clients see.

use common::jwt::{decode_claims, split_token};
use identity_service::models::{AccessClaims, Principal, TokenId};
use identity_test_utils::*;
use reqwest::StatusCode;
use serde_json::Value;

/// Status and error code of `GET /auth/admin` with `token`.
async fn probe(server: &TestIdentityServer, token: &str) -> Result<(StatusCode, String), anyhow::Error> {
    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .bearer_auth(token)
        .send()
        .await?;
    let status = response.status();
    if status.is_success() {
        return Ok((status, String::new()));
    }
    let body: Value = response.json().await?;
    let code = body["error"]["code"].as_str().unwrap_or_default().to_string();
    Ok((status, code))
}

fn token_id(token: &str) -> Result<TokenId, anyhow::Error> {
    let segments = split_token(token)?;
    let claims: AccessClaims = decode_claims(segments.payload)?;
    TokenId::parse(&claims.jti).ok_or_else(|| anyhow::anyhow!("jti is not a token id"))
}

async fn spawn_with_alice() -> Result<(TestIdentityServer, String), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.directory().add_admin(alice());
    let token = server.issue_token(&Principal::Admin(alice())).await?;
    Ok((server, token))
}

#[tokio::test]
async fn test_issued_token_is_accepted() -> Result<(), anyhow::Error> {
    let (server, token) = spawn_with_alice().await?;

    let (status, _) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_garbage_token_is_malformed() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;

    for garbage in ["not-a-jwt", "a.b", "a.b.c.d", "!!!.???.###"] {
        let (status, code) = probe(&server, garbage).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {:?}", garbage);
        assert_eq!(code, "MALFORMED_TOKEN", "token {:?}", garbage);
    }
    Ok(())
}

#[tokio::test]
async fn test_oversized_token_is_malformed() -> Result<(), anyhow::Error> {
    let (server, token) = spawn_with_alice().await?;
    let oversized = format!("{}{}", token, "A".repeat(common::jwt::MAX_JWT_SIZE_BYTES));

    let (status, code) = probe(&server, &oversized).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "MALFORMED_TOKEN");
    Ok(())
}

/// Changing the payload invalidates the signature, even when the new
/// claims would otherwise be acceptable.
#[tokio::test]
async fn test_tampered_payload_is_bad_signature() -> Result<(), anyhow::Error> {
    let (server, token) = spawn_with_alice().await?;
    let segments = split_token(&token)?;
    let mut claims: AccessClaims = decode_claims(segments.payload)?;
    claims.exp += 86_400;

    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let header = token.split('.').next().unwrap_or_default();
    let forged = format!("{}.{}.{}", header, forged_payload, segments.signature);

    let (status, code) = probe(&server, &forged).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "BAD_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn test_unsigned_token_is_bad_signature() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;
    let token = TestTokenBuilder::new().for_admin(TEST_ADMIN_ALICE).unsigned();

    let (status, code) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "BAD_SIGNATURE");
    Ok(())
}

/// HS256 with the public key as the HMAC secret must not verify.
#[tokio::test]
async fn test_algorithm_confusion_is_bad_signature() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;
    let jwks = serde_json::to_vec(&server.keys().jwks())?;
    let token = TestTokenBuilder::new()
        .for_admin(TEST_ADMIN_ALICE)
        .sign_hs256(&jwks);

    let (status, code) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "BAD_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn test_token_from_other_key_is_bad_signature() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;
    let token = TestTokenBuilder::new()
        .for_admin(TEST_ADMIN_ALICE)
        .sign_with(&alternate_key_manager());

    let (status, code) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "BAD_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;
    let token = TestTokenBuilder::new()
        .for_admin(TEST_ADMIN_ALICE)
        .issued_at(0)
        .expires_in(-60)
        .sign_with(server.keys());

    let (status, code) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "TOKEN_EXPIRED");
    Ok(())
}

/// A correctly signed token the service never recorded is not accepted.
#[tokio::test]
async fn test_unrecorded_token_is_revoked() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;
    let token = TestTokenBuilder::new()
        .for_admin(TEST_ADMIN_ALICE)
        .sign_with(server.keys());

    let (status, code) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "TOKEN_REVOKED");
    Ok(())
}

#[tokio::test]
async fn test_non_uuid_jti_is_malformed() -> Result<(), anyhow::Error> {
    let (server, _) = spawn_with_alice().await?;
    let token = TestTokenBuilder::new()
        .for_admin(TEST_ADMIN_ALICE)
        .with_jti("session-1")
        .sign_with(server.keys());

    let (status, code) = probe(&server, &token).await?;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "MALFORMED_TOKEN");
    Ok(())
}

/// Deleting the record out of band (e.g. an operator purge) revokes the token.
#[tokio::test]
async fn test_purged_record_revokes_token() -> Result<(), anyhow::Error> {
    let (server, token) = spawn_with_alice().await?;
    let id = token_id(&token)?;
    assert!(server.store().contains(&id));

    server.store().purge(&id);

    let (status, code) = probe(&server, &token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "TOKEN_REVOKED");
    Ok(())
}

#[tokio::test]
async fn test_deactivation_after_issue_rejects_token() -> Result<(), anyhow::Error> {
    let (server, token) = spawn_with_alice().await?;

    server.directory().deactivate_admin(TEST_ADMIN_ALICE);

    let (status, code) = probe(&server, &token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "UNKNOWN_SUBJECT");
    Ok(())
}

#[tokio::test]
async fn test_removed_system_rejects_token() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    let system = test_system(TEST_SYSTEM_REPORTING);
    server.directory().add_system(system.clone(), TEST_SYSTEM_SECRET);
    let token = server.issue_token(&Principal::System(system)).await?;

    server.directory().remove_system(TEST_SYSTEM_REPORTING);

    let response = reqwest::Client::new()
        .get(format!("{}/auth/system", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "UNKNOWN_SUBJECT");
    Ok(())
}

/// The bearer scheme is matched case-insensitively.
#[tokio::test]
async fn test_lowercase_bearer_scheme() -> Result<(), anyhow::Error> {
    let (server, token) = spawn_with_alice().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/auth/admin", server.url()))
        .header("Authorization", format!("bearer {}", token))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
