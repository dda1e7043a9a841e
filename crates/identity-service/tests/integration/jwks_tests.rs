//! Integration tests for public key discovery

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use identity_service::models::{Jwks, Principal};
use identity_test_utils::{alice, TestIdentityServer, TokenAssertions};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;

#[tokio::test]
async fn test_jwks_returns_single_rsa_key() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;

    let response = reqwest::get(format!("{}/.well-known/jwks.json", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("max-age=3600")
    );

    let jwks: Jwks = response.json().await?;
    assert_eq!(jwks.keys.len(), 1);
    let key = jwks
        .keys
        .first()
        .ok_or_else(|| anyhow::anyhow!("JWKS has no keys"))?;
    assert_eq!(key.kty, "RSA");
    assert_eq!(key.alg, "RS256");
    assert_eq!(key.use_, "sig");
    assert_eq!(key.kid, server.keys().key_id());
    assert_eq!(URL_SAFE_NO_PAD.decode(&key.e)?, vec![0x01, 0x00, 0x01]);

    Ok(())
}

/// An external verifier holding only the published key can check our tokens.
#[tokio::test]
async fn test_published_key_verifies_issued_tokens() -> Result<(), anyhow::Error> {
    let server = TestIdentityServer::spawn().await?;
    server.directory().add_admin(alice());
    let token = server.issue_token(&Principal::Admin(alice())).await?;

    let jwks: Jwks = reqwest::get(format!("{}/.well-known/jwks.json", server.url()))
        .await?
        .json()
        .await?;
    let key = jwks
        .keys
        .first()
        .ok_or_else(|| anyhow::anyhow!("JWKS has no keys"))?;

    token.assert_valid_jwt().assert_signed_by(&key.kid);
    assert_eq!(decode_header(&token)?.kid.as_deref(), Some(key.kid.as_str()));

    let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    let data = decode::<serde_json::Value>(&token, &decoding_key, &validation)?;
    assert_eq!(data.claims["kind"], "admin");

    Ok(())
}
