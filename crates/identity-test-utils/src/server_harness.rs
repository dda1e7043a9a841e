//! Test server harness for E2E testing
//!
//! Provides TestIdentityServer for spawning real identity service instances
//! in tests. The router, middleware and services are the production ones;
//! only persistence is swapped for the in-memory stores.

use crate::crypto_fixtures::{signing_key_secret, test_key_manager, SIGNING_KEY_PKCS8_PEM};
use crate::stores::{InMemoryAccessTokenStore, InMemoryPrincipalDirectory};
use crate::test_ids::{
    TEST_MOBILE_BACKEND_SECRET, TEST_XINCHUAN_CALLBACK, TEST_XINCHUAN_CLIENT_ID,
    TEST_XINCHUAN_CLIENT_SECRET,
};
use chrono::{Duration, Utc};
use common::secret::SecretString;
use identity_service::config::{
    Config, MobileBackendConfig, XinchuanAuthConfig, DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
};
use identity_service::crypto::KeyManager;
use identity_service::handlers::auth_handler::AppState;
use identity_service::models::Principal;
use identity_service::observability::metrics::init_metrics_recorder;
use identity_service::routes;
use identity_service::services::{
    build_http_client, IdentityProvider, MobileBackendClient, TokenIssuer, TokenVerifier,
    XinchuanAuthClient,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the identity service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_flow() -> Result<()> {
///     let provider = MockServer::start().await;
///     let server = TestIdentityServer::spawn_with_providers(&provider.uri()).await?;
///     server.directory().add_admin(alice());
///
///     let response = reqwest::Client::new()
///         .post(format!("{}/auth/admin", server.url()))
///         .json(&json!({"provider": "xinchuan-auth", "code": "..."}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestIdentityServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    keys: Arc<KeyManager>,
    store: Arc<InMemoryAccessTokenStore>,
    directory: Arc<InMemoryPrincipalDirectory>,
    _handle: JoinHandle<()>,
}

impl TestIdentityServer {
    /// Spawn a server whose identity providers point at an unroutable address.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_providers("http://127.0.0.1:9").await
    }

    /// Spawn a server with both identity providers rooted at `provider_base_url`
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Sign with the deterministic fixture key
    /// - Start the HTTP server in the background
    pub async fn spawn_with_providers(provider_base_url: &str) -> Result<Self, anyhow::Error> {
        let config = test_config(provider_base_url);
        let keys = test_key_manager();
        let store = Arc::new(InMemoryAccessTokenStore::new());
        let directory = Arc::new(InMemoryPrincipalDirectory::new());

        let http_client = build_http_client(config.http_timeout)
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let mut providers: HashMap<&'static str, Arc<dyn IdentityProvider>> = HashMap::new();
        let xinchuan = XinchuanAuthClient::new(http_client.clone(), config.xinchuan_auth.clone());
        providers.insert(xinchuan.provider(), Arc::new(xinchuan));
        if let Some(mobile_backend) = &config.mobile_backend {
            let mobile = MobileBackendClient::new(http_client, mobile_backend.clone());
            providers.insert(mobile.provider(), Arc::new(mobile));
        }

        let state = Arc::new(AppState {
            issuer: TokenIssuer::new(keys.clone(), store.clone()),
            verifier: TokenVerifier::new(keys.clone(), store.clone(), directory.clone()),
            keys: keys.clone(),
            directory: directory.clone(),
            providers,
            sms: None,
            config,
        });

        // A recorder may already be installed by another test in this
        // process; fall back to a standalone one.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            keys,
            store,
            directory,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// Revocation store backing the server
    pub fn store(&self) -> &InMemoryAccessTokenStore {
        &self.store
    }

    /// Principal directory backing the server
    pub fn directory(&self) -> &InMemoryPrincipalDirectory {
        &self.directory
    }

    /// Issue a token for `principal` through the real issuer
    pub async fn issue_token(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        let issued = self
            .state
            .issuer
            .issue(principal, Utc::now() + Duration::hours(1))
            .await?;
        Ok(issued.token)
    }
}

impl Drop for TestIdentityServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Configuration used by the harness; both providers share `provider_base_url`.
pub fn test_config(provider_base_url: &str) -> Config {
    Config {
        database_url: String::new(), // In-memory stores; never connected
        bind_address: "127.0.0.1:0".to_string(),
        signing_key: signing_key_secret(SIGNING_KEY_PKCS8_PEM),
        access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        http_timeout: std::time::Duration::from_secs(2),
        xinchuan_auth: XinchuanAuthConfig {
            base_url: provider_base_url.to_string(),
            client_id: TEST_XINCHUAN_CLIENT_ID.to_string(),
            client_secret: SecretString::from(TEST_XINCHUAN_CLIENT_SECRET.to_string()),
            callback: TEST_XINCHUAN_CALLBACK.to_string(),
        },
        mobile_backend: Some(MobileBackendConfig {
            base_url: provider_base_url.to_string(),
            secret: SecretString::from(TEST_MOBILE_BACKEND_SECRET.to_string()),
        }),
        every8d: None,
    }
}
