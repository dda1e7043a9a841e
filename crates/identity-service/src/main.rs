use identity_service::config::Config;
use identity_service::crypto::KeyManager;
use identity_service::handlers::auth_handler::AppState;
use identity_service::observability::metrics::init_metrics_recorder;
use identity_service::repositories::{PgAccessTokenStore, PgPrincipalDirectory};
use identity_service::routes;
use identity_service::services::{
    build_http_client, Every8dClient, IdentityProvider, MobileBackendClient, TokenIssuer,
    TokenVerifier, XinchuanAuthClient,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Identity Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Configuration loaded successfully");

    // Load the signing key; a bad key is fatal
    let keys = Arc::new(KeyManager::load(&config.signing_key).map_err(|e| {
        error!("Failed to load signing key: {}", e);
        e
    })?);

    info!(kid = %keys.key_id(), "Signing key loaded");

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    // Initialize database connection pool
    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    let store = Arc::new(PgAccessTokenStore::new(db_pool.clone()));
    let directory = Arc::new(PgPrincipalDirectory::new(db_pool));

    let http_client = build_http_client(config.http_timeout).map_err(|e| {
        error!("Failed to build HTTP client: {}", e);
        e
    })?;

    let mut providers: HashMap<&'static str, Arc<dyn IdentityProvider>> = HashMap::new();
    let xinchuan = XinchuanAuthClient::new(http_client.clone(), config.xinchuan_auth.clone());
    providers.insert(xinchuan.provider(), Arc::new(xinchuan));
    if let Some(mobile_backend) = &config.mobile_backend {
        let mobile = MobileBackendClient::new(http_client.clone(), mobile_backend.clone());
        providers.insert(mobile.provider(), Arc::new(mobile));
    }
    info!(providers = ?providers.keys().collect::<Vec<_>>(), "Identity providers configured");

    let sms = config.every8d.as_ref().map(|every8d| {
        info!("SMS gateway configured");
        Arc::new(Every8dClient::new(http_client.clone(), every8d))
    });

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        issuer: TokenIssuer::new(keys.clone(), store.clone()),
        verifier: TokenVerifier::new(keys.clone(), store, directory.clone()),
        keys,
        directory,
        providers,
        sms,
        config,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Identity Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
