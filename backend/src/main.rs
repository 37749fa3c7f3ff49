use axum::{
    routing::{get, post},
    Router,
};
use dispatcher::{
    db::{self, PgBatchLogSink, PgClaimLedger},
    handlers::{self, AppState},
    services::{BatchProcessor, ClaimService, ContractService, NeynarClient, TokenService, WalletPool},
    store::{LockStore, RedisLockStore},
    utils, Config, get_db_pool,
};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, Any};
use axum::http::{Method, HeaderValue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let config = Config::from_env()?;
    let pool = get_db_pool(&config.database).await?;

    // Run migrations
    db::migrations::run_migrations(&pool).await?;

    let store: Arc<dyn LockStore> = Arc::new(RedisLockStore::connect(&config.redis_url).await?);
    let state = build_state(&config, store, pool)?;

    let port = config.port;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Server running on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_state(config: &Config, store: Arc<dyn LockStore>, pool: dispatcher::PgPool) -> anyhow::Result<AppState> {
    let wallet_pool = Arc::new(WalletPool::from_entries(
        store.clone(),
        &config.wallets,
        config.disabled_purposes.iter().copied(),
    )?);
    let tokens = Arc::new(TokenService::new(config.token_hmac_secret.as_bytes(), store.clone())?);
    let contract = Arc::new(ContractService::new(config.rpc_url.clone())?);

    let claims = ClaimService::new(
        tokens.clone(),
        wallet_pool,
        contract,
        Arc::new(PgClaimLedger::new(pool.clone())),
    );
    let batches = BatchProcessor::new(
        store,
        Arc::new(NeynarClient::new(config.neynar_api_key.clone())),
        Arc::new(PgBatchLogSink::new(pool)),
    );

    Ok(AppState {
        tokens,
        claims: Arc::new(claims),
        batches: Arc::new(batches),
        internal_api_secret: Arc::from(config.internal_api_secret.as_str()),
    })
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Identity verifier hands out one-time tokens here
        .route("/api/miniapp/token", post(handlers::issue_token))
        .route("/api/claim", post(handlers::claim_airdrop))
        // Engagement batches
        .route("/api/engagement/batches", post(handlers::enqueue_batch))
        .route("/api/engagement/process", post(handlers::process_batches))
        .layer(create_cors_layer())
        .with_state(state)
}

fn create_cors_layer() -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    // Check if ALLOWED_ORIGINS environment variable is set for multiple domains
    if let Ok(cors_origins) = std::env::var("ALLOWED_ORIGINS") {
        let origins: Vec<HeaderValue> = cors_origins
            .split(',')
            .filter_map(|origin| {
                let trimmed = origin.trim();
                if !trimmed.is_empty() {
                    trimmed.parse().ok()
                } else {
                    None
                }
            })
            .collect();

        if !origins.is_empty() {
            cors = cors.allow_origin(origins);
        } else {
            cors = cors.allow_origin(Any);
        }
    } else {
        // Default to permissive for development
        cors = cors.allow_origin(Any);
    }

    cors
}

async fn health_check() -> &'static str {
    "OK"
}
