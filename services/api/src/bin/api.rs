//! services/api/src/bin/api.rs

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use enhancer_api::{
    adapters::{ImageRsCodec, ImageprocEnhancer, JsonAccountStore},
    config::{Config, ConfigError, CorruptStorePolicy},
    error::ApiError,
    web::{
        self,
        rest::ApiDoc,
        state::{AppState, SessionRegistry},
    },
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Account Store ---
    let accounts = match config.on_corrupt_store {
        CorruptStorePolicy::Fail => JsonAccountStore::open(&config.accounts_path).await?,
        CorruptStorePolicy::StartEmpty => {
            JsonAccountStore::open_or_recover(&config.accounts_path).await?
        }
    };
    info!("Account store opened at {}", accounts.path().display());

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        accounts: Arc::new(accounts),
        enhancer: Arc::new(ImageprocEnhancer::new()),
        codec: Arc::new(ImageRsCodec::new()),
        sessions: Arc::new(SessionRegistry::new(chrono::Duration::minutes(
            config.session_ttl_minutes,
        ))),
        config: config.clone(),
    });

    let origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
