//! PDF Pages Server
//!
//! Issues single-use, time-limited access keys that let a headless
//! renderer log in as a user for exactly one page fetch, converts the
//! fetched page to PDF and stores the result in S3-compatible storage.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod convert;
mod db;
mod error;
mod keys;
mod routes;
mod session;
mod state;
mod storage;
mod users;

use config::Config;
use keys::KeyStore;
use session::SessionStore;
use state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pdfpages_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting PDF Pages Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Public URL: {}", config.server.public_url);
    tracing::info!("Access key TTL: {}s", config.keys.ttl_seconds);

    // Initialize blob storage
    let store = storage::from_config(&config.storage)
        .await
        .expect("Failed to initialize blob storage");

    // Initialize database
    let db_pool = db::create_pool(&config.database.url)
        .await
        .expect("Failed to initialize database");
    tracing::info!("Database initialized at {}", config.database.url);

    let enabled: Vec<&str> = convert::available_converters(&config.converters)
        .iter()
        .map(|c| c.name())
        .collect();
    if enabled.is_empty() {
        tracing::warn!("No converter binaries configured; conversion requests will fail");
    } else {
        tracing::info!("Enabled converters: {}", enabled.join(", "));
    }

    // Create application state
    let app_state = AppState::new(config.clone(), db_pool.clone(), store);

    // Reap keys that expired without being consumed and sessions that
    // escaped their conversion's teardown
    let purge_pool = db_pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let now = chrono::Utc::now().timestamp();
            match KeyStore::new(&purge_pool).purge_expired(now).await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Reaped expired access keys"),
                Err(e) => tracing::warn!("Failed to purge expired keys: {}", e),
            }
            match SessionStore::new(&purge_pool).purge_expired(now).await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Reaped expired sessions"),
                Err(e) => tracing::warn!("Failed to purge expired sessions: {}", e),
            }
        }
    });

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(routes::proxy::router())
        .nest("/api/v1", routes::convert::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("PDF Pages Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    tracing::info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
