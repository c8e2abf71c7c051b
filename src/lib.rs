pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod lifecycle;
pub mod live;
pub mod maintenance;
pub mod models;
pub mod permissions;
pub mod reports;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    routing::get,
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::db::Database;
use crate::events::EventHub;
use crate::live::LiveStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub events: EventHub,
    pub live: LiveStore,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            events: EventHub::new(),
            live: LiveStore::new(),
        }
    }
}

/// Build the full router with middleware
pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.security.cors_origins);
    let max_body_size = state.config.server.max_body_size;

    Router::new()
        .route("/health", get(health_check))
        // Includes DB connectivity
        .route("/ready", get(ready_check))
        .nest("/api/v1", api::router())
        .route("/api/v1/stream", get(events::stream_handler))
        // Middleware layers (applied bottom to top)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

/// Run the server
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    tracing::info!(
        "Database pool: max={}, min={} connections",
        config.database.max_connections,
        config.database.min_connections
    );

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations completed successfully");

    let db = Database::new(pool);
    bootstrap::run(&db, &config).await?;

    let state = AppState::new(db, config);

    // Serve from a loaded snapshot; a failure here leaves the store Stale
    maintenance::resync(&state).await;
    maintenance::start_background_tasks(state.clone());
    tracing::info!(
        "Background tasks started (maintenance every {}s, resync every {}s)",
        state.config.maintenance.interval_secs,
        state.config.live.resync_interval_secs
    );

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("millboard listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

/// Readiness check - verifies database connectivity
async fn ready_check(State(state): State<AppState>) -> Result<&'static str, (StatusCode, &'static str)> {
    match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => Ok("ready"),
        Err(_) => Err((StatusCode::SERVICE_UNAVAILABLE, "database unavailable")),
    }
}

/// Build CORS layer from configuration
fn build_cors_layer(origins: &str) -> CorsLayer {
    if origins == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;

        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
