//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use lectern_agent::QueryEngine;
use lectern_core::config::GatewayConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(engine: Arc<QueryEngine>) -> Self {
        Self {
            engine,
            start_time: std::time::Instant::now(),
        }
    }
}

fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    // Example: LECTERN_CORS_ORIGINS=https://courses.example.com,https://admin.example.com
    if let Ok(origins) = std::env::var("LECTERN_CORS_ORIGINS") {
        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();
        cors.allow_origin(origins)
    } else {
        cors.allow_origin(Any)
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/query", post(super::routes::query))
        .route("/api/clear-session", post(super::routes::clear_session))
        .route("/api/courses", get(super::routes::course_stats))
        .route("/api/health", get(super::routes::health_check))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve until the process is stopped.
pub async fn start(config: &GatewayConfig, engine: Arc<QueryEngine>) -> anyhow::Result<()> {
    let app = build_router(AppState::new(engine));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Lectern gateway listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
