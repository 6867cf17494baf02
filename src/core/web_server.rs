//! HTTP server for health checks and Prometheus scraping.
//!
//! Runs on METRICS_PORT (default 9090) next to the bot:
//! - `/health`  - liveness plus a database ping
//! - `/metrics` - Prometheus text exposition

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::storage::db::DbPool;
use crate::storage::get_connection;

#[derive(Clone)]
struct WebState {
    db: Arc<DbPool>,
    start_time: Instant,
}

pub fn router(db: Arc<DbPool>) -> Router {
    let state = WebState {
        db,
        start_time: Instant::now(),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Start the health/metrics server. Returns only on bind or serve failure.
pub async fn start_web_server(port: u16, db: Arc<DbPool>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /health  - Health check");
    log::info!("  /metrics - Prometheus metrics");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router(db)).await?;

    Ok(())
}

async fn health_handler(State(state): State<WebState>) -> Response {
    let database_ok = get_connection(&state.db)
        .map(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok())
        .unwrap_or(false);

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "database": database_ok,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": "refmarket-bot",
        "version": env!("CARGO_PKG_VERSION"),
    });

    (status, Json(body)).into_response()
}

async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response(),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}
