//! Health and introspection HTTP surface
//!
//! Aggregate degraded states become externally visible here as a 503; no
//! connection task ever crashes the process over them.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use crate::provider::binance::IngestStats;
use crate::publisher::TradeSink;
use crate::symbol::PairUniverse;

/// Number of pairs echoed in the stats sample.
const PAIRS_SAMPLE: usize = 10;

/// Shared state behind the HTTP surface.
#[derive(Clone)]
pub struct HealthState {
    /// Publisher handle; `None` until initialization succeeds
    pub publisher: Option<Arc<dyn TradeSink>>,
    /// Ingestion counters
    pub ingest: Arc<IngestStats>,
    /// Current working set
    pub universe: Arc<PairUniverse>,
}

/// Build the router for the health surface.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/pairs", get(pairs))
        .with_state(state)
}

/// Serve the health surface until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: HealthState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    info!("health surface listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
}

async fn health(State(state): State<HealthState>) -> Response {
    let publisher = match state.publisher {
        Some(publisher) => publisher,
        None => return unhealthy("publisher not initialized"),
    };

    if !publisher.is_healthy().await {
        return unhealthy("broker not connected");
    }

    let ingest = state.ingest.snapshot();
    if ingest.active_connections == 0 {
        return unhealthy("no active websocket connections");
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "broker": "connected",
            "websocket_connections": ingest.active_connections,
        })),
    )
        .into_response()
}

fn unhealthy(reason: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "unhealthy",
            "reason": reason,
        })),
    )
        .into_response()
}

async fn stats(State(state): State<HealthState>) -> Response {
    let pairs = state.universe.pairs();
    let sample: Vec<&String> = pairs.iter().take(PAIRS_SAMPLE).collect();
    let publisher = state.publisher.as_ref().map(|p| p.stats());

    Json(json!({
        "publisher": publisher,
        "ingest": state.ingest.snapshot(),
        "pairs_count": pairs.len(),
        "pairs_sample": sample,
    }))
    .into_response()
}

async fn pairs(State(state): State<HealthState>) -> Response {
    let pairs = state.universe.pairs();

    Json(json!({
        "count": pairs.len(),
        "pairs": &*pairs,
    }))
    .into_response()
}
