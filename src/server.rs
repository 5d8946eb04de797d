//! Host HTTP surface: the provider webhook plus health and metrics.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::metrics::IncomingEmailMetrics;

#[derive(Clone)]
struct HostState {
    provider: Arc<str>,
    metrics: Arc<IncomingEmailMetrics>,
}

/// Merge the provider's webhook router with `/health` and `/metrics`.
pub fn host_router(provider: &str, webhook: Router, metrics: Arc<IncomingEmailMetrics>) -> Router {
    let state = HostState {
        provider: Arc::from(provider),
        metrics,
    };
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .with_state(state)
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<HostState>) -> Json<Value> {
    Json(json!({ "status": "ok", "provider": &*state.provider }))
}

async fn render_metrics(State(state): State<HostState>) -> String {
    state.metrics.render()
}
