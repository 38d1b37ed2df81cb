use axum::{extract::State, response::IntoResponse, Json};
use http::{header, StatusCode};
use serde_json::json;
use std::sync::Arc;

use super::Server;
use crate::metrics;

pub async fn health(State(server): State<Arc<Server>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "environment": server.environment(),
    }))
}

pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
