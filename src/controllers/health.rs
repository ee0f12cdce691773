use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::infrastructure::repositories::LedgerRepository;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(repo): State<Arc<dyn LedgerRepository>>) -> impl IntoResponse {
    match repo.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "ledger": "connected"
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Ledger store not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "ledger": "disconnected"
                })),
            )
        }
    }
}
