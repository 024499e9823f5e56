//! Health check endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the message log cannot be read.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Last log sequence folded into the projection.
    pub sequence: Option<u64>,
    /// Aggregates waiting for manual reconciliation.
    pub halts: usize,
}

/// GET `/health` - Liveness plus projection position.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let halts = state.facade.halts().len();
    let version = env!("CARGO_PKG_VERSION");
    match state.facade.last_sequence().await {
        Ok(sequence) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                version,
                sequence: Some(sequence.0),
                halts,
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Health check could not read the message log");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    version,
                    sequence: None,
                    halts,
                }),
            )
        }
    }
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
