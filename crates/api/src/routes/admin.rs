//! Operator routes: sweep, projection rebuild, halts and manual round control.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use susu_core::AggregateId;
use susu_shared::types::CircleId;
use tracing::{info, warn};
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson, routes::parse_id};

/// Creates the operator routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/sweep", post(sweep))
        .route("/admin/projection/rebuild", post(rebuild_projection))
        .route("/admin/halts", get(list_halts))
        .route("/admin/halts/{aggregate}/resolve", post(resolve_halt))
        .route("/admin/circles/{circle_id}/payout", post(distribute_payout))
        .route("/admin/circles/{circle_id}/advance", post(advance_round))
}

/// Request body for a manual payout.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    /// Round to pay out.
    #[validate(range(min = 1))]
    pub round: u32,
}

/// POST `/admin/sweep` - Close expired votes and flag overdue loans.
async fn sweep(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.facade.sweep().await?))
}

/// POST `/admin/projection/rebuild` - Fold the log again from the start.
async fn rebuild_projection(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let sequence = state.facade.rebuild_projection().await?;
    info!(sequence = %sequence, "Projection rebuilt via API");
    Ok(Json(json!({ "sequence": sequence })))
}

/// GET `/admin/halts` - Aggregates waiting for reconciliation.
async fn list_halts(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "halts": state.facade.halts() }))
}

/// POST `/admin/halts/{aggregate}/resolve` - Lift a halt, e.g. `circle:<uuid>`.
async fn resolve_halt(
    State(state): State<AppState>,
    Path(aggregate): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let aggregate: AggregateId = aggregate.parse()?;
    let resolved = state.facade.resolve_halt(&aggregate);
    if resolved {
        warn!(aggregate = %aggregate, "Halt resolved via API");
    }
    Ok(Json(json!({ "aggregate": aggregate, "resolved": resolved })))
}

/// POST `/admin/circles/{circle_id}/payout` - Retry a round's payout.
async fn distribute_payout(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<PayoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    Ok(Json(
        state
            .facade
            .distribute_payout(circle_id, payload.round)
            .await?,
    ))
}

/// POST `/admin/circles/{circle_id}/advance` - Close the current round.
async fn advance_round(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    Ok(Json(state.facade.advance_round(circle_id).await?))
}
