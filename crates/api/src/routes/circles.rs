//! Circle, membership, contribution and loan request routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use susu_core::circle::NewCircle;
use susu_core::loan::LoanRequestInput;
use susu_core::message::Urgency;
use susu_shared::types::{AccountId, CircleId, Money, PageRequest};
use tracing::info;
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson, routes::parse_id};

/// Creates the circle routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/circles", post(create_circle).get(list_circles))
        .route("/circles/{circle_id}", get(get_circle))
        .route("/circles/{circle_id}/members", post(join_circle))
        .route("/circles/{circle_id}/contributions", post(collect_contribution))
        .route(
            "/circles/{circle_id}/loans",
            post(request_loan).get(list_loans),
        )
}

/// Request body for creating a circle.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCircleRequest {
    /// Circle name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Creator; takes the first seat.
    #[validate(length(min = 1, max = 128))]
    pub creator_account_id: String,
    /// Creator's name inside the circle.
    #[validate(length(max = 100))]
    pub creator_name: Option<String>,
    /// Contribution per member per round, in minor units.
    #[validate(range(min = 1))]
    pub monthly_contribution: i64,
    /// Number of seats.
    #[validate(range(min = 1))]
    pub max_members: u32,
    /// Free text.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Whether members may request emergency loans (default: true).
    pub emergency_loans_enabled: Option<bool>,
    /// Loan cap as a percentage of circle funds.
    #[validate(range(min = 1, max = 100))]
    pub max_loan_percentage: Option<u8>,
}

/// Request body for joining a circle.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinCircleRequest {
    /// Joining member.
    #[validate(length(min = 1, max = 128))]
    pub account_id: String,
    /// Name inside the circle; defaults to the profile name.
    #[validate(length(max = 100))]
    pub member_name: Option<String>,
}

/// Request body for a contribution.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRequest {
    /// Paying member.
    #[validate(length(min = 1, max = 128))]
    pub account_id: String,
    /// Amount in minor units; must equal the circle's contribution.
    #[validate(range(min = 1))]
    pub amount: i64,
    /// Round being paid.
    #[validate(range(min = 1))]
    pub round: u32,
}

/// Request body for an emergency loan.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    /// Requesting member.
    #[validate(length(min = 1, max = 128))]
    pub borrower_account_id: String,
    /// Amount in minor units.
    #[validate(range(min = 1))]
    pub amount: i64,
    /// Why the money is needed.
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    /// Urgency (default: medium).
    #[serde(default)]
    pub urgency: Urgency,
    /// Repayment window in days: 15, 30, 45 or 60.
    pub repayment_period_days: Option<u16>,
}

/// POST `/circles` - Create a circle.
async fn create_circle(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCircleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id = state
        .facade
        .create_circle(NewCircle {
            name: payload.name,
            creator: AccountId::from(payload.creator_account_id),
            creator_name: payload.creator_name,
            monthly_contribution: Money::new(payload.monthly_contribution),
            max_members: payload.max_members,
            description: payload.description,
            emergency_loans_enabled: payload.emergency_loans_enabled.unwrap_or(true),
            max_loan_percentage: payload.max_loan_percentage,
        })
        .await?;

    info!(circle_id = %circle_id, "Circle created via API");
    let circle = state.facade.get_circle(circle_id).await?;
    Ok((StatusCode::CREATED, Json(circle)))
}

/// GET `/circles` - List circles in creation order.
async fn list_circles(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let circles = state.facade.list_circles(&page).await?;
    Ok(Json(circles))
}

/// GET `/circles/{circle_id}` - Circle with members, funds and schedule.
async fn get_circle(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    Ok(Json(state.facade.get_circle(circle_id).await?))
}

/// POST `/circles/{circle_id}/members` - Take a seat.
async fn join_circle(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<JoinCircleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    let tx_id = state
        .facade
        .join_circle(
            circle_id,
            &AccountId::from(payload.account_id),
            payload.member_name.as_deref().unwrap_or_default(),
        )
        .await?;
    let circle = state.facade.get_circle(circle_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "txId": tx_id, "circle": circle })),
    ))
}

/// POST `/circles/{circle_id}/contributions` - Pay a round.
async fn collect_contribution(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ContributionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    let receipt = state
        .facade
        .collect_contribution(
            circle_id,
            &AccountId::from(payload.account_id),
            Money::new(payload.amount),
            payload.round,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST `/circles/{circle_id}/loans` - Request an emergency loan.
async fn request_loan(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<LoanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    let loan_id = state
        .facade
        .request_loan(LoanRequestInput {
            circle_id,
            borrower: AccountId::from(payload.borrower_account_id),
            amount: Money::new(payload.amount),
            reason: payload.reason,
            urgency: payload.urgency,
            repayment_period_days: payload.repayment_period_days,
        })
        .await?;

    info!(circle_id = %circle_id, loan_id = %loan_id, "Loan requested via API");
    let loan = state.facade.get_loan(loan_id).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// GET `/circles/{circle_id}/loans` - Loans of a circle.
async fn list_loans(
    State(state): State<AppState>,
    Path(circle_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let circle_id: CircleId = parse_id(&circle_id, "circle")?;
    let loans = state.facade.list_loans(circle_id).await?;
    Ok(Json(json!({ "loans": loans })))
}
