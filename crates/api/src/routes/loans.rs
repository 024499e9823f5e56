//! Emergency loan voting, disbursement and repayment routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use susu_core::message::VoteChoice;
use susu_shared::types::{AccountId, LoanId, Money};
use tracing::info;
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson, routes::parse_id};

/// Creates the loan routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/loans/{loan_id}", get(get_loan))
        .route("/loans/{loan_id}/tally", get(get_tally))
        .route("/loans/{loan_id}/votes", post(cast_vote))
        .route("/loans/{loan_id}/disburse", post(disburse))
        .route("/loans/{loan_id}/repayments", post(repay))
}

/// Request body for a vote.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Voting member.
    #[validate(length(min = 1, max = 128))]
    pub voter_account_id: String,
    /// `for`, `against` or `abstain`.
    pub vote: VoteChoice,
    /// Voter's display name.
    #[validate(length(max = 100))]
    pub voter_name: Option<String>,
}

/// Request body for a repayment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentRequest {
    /// Amount in minor units.
    #[validate(range(min = 1))]
    pub amount: i64,
}

/// GET `/loans/{loan_id}` - Loan with tally and outstanding balance.
async fn get_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let loan_id: LoanId = parse_id(&loan_id, "loan")?;
    Ok(Json(state.facade.get_loan(loan_id).await?))
}

/// GET `/loans/{loan_id}/tally` - Vote counts and quorum.
async fn get_tally(
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let loan_id: LoanId = parse_id(&loan_id, "loan")?;
    Ok(Json(state.facade.tally(loan_id).await?))
}

/// POST `/loans/{loan_id}/votes` - Vote on a loan.
async fn cast_vote(
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<VoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let loan_id: LoanId = parse_id(&loan_id, "loan")?;
    let receipt = state
        .facade
        .cast_vote(
            loan_id,
            &AccountId::from(payload.voter_account_id),
            payload.vote,
            payload.voter_name,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST `/loans/{loan_id}/disburse` - Pay out an approved loan.
async fn disburse(
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let loan_id: LoanId = parse_id(&loan_id, "loan")?;
    let receipt = state.facade.approve_and_disburse(loan_id).await?;
    info!(loan_id = %loan_id, "Loan disbursed via API");
    Ok(Json(receipt))
}

/// POST `/loans/{loan_id}/repayments` - Repay part or all of a loan.
async fn repay(
    State(state): State<AppState>,
    Path(loan_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<RepaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let loan_id: LoanId = parse_id(&loan_id, "loan")?;
    let receipt = state
        .facade
        .repay_loan(loan_id, Money::new(payload.amount))
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
