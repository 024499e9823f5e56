//! User registration, verification and guarantee routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use susu_core::trust::NewUser;
use susu_shared::types::AccountId;
use tracing::info;
use validator::Validate;

use crate::{AppState, error::ApiError, extractors::ValidatedJson};

/// Creates the user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/{account_id}", get(get_user))
        .route("/users/{account_id}/verify", post(verify_user))
        .route("/users/{account_id}/guarantee", post(submit_guarantee))
        .route("/accounts/{account_id}/balance", get(get_balance))
}

/// Request body for registering a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    /// Ledger account of the user.
    #[validate(length(min = 1, max = 128))]
    pub account_id: String,
    /// Display name.
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Contact phone number.
    #[validate(length(min = 1, max = 32))]
    pub phone_number: String,
    /// First guarantor; must come with the second.
    #[validate(length(min = 1, max = 128))]
    pub guarantor1: Option<String>,
    /// Second guarantor; must come with the first.
    #[validate(length(min = 1, max = 128))]
    pub guarantor2: Option<String>,
}

/// Request body for verifying a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyUserRequest {
    /// Who performed the verification.
    #[validate(length(min = 1, max = 100))]
    pub verified_by: String,
}

/// Request body for a sister guarantee.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuaranteeRequest {
    /// First guarantor.
    #[validate(length(min = 1, max = 128))]
    pub guarantor1: String,
    /// Second guarantor.
    #[validate(length(min = 1, max = 128))]
    pub guarantor2: String,
}

/// POST `/users` - Register a user.
async fn register_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let guarantors = match (payload.guarantor1, payload.guarantor2) {
        (Some(first), Some(second)) => Some((AccountId::from(first), AccountId::from(second))),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "guarantor1 and guarantor2 must be given together",
            ));
        }
    };
    let account_id = AccountId::from(payload.account_id);

    let tx_id = state
        .facade
        .register_user(NewUser {
            account_id: account_id.clone(),
            name: payload.name,
            phone: payload.phone_number,
            guarantors,
        })
        .await?;

    info!(account_id = %account_id, "User registered via API");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "accountId": account_id, "txId": tx_id })),
    ))
}

/// GET `/users/{account_id}` - Get a user profile.
async fn get_user(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.facade.get_user(&AccountId::from(account_id)).await?;
    Ok(Json(profile))
}

/// POST `/users/{account_id}/verify` - Verify a user.
async fn verify_user(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<VerifyUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id = state
        .facade
        .verify_user(&AccountId::from(account_id), &payload.verified_by)
        .await?;
    Ok(Json(json!({ "txId": tx_id })))
}

/// POST `/users/{account_id}/guarantee` - Record a sister guarantee.
async fn submit_guarantee(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<GuaranteeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx_id = state
        .facade
        .submit_guarantee(
            &AccountId::from(account_id),
            &AccountId::from(payload.guarantor1),
            &AccountId::from(payload.guarantor2),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "txId": tx_id }))))
}

/// GET `/accounts/{account_id}/balance` - Native, token and reward balances.
async fn get_balance(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let balance = state
        .facade
        .get_account_balance(&AccountId::from(account_id))
        .await?;
    Ok(Json(balance))
}
