//! API route definitions.

use axum::Router;
use std::str::FromStr;

use crate::{AppState, error::ApiError};

pub mod admin;
pub mod circles;
pub mod health;
pub mod loans;
pub mod users;

/// Creates the API router with all routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(users::routes())
        .merge(circles::routes())
        .merge(loans::routes())
        .merge(admin::routes())
}

/// Parses an id taken from the path.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {what} id '{raw}'")))
}

#[cfg(test)]
pub(crate) mod test_support;
