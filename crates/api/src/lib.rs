//! HTTP API layer with Axum routes over the ledger facade.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - A JSON extractor that runs `validator` rules
//! - The error body every failing route renders

pub mod error;
pub mod extractors;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use susu_core::LedgerFacade;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger core.
    pub facade: Arc<LedgerFacade>,
}

impl AppState {
    /// Wraps a facade.
    #[must_use]
    pub fn new(facade: LedgerFacade) -> Self {
        Self {
            facade: Arc::new(facade),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
