//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The caller is not allowed to perform the action.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation (limits, insufficient funds).
    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    /// Conflict with the current state (duplicate entry, wrong state).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The ledger and the message log disagree; an operator must reconcile.
    #[error("Reconciliation required: {0}")]
    Reconciliation(String),

    /// A backing ledger or the message log could not be reached.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule(_) => 422,
            Self::Conflict(_) => 409,
            Self::ServiceUnavailable(_) => 503,
            Self::Reconciliation(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule(_) => "BUSINESS_RULE_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Reconciliation(_) => "RECONCILIATION_REQUIRED",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the message that may be shown to an end user.
    ///
    /// Reconciliation and internal failures never leak their details.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Reconciliation(_) | Self::Internal(_) => {
                "Something went wrong on our side, please contact support".to_string()
            }
            other => other.to_string(),
        }
    }
}
