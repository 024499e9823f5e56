//! Shared types, errors, and configuration for the susu ledger.
//!
//! This crate provides common types used across all other crates:
//! - Native-currency and reward-token amounts in integer minor units
//! - Typed IDs for circles, loans, accounts and ledger transactions
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, CircleLimits, LedgerBackend, LedgerConfig, LoanPolicy, RewardPolicy, VotePolicy,
};
pub use error::{AppError, AppResult};
