//! PostgreSQL backing for the ledger core.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the message log and both ledgers
//! - [`PgMessageLog`], [`PgPaymentLedger`] and [`PgTokenLedger`], the port
//!   implementations the server runs against
//! - Database migrations

pub mod adapters;
pub mod entities;
pub mod migration;

pub use adapters::{PgMessageLog, PgPaymentLedger, PgTokenLedger, postgres_ports};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use susu_shared::config::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized by the configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
