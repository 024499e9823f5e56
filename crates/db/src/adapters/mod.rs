//! Port implementations over PostgreSQL.

mod message_log;
mod payment;
mod token;

pub use message_log::PgMessageLog;
pub use payment::PgPaymentLedger;
pub use token::PgTokenLedger;

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use susu_core::ports::{Clock, Ports};

/// Ports backed by the tables of [`crate::migration::Migrator`].
#[must_use]
pub fn postgres_ports(db: &DatabaseConnection, clock: Arc<dyn Clock>) -> Ports {
    Ports {
        log: Arc::new(PgMessageLog::new(db.clone())),
        payments: Arc::new(PgPaymentLedger::new(db.clone())),
        tokens: Arc::new(PgTokenLedger::new(db.clone())),
        clock,
    }
}
