//! `SeaORM` entities for the ledger tables.

pub mod ledger_messages;
pub mod native_balances;
pub mod native_transfers;
pub mod token_accounts;
pub mod token_transfers;
