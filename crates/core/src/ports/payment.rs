//! Native-currency ledger.

use async_trait::async_trait;
use susu_shared::types::{AccountId, Money, TxId};
use thiserror::Error;

/// Errors raised by a payment ledger.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    /// The paying account cannot cover the transfer.
    #[error("Account {account} has {available}, {requested} requested")]
    InsufficientFunds {
        /// Paying account.
        account: AccountId,
        /// Current balance.
        available: Money,
        /// Requested amount.
        requested: Money,
    },

    /// Transfers must move a positive amount between two accounts.
    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    /// The ledger could not be reached.
    #[error("Payment ledger unavailable: {0}")]
    Unavailable(String),
}

/// Native-currency balances and atomic transfers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Moves `amount` from one account to another, atomically.
    ///
    /// Fails without moving anything if `from` cannot cover the amount.
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Money,
        memo: &str,
    ) -> Result<TxId, PaymentError>;

    /// Returns the current balance; unknown accounts hold zero.
    async fn balance_of(&self, account: &AccountId) -> Result<Money, PaymentError>;
}
