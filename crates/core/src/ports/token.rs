//! Fungible reward-token ledger.

use async_trait::async_trait;
use susu_shared::types::{AccountId, TokenAmount, TxId};
use thiserror::Error;

/// Errors raised by a token ledger.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// The account has not been associated with the token.
    #[error("Account {0} is not associated with the reward token")]
    NotAssociated(AccountId),

    /// Mints and transfers must move a positive amount.
    #[error("Invalid token amount: {0}")]
    InvalidAmount(TokenAmount),

    /// The paying account holds fewer tokens than requested.
    #[error("Account {account} holds {available} tokens, {requested} requested")]
    InsufficientBalance {
        /// Paying account.
        account: AccountId,
        /// Current balance.
        available: TokenAmount,
        /// Requested amount.
        requested: TokenAmount,
    },

    /// The ledger could not be reached.
    #[error("Token ledger unavailable: {0}")]
    Unavailable(String),
}

/// Reward-token balances. Accounts must be associated before they can be credited.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Associates an account with the token. Associating twice is a no-op.
    async fn associate(&self, account: &AccountId) -> Result<(), TokenError>;

    /// Returns true if the account may hold the token.
    async fn is_associated(&self, account: &AccountId) -> Result<bool, TokenError>;

    /// Creates new tokens and credits them to an associated account.
    async fn mint(
        &self,
        to: &AccountId,
        amount: TokenAmount,
        memo: &str,
    ) -> Result<TxId, TokenError>;

    /// Moves tokens between two associated accounts.
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: TokenAmount,
        memo: &str,
    ) -> Result<TxId, TokenError>;

    /// Returns the current balance; unassociated accounts hold zero.
    async fn balance_of(&self, account: &AccountId) -> Result<TokenAmount, TokenError>;
}
