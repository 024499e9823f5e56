//! Process-local port implementations.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an await,
//! so every operation is atomic with respect to other callers in the process.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use susu_shared::types::{AccountId, Money, SequenceId, TokenAmount, TxId};

use super::log::{LogError, MessageLog, MessageStream, Receipt};
use super::payment::{PaymentError, PaymentLedger};
use super::token::{TokenError, TokenLedger};
use crate::message::{LedgerMessage, SequencedMessage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The three in-memory ledgers, shared with the ports that wrap them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHandles {
    /// Message log.
    pub log: Arc<InMemoryMessageLog>,
    /// Native-currency ledger.
    pub payments: Arc<InMemoryPaymentLedger>,
    /// Reward-token ledger.
    pub tokens: Arc<InMemoryTokenLedger>,
}

/// Message log held in a vector.
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    entries: Mutex<Vec<SequencedMessage>>,
}

impl InMemoryMessageLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message without going through the async port.
    pub fn append(&self, message: &LedgerMessage) -> Receipt {
        let mut entries = lock(&self.entries);
        let sequence = SequenceId(entries.len() as u64 + 1);
        let tx_id = TxId::new(format!("msg-{:08}", sequence.0));
        entries.push(SequencedMessage {
            sequence,
            tx_id: tx_id.clone(),
            message: message.clone(),
        });
        Receipt { sequence, tx_id }
    }

    /// Returns a copy of every message at or after `from`.
    #[must_use]
    pub fn entries_from(&self, from: SequenceId) -> Vec<SequencedMessage> {
        let entries = lock(&self.entries);
        let skip = usize::try_from(from.0.saturating_sub(1)).unwrap_or(usize::MAX);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Number of messages in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns true if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn submit(&self, message: &LedgerMessage) -> Result<Receipt, LogError> {
        Ok(self.append(message))
    }

    async fn read_from(&self, from: SequenceId) -> Result<MessageStream, LogError> {
        let entries = self.entries_from(from);
        Ok(futures::stream::iter(entries.into_iter().map(Ok)).boxed())
    }
}

#[derive(Debug, Default)]
struct PaymentBook {
    balances: HashMap<AccountId, Money>,
    next_tx: u64,
}

/// Native-currency ledger held in a map.
#[derive(Debug, Default)]
pub struct InMemoryPaymentLedger {
    book: Mutex<PaymentBook>,
}

impl InMemoryPaymentLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits an account from outside the system.
    pub fn deposit(&self, account: &AccountId, amount: Money) {
        let mut book = lock(&self.book);
        let balance = book.balances.entry(account.clone()).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Current balance, without going through the async port.
    #[must_use]
    pub fn balance(&self, account: &AccountId) -> Money {
        lock(&self.book)
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentLedger for InMemoryPaymentLedger {
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Money,
        _memo: &str,
    ) -> Result<TxId, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidTransfer(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if from == to {
            return Err(PaymentError::InvalidTransfer(
                "source and destination are the same account".to_string(),
            ));
        }

        let mut book = lock(&self.book);
        let available = book.balances.get(from).copied().unwrap_or_default();
        let remaining = available
            .checked_sub(amount)
            .filter(|rest| !rest.is_negative())
            .ok_or_else(|| PaymentError::InsufficientFunds {
                account: from.clone(),
                available,
                requested: amount,
            })?;

        book.balances.insert(from.clone(), remaining);
        let credit = book.balances.entry(to.clone()).or_default();
        *credit = credit.saturating_add(amount);
        book.next_tx += 1;
        Ok(TxId::new(format!("pay-{:08}", book.next_tx)))
    }

    async fn balance_of(&self, account: &AccountId) -> Result<Money, PaymentError> {
        Ok(self.balance(account))
    }
}

#[derive(Debug, Default)]
struct TokenBook {
    associated: HashSet<AccountId>,
    balances: HashMap<AccountId, TokenAmount>,
    next_tx: u64,
}

impl TokenBook {
    fn ensure_associated(&self, account: &AccountId) -> Result<(), TokenError> {
        if self.associated.contains(account) {
            Ok(())
        } else {
            Err(TokenError::NotAssociated(account.clone()))
        }
    }

    fn next_tx_id(&mut self) -> TxId {
        self.next_tx += 1;
        TxId::new(format!("tok-{:08}", self.next_tx))
    }
}

/// Reward-token ledger held in a map.
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    book: Mutex<TokenBook>,
}

impl InMemoryTokenLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance, without going through the async port.
    #[must_use]
    pub fn balance(&self, account: &AccountId) -> TokenAmount {
        lock(&self.book)
            .balances
            .get(account)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn associate(&self, account: &AccountId) -> Result<(), TokenError> {
        lock(&self.book).associated.insert(account.clone());
        Ok(())
    }

    async fn is_associated(&self, account: &AccountId) -> Result<bool, TokenError> {
        Ok(lock(&self.book).associated.contains(account))
    }

    async fn mint(
        &self,
        to: &AccountId,
        amount: TokenAmount,
        _memo: &str,
    ) -> Result<TxId, TokenError> {
        if !amount.is_positive() {
            return Err(TokenError::InvalidAmount(amount));
        }
        let mut book = lock(&self.book);
        book.ensure_associated(to)?;
        let balance = book.balances.entry(to.clone()).or_default();
        *balance = balance.saturating_add(amount);
        Ok(book.next_tx_id())
    }

    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: TokenAmount,
        _memo: &str,
    ) -> Result<TxId, TokenError> {
        if !amount.is_positive() {
            return Err(TokenError::InvalidAmount(amount));
        }
        let mut book = lock(&self.book);
        book.ensure_associated(from)?;
        book.ensure_associated(to)?;

        let available = book.balances.get(from).copied().unwrap_or_default();
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                account: from.clone(),
                available,
                requested: amount,
            });
        }
        book.balances
            .insert(from.clone(), TokenAmount::from_units(available.units() - amount.units()));
        let credit = book.balances.entry(to.clone()).or_default();
        *credit = credit.saturating_add(amount);
        Ok(book.next_tx_id())
    }

    async fn balance_of(&self, account: &AccountId) -> Result<TokenAmount, TokenError> {
        Ok(self.balance(account))
    }
}
