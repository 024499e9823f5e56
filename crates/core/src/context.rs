//! Shared command context: ports, configuration, projection, locks and halts.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use susu_shared::LedgerConfig;
use susu_shared::types::{AccountId, CircleId, LoanId, TxId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::CoreError;
use crate::message::{LedgerMessage, MessagePayload};
use crate::ports::{Clock, MessageLog, PaymentLedger, Ports, Receipt, TokenLedger};
use crate::projection::{LedgerState, ProjectionStore};

/// Target of reconciliation log lines.
pub const RECONCILIATION_TARGET: &str = "susu::reconciliation";

/// Something commands serialize on.
///
/// Circles and loans can also be halted. Locks are always taken in the order
/// account, circle, loan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AggregateId {
    /// A user account.
    Account(AccountId),
    /// A circle.
    Circle(CircleId),
    /// A loan.
    Loan(LoanId),
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account:{id}"),
            Self::Circle(id) => write!(f, "circle:{id}"),
            Self::Loan(id) => write!(f, "loan:{id}"),
        }
    }
}

impl FromStr for AggregateId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidInput(format!("unknown aggregate '{s}'"));
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        match kind {
            "account" if !id.trim().is_empty() => Ok(Self::Account(AccountId::from(id))),
            "circle" => id.parse().map(Self::Circle).map_err(|_| invalid()),
            "loan" => id.parse().map(Self::Loan).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl From<AggregateId> for String {
    fn from(id: AggregateId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AggregateId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An aggregate an operator must reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Halt {
    /// Halted aggregate.
    pub aggregate: AggregateId,
    /// What went wrong.
    pub reason: String,
    /// Ledger transaction that was not recorded, if any.
    pub side_effect: Option<TxId>,
    /// When the halt was raised.
    pub halted_at: DateTime<Utc>,
}

/// State shared by the four services.
pub struct CoreContext {
    pub(crate) log: Arc<dyn MessageLog>,
    pub(crate) payments: Arc<dyn PaymentLedger>,
    pub(crate) tokens: Arc<dyn TokenLedger>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: LedgerConfig,
    pub(crate) treasury: AccountId,
    projection: ProjectionStore,
    locks: DashMap<AggregateId, Arc<Mutex<()>>>,
    halts: DashMap<AggregateId, Halt>,
}

impl fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreContext")
            .field("treasury", &self.treasury)
            .field("halts", &self.halts.len())
            .finish_non_exhaustive()
    }
}

impl CoreContext {
    /// Creates a context over the given ports.
    #[must_use]
    pub fn new(ports: Ports, config: LedgerConfig) -> Self {
        let projection = ProjectionStore::new(ports.log.clone(), config.loans.vote_policy);
        Self {
            log: ports.log,
            payments: ports.payments,
            tokens: ports.tokens,
            clock: ports.clock,
            treasury: AccountId::new(config.treasury_account.clone()),
            config,
            projection,
            locks: DashMap::new(),
            halts: DashMap::new(),
        }
    }

    /// Current time according to the clock port.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The projection cache.
    #[must_use]
    pub fn projection(&self) -> &ProjectionStore {
        &self.projection
    }

    /// Catches up with the log and runs `f` on the folded state.
    pub async fn state<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> Result<R, CoreError> {
        Ok(self.projection.read(f).await?)
    }

    /// Waits for exclusive access to an aggregate.
    pub async fn lock(&self, aggregate: AggregateId) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(aggregate).or_default().clone();
        mutex.lock_owned().await
    }

    /// Fails if any of the aggregates is halted.
    pub fn ensure_not_halted(&self, aggregates: &[AggregateId]) -> Result<(), CoreError> {
        match aggregates.iter().find(|a| self.halts.contains_key(*a)) {
            Some(halted) => Err(CoreError::AggregateHalted(halted.clone())),
            None => Ok(()),
        }
    }

    /// Stops automated processing of the aggregates until an operator resolves them.
    pub fn halt(&self, aggregates: &[AggregateId], reason: &str, side_effect: Option<&TxId>) {
        let halted_at = self.now();
        for aggregate in aggregates {
            tracing::error!(
                target: RECONCILIATION_TARGET,
                aggregate = %aggregate,
                side_effect = side_effect.map(TxId::as_str),
                reason,
                "Aggregate halted; manual reconciliation required"
            );
            self.halts.insert(
                aggregate.clone(),
                Halt {
                    aggregate: aggregate.clone(),
                    reason: reason.to_string(),
                    side_effect: side_effect.cloned(),
                    halted_at,
                },
            );
        }
    }

    /// Lifts a halt. Returns false if the aggregate was not halted.
    pub fn resolve_halt(&self, aggregate: &AggregateId) -> bool {
        let resolved = self.halts.remove(aggregate).is_some();
        if resolved {
            tracing::warn!(
                target: RECONCILIATION_TARGET,
                aggregate = %aggregate,
                "Halt resolved by operator"
            );
        }
        resolved
    }

    /// Every outstanding halt, oldest first.
    #[must_use]
    pub fn halts(&self) -> Vec<Halt> {
        let mut halts: Vec<Halt> = self.halts.iter().map(|h| h.value().clone()).collect();
        halts.sort_by_key(|h| h.halted_at);
        halts
    }

    fn envelope(&self, payload: MessagePayload) -> LedgerMessage {
        LedgerMessage::new(self.now(), self.config.message_version.clone(), payload)
    }

    /// Appends a message that has no ledger side effect behind it.
    pub async fn append(&self, payload: MessagePayload) -> Result<Receipt, CoreError> {
        let message = self.envelope(payload);
        let receipt = self.log.submit(&message).await?;
        tracing::debug!(
            sequence = %receipt.sequence,
            tx_id = %receipt.tx_id,
            message_type = message.message_type(),
            "Message appended"
        );
        Ok(receipt)
    }

    /// Appends a message that records a ledger side effect which already happened.
    ///
    /// If the log refuses it, the aggregates are halted and a consistency error
    /// is returned; the side effect is never rolled back.
    pub async fn append_recorded(
        &self,
        aggregates: &[AggregateId],
        side_effect: &TxId,
        payload: MessagePayload,
    ) -> Result<Receipt, CoreError> {
        let message_type = payload.message_type();
        match self.append(payload).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => Err(self.inconsistent(
                aggregates,
                side_effect,
                &format!("{message_type} not recorded: {err}"),
            )),
        }
    }

    /// Halts the aggregates after an unrecorded side effect and builds the error.
    pub fn inconsistent(
        &self,
        aggregates: &[AggregateId],
        side_effect: &TxId,
        reason: &str,
    ) -> CoreError {
        self.halt(aggregates, reason, Some(side_effect));
        CoreError::Consistency {
            aggregate: aggregates
                .first()
                .cloned()
                .unwrap_or_else(|| AggregateId::Account(self.treasury.clone())),
            side_effect: side_effect.clone(),
            reason: reason.to_string(),
        }
    }
}
