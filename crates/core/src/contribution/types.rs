//! Contribution processor results.

use serde::{Deserialize, Serialize};
use susu_shared::types::{AccountId, Money, TokenAmount, TxId};

use crate::circle::RoundAdvance;

/// Result of a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReceipt {
    /// Round paid out.
    pub round: u32,
    /// Rotation recipient.
    pub recipient: AccountId,
    /// Pooled amount.
    pub amount: Money,
    /// Payment ledger transaction.
    pub payment_tx_id: TxId,
    /// Log transaction of the PAYOUT_DISTRIBUTION message.
    pub log_tx_id: TxId,
    /// The round update that followed.
    pub advance: RoundAdvance,
}

/// What happened to the payout a settled round triggered.
///
/// The contribution that triggered it is recorded either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PayoutOutcome {
    /// The recipient was paid and the round closed.
    Distributed(PayoutReceipt),
    /// Loans drew on the pool; the payout runs once repayments cover it.
    #[serde(rename_all = "camelCase")]
    AwaitingRepayment {
        /// Round waiting to be paid.
        round: u32,
        /// Pooled amount owed to the recipient.
        required: Money,
        /// Circle funds at the time.
        available: Money,
    },
    /// The payout failed; the circle is halted for reconciliation.
    #[serde(rename_all = "camelCase")]
    Failed {
        /// Round that was not paid.
        round: u32,
        /// Error code of the failure.
        error: String,
        /// Client-safe description.
        message: String,
    },
}

impl PayoutOutcome {
    /// The receipt, if the payout went through.
    #[must_use]
    pub fn distributed(&self) -> Option<&PayoutReceipt> {
        match self {
            Self::Distributed(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Result of a contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionReceipt {
    /// Payment ledger transaction.
    pub payment_tx_id: TxId,
    /// Token ledger transaction of the reward, if one was credited.
    pub reward_tx_id: Option<TxId>,
    /// Reward credited.
    pub reward_tokens: Option<TokenAmount>,
    /// Log transaction of the CONTRIBUTION message.
    pub log_tx_id: TxId,
    /// Payout triggered by the last outstanding contribution of the round.
    pub payout: Option<PayoutOutcome>,
}
