//! Emergency loan domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use susu_shared::types::{AccountId, CircleId, LoanId, Money, TxId};

use crate::contribution::PayoutOutcome;
use crate::message::Urgency;

/// Emergency loan status.
///
/// The valid transitions are:
/// - Voting → Approved (quorum of "for" votes reached)
/// - Voting → Rejected (deadline passed without quorum)
/// - Approved → Disbursed (funds sent to the borrower)
/// - Disbursed → Repaid (outstanding balance reaches zero)
/// - Disbursed → Overdue (due date passed with a balance left)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Members are voting.
    Voting,
    /// Quorum reached, waiting for disbursement.
    Approved,
    /// Voting closed without quorum (immutable).
    Rejected,
    /// Funds sent, repayment pending.
    Disbursed,
    /// Fully repaid (immutable).
    Repaid,
    /// Past due with a balance left (immutable).
    Overdue,
}

impl LoanStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voting => "voting",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Disbursed => "disbursed",
            Self::Repaid => "repaid",
            Self::Overdue => "overdue",
        }
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Repaid | Self::Overdue)
    }

    /// Returns true if the loan counts against the borrower's active-loan limit.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Voting | Self::Approved | Self::Disbursed)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vote counts on a loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTally {
    /// "For" votes.
    pub votes_for: u32,
    /// "Against" votes.
    pub votes_against: u32,
    /// Abstentions.
    pub abstentions: u32,
    /// "For" votes needed for approval.
    pub quorum: u32,
}

impl LoanTally {
    /// Returns true if the "for" votes reach quorum.
    #[must_use]
    pub fn has_quorum(&self) -> bool {
        self.votes_for >= self.quorum
    }

    /// Total number of voters.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.votes_for + self.votes_against + self.abstentions
    }
}

/// Disbursement details of a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disbursement {
    /// Payment ledger transaction.
    pub transaction_id: TxId,
    /// When the funds were sent.
    pub disbursed_at: DateTime<Utc>,
    /// Repayment due date.
    pub due_date: DateTime<Utc>,
}

/// Input of a loan request.
#[derive(Debug, Clone)]
pub struct LoanRequestInput {
    /// Lending circle.
    pub circle_id: CircleId,
    /// Requesting member.
    pub borrower: AccountId,
    /// Requested amount.
    pub amount: Money,
    /// Why the money is needed.
    pub reason: String,
    /// Urgency.
    pub urgency: Urgency,
    /// Repayment window in days; defaults to 30.
    pub repayment_period_days: Option<u16>,
}

/// Result of a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    /// Log transaction of the vote.
    pub tx_id: TxId,
    /// Tally after the vote.
    pub tally: LoanTally,
    /// Loan status after the vote.
    pub status: LoanStatus,
}

/// Result of a disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementReceipt {
    /// Loan disbursed.
    pub loan_id: LoanId,
    /// Payment ledger transaction.
    pub payment_tx_id: TxId,
    /// Log transaction of the approval message.
    pub log_tx_id: TxId,
    /// Repayment due date.
    pub due_date: DateTime<Utc>,
    /// REWARD_ISSUANCE messages for the loan's supporters.
    pub support_rewards: Vec<TxId>,
}

/// Result of a repayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentReceipt {
    /// Loan repaid.
    pub loan_id: LoanId,
    /// Payment ledger transaction.
    pub payment_tx_id: TxId,
    /// Log transaction of the repayment message.
    pub log_tx_id: TxId,
    /// Balance left after the payment.
    pub outstanding: Money,
    /// Loan status after the payment.
    pub status: LoanStatus,
    /// Payout of a round that was waiting on this repayment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<PayoutOutcome>,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Loans whose voting window closed without quorum.
    pub rejected: Vec<LoanId>,
    /// Disbursed loans that passed their due date.
    pub overdue: Vec<LoanId>,
    /// Loans skipped because their circle or the loan itself is halted.
    pub skipped: Vec<LoanId>,
}
