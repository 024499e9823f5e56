//! Read views served by the facade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use susu_shared::types::{AccountId, CircleId, LoanId, Money, TokenAmount, TxId};

use crate::circle::rotation;
use crate::loan::{Disbursement, LoanStatus, LoanTally};
use crate::message::{CircleStatus, Urgency, VoteChoice};
use crate::projection::{CircleRecord, LoanRecord, Member};

/// Native and reward-token balances of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// The account.
    pub account_id: AccountId,
    /// Native currency, as reported by the payment ledger.
    pub native: Money,
    /// Reward tokens, as reported by the token ledger.
    pub token: TokenAmount,
    /// Reward tokens credited according to the log.
    pub rewards_earned: TokenAmount,
}

/// One round of the payout rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Round number.
    pub round: u32,
    /// Member paid in that round.
    pub recipient: AccountId,
    /// Payout transaction, once distributed.
    pub payment_tx_id: Option<TxId>,
}

/// A circle with its rotation schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleView {
    /// Circle id.
    pub circle_id: CircleId,
    /// Display name.
    pub name: String,
    /// Free text.
    pub description: Option<String>,
    /// Creator.
    pub creator: AccountId,
    /// Lifecycle status.
    pub status: CircleStatus,
    /// Per-member contribution per round.
    pub monthly_contribution: Money,
    /// Number of seats.
    pub max_members: u32,
    /// Seats in payout order.
    pub members: Vec<Member>,
    /// Round currently collecting; one past the last round once completed.
    pub current_round: u32,
    /// Rounds paid out and closed.
    pub rounds_completed: u32,
    /// Contributions received for the current round.
    pub contributions_received: usize,
    /// Pooled amount of one round.
    pub payout_amount: Option<Money>,
    /// Funds held for the circle.
    pub funds: Money,
    /// Whether emergency loans are offered.
    pub emergency_loans_enabled: bool,
    /// Loan cap percentage.
    pub max_loan_percentage: u8,
    /// Payout order; empty while forming.
    pub schedule: Vec<ScheduleEntry>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&CircleRecord> for CircleView {
    fn from(circle: &CircleRecord) -> Self {
        let schedule = if circle.status == CircleStatus::Forming {
            Vec::new()
        } else {
            rotation::schedule(&circle.member_ids())
                .into_iter()
                .map(|slot| ScheduleEntry {
                    payment_tx_id: circle
                        .payouts
                        .get(&slot.round)
                        .map(|p| p.payment_tx_id.clone()),
                    round: slot.round,
                    recipient: slot.recipient,
                })
                .collect()
        };

        Self {
            circle_id: circle.circle_id,
            name: circle.name.clone(),
            description: circle.description.clone(),
            creator: circle.creator.clone(),
            status: circle.status,
            monthly_contribution: circle.monthly_contribution,
            max_members: circle.max_members,
            members: circle.members.clone(),
            current_round: circle.current_round,
            rounds_completed: circle.rounds_completed(),
            contributions_received: circle.round_contributions(circle.current_round).len(),
            payout_amount: circle.payout_amount(),
            funds: circle.funds,
            emergency_loans_enabled: circle.emergency_loans_enabled,
            max_loan_percentage: circle.max_loan_percentage,
            schedule,
            created_at: circle.created_at,
        }
    }
}

/// A cast vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    /// Voter.
    pub voter: AccountId,
    /// Position.
    pub vote: VoteChoice,
}

/// A loan as seen at a given instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanView {
    /// Loan id.
    pub loan_id: LoanId,
    /// Lending circle.
    pub circle_id: CircleId,
    /// Borrower.
    pub borrower: AccountId,
    /// Principal.
    pub amount: Money,
    /// Why the money is needed.
    pub reason: String,
    /// Urgency.
    pub urgency: Urgency,
    /// Effective status; an expired vote reads as rejected.
    pub status: LoanStatus,
    /// Vote counts.
    pub tally: LoanTally,
    /// Individual votes.
    pub votes: Vec<VoteView>,
    /// Request time.
    pub requested_at: DateTime<Utc>,
    /// End of the voting window.
    pub voting_deadline: DateTime<Utc>,
    /// Seconds left to vote; zero once closed.
    pub time_remaining_secs: i64,
    /// Repayment window.
    pub repayment_period_days: u16,
    /// Disbursement details.
    pub disbursement: Option<Disbursement>,
    /// Principal minus repayments.
    pub outstanding: Money,
}

impl LoanView {
    /// Builds the view of `loan` at `now`.
    #[must_use]
    pub fn at(loan: &LoanRecord, now: DateTime<Utc>) -> Self {
        let status = loan.status_at(now);
        let time_remaining_secs = if status == LoanStatus::Voting {
            (loan.voting_deadline - now).num_seconds().max(0)
        } else {
            0
        };
        Self {
            loan_id: loan.loan_id,
            circle_id: loan.circle_id,
            borrower: loan.borrower.clone(),
            amount: loan.amount,
            reason: loan.reason.clone(),
            urgency: loan.urgency,
            status,
            tally: loan.tally(),
            votes: loan
                .votes
                .iter()
                .map(|(voter, vote)| VoteView {
                    voter: voter.clone(),
                    vote: *vote,
                })
                .collect(),
            requested_at: loan.requested_at,
            voting_deadline: loan.voting_deadline,
            time_remaining_secs,
            repayment_period_days: loan.repayment_period_days,
            disbursement: loan.disbursement.clone(),
            outstanding: loan.outstanding(),
        }
    }
}
