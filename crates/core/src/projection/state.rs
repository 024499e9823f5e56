//! Read model folded from the message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use susu_shared::VotePolicy;
use susu_shared::types::{AccountId, CircleId, LoanId, Money, SequenceId, TokenAmount, TxId};

use crate::circle::rotation;
use crate::loan::tally;
use crate::loan::types::{Disbursement, LoanStatus, LoanTally};
use crate::message::{CircleStatus, GuaranteeStatus, Urgency, VoteChoice};

/// Two users vouching for a third.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guarantors {
    /// First guarantor.
    pub first: AccountId,
    /// Second guarantor.
    pub second: AccountId,
    /// Guarantee outcome.
    pub status: GuaranteeStatus,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Ledger account.
    pub account_id: AccountId,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Whether the user passed verification.
    pub verified: bool,
    /// Who verified the user.
    pub verified_by: Option<String>,
    /// Log transaction of the verification.
    pub verification_tx_id: Option<TxId>,
    /// Sister guarantee, once two users vouched.
    pub guarantors: Option<Guarantors>,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
}

/// A seat in a circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Member account.
    pub account_id: AccountId,
    /// Display name inside the circle.
    pub name: String,
    /// Join time.
    pub joined_at: DateTime<Utc>,
}

/// An accepted monthly contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionRecord {
    /// Paying member.
    pub member_account_id: AccountId,
    /// Amount paid.
    pub amount: Money,
    /// Round paid for.
    pub round: u32,
    /// Payment ledger transaction.
    pub payment_tx_id: TxId,
    /// Reward credited, if any.
    pub reward_tokens: Option<TokenAmount>,
}

/// A distributed payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    /// Round paid out.
    pub round: u32,
    /// Rotation recipient.
    pub recipient_account_id: AccountId,
    /// Pooled amount.
    pub amount: Money,
    /// Payment ledger transaction.
    pub payment_tx_id: TxId,
}

/// A circle as folded from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircleRecord {
    /// Circle id.
    pub circle_id: CircleId,
    /// Display name.
    pub name: String,
    /// Free text.
    pub description: Option<String>,
    /// Creator, holder of the first seat.
    pub creator: AccountId,
    /// Per-member contribution per round.
    pub monthly_contribution: Money,
    /// Number of seats.
    pub max_members: u32,
    /// Seats in join order, which is the payout order.
    pub members: Vec<Member>,
    /// Round currently collecting contributions; `members + 1` once completed.
    pub current_round: u32,
    /// Lifecycle status.
    pub status: CircleStatus,
    /// Whether members may request emergency loans.
    pub emergency_loans_enabled: bool,
    /// Loan cap as a percentage of circle funds.
    pub max_loan_percentage: u8,
    /// Accepted contributions per round, in log order.
    pub contributions: BTreeMap<u32, Vec<ContributionRecord>>,
    /// Payouts per round.
    pub payouts: BTreeMap<u32, PayoutRecord>,
    /// Contributions and repayments minus payouts and disbursements.
    pub funds: Money,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the last seat was filled.
    pub activated_at: Option<DateTime<Utc>>,
}

impl CircleRecord {
    /// Member accounts in payout order.
    #[must_use]
    pub fn member_ids(&self) -> Vec<AccountId> {
        self.members.iter().map(|m| m.account_id.clone()).collect()
    }

    /// Number of members.
    #[must_use]
    pub fn member_count(&self) -> u32 {
        u32::try_from(self.members.len()).unwrap_or(u32::MAX)
    }

    /// Returns true if the account holds a seat.
    #[must_use]
    pub fn is_member(&self, account: &AccountId) -> bool {
        self.members.iter().any(|m| &m.account_id == account)
    }

    /// Returns true if every seat is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.member_count() >= self.max_members
    }

    /// Contributions accepted for a round.
    #[must_use]
    pub fn round_contributions(&self, round: u32) -> &[ContributionRecord] {
        self.contributions
            .get(&round)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The member's contribution for a round, if any.
    #[must_use]
    pub fn contribution(&self, round: u32, account: &AccountId) -> Option<&ContributionRecord> {
        self.round_contributions(round)
            .iter()
            .find(|c| &c.member_account_id == account)
    }

    /// Sum of the contributions accepted for a round.
    #[must_use]
    pub fn round_total(&self, round: u32) -> Money {
        self.round_contributions(round).iter().map(|c| c.amount).sum()
    }

    /// Returns true once every member has contributed for the round.
    #[must_use]
    pub fn round_collected(&self, round: u32) -> bool {
        !self.members.is_empty() && self.round_contributions(round).len() == self.members.len()
    }

    /// Pooled amount paid out each round.
    #[must_use]
    pub fn payout_amount(&self) -> Option<Money> {
        self.monthly_contribution.checked_times(self.members.len())
    }

    /// Rotation recipient of a round.
    #[must_use]
    pub fn recipient(&self, round: u32) -> Option<AccountId> {
        rotation::recipient(&self.member_ids(), round).cloned()
    }

    /// Round and status after the current round is closed.
    ///
    /// The round always increments; passing the last seat completes the circle.
    #[must_use]
    pub fn next_round(&self) -> (u32, CircleStatus) {
        let round = self.current_round.saturating_add(1);
        if round > self.member_count() {
            (round, CircleStatus::Completed)
        } else {
            (round, CircleStatus::Active)
        }
    }

    /// Rounds paid out and closed so far.
    #[must_use]
    pub fn rounds_completed(&self) -> u32 {
        self.current_round
            .saturating_sub(1)
            .min(self.member_count())
    }
}

/// A loan as folded from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRecord {
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
    /// Status as of the last folded message.
    pub status: LoanStatus,
    /// Request time.
    pub requested_at: DateTime<Utc>,
    /// End of the voting window.
    pub voting_deadline: DateTime<Utc>,
    /// Days between disbursement and due date.
    pub repayment_period_days: u16,
    /// Cap percentage at request time.
    pub max_loan_percentage: u8,
    /// Circle funds at request time.
    pub circle_funds: Money,
    /// Circle size at request time.
    pub member_count: u32,
    /// One vote per voter.
    pub votes: BTreeMap<AccountId, VoteChoice>,
    /// When quorum was reached.
    pub approved_at: Option<DateTime<Utc>>,
    /// Disbursement details.
    pub disbursement: Option<Disbursement>,
    /// Repaid so far.
    pub repaid: Money,
    /// When the loan reached a terminal state.
    pub closed_at: Option<DateTime<Utc>>,
}

impl LoanRecord {
    /// Current vote counts.
    #[must_use]
    pub fn tally(&self) -> LoanTally {
        tally::tally(&self.votes, self.member_count)
    }

    /// Principal minus repayments.
    #[must_use]
    pub fn outstanding(&self) -> Money {
        self.amount.saturating_sub(self.repaid)
    }

    /// Status as seen at `now`.
    ///
    /// A loan still voting after its deadline is rejected even before the sweep
    /// records it.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> LoanStatus {
        match self.status {
            LoanStatus::Voting if now > self.voting_deadline => LoanStatus::Rejected,
            status => status,
        }
    }

    /// Due date, once disbursed.
    #[must_use]
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.disbursement.as_ref().map(|d| d.due_date)
    }
}

/// Everything folded from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    /// Profiles by account.
    pub users: HashMap<AccountId, UserProfile>,
    /// Circles by id.
    pub circles: HashMap<CircleId, CircleRecord>,
    /// Circle ids in creation order.
    pub circle_order: Vec<CircleId>,
    /// Loans by id.
    pub loans: HashMap<LoanId, LoanRecord>,
    /// Loan ids in request order.
    pub loan_order: Vec<LoanId>,
    /// Reward tokens credited per account.
    pub rewards: HashMap<AccountId, TokenAmount>,
    /// Last folded position.
    pub last_sequence: SequenceId,
    /// Vote mutability applied by the fold.
    pub vote_policy: VotePolicy,
}

impl LedgerState {
    /// An empty state.
    #[must_use]
    pub fn new(vote_policy: VotePolicy) -> Self {
        Self {
            users: HashMap::new(),
            circles: HashMap::new(),
            circle_order: Vec::new(),
            loans: HashMap::new(),
            loan_order: Vec::new(),
            rewards: HashMap::new(),
            last_sequence: SequenceId::ZERO,
            vote_policy,
        }
    }

    /// Profile of an account.
    #[must_use]
    pub fn user(&self, account: &AccountId) -> Option<&UserProfile> {
        self.users.get(account)
    }

    /// Circle by id.
    #[must_use]
    pub fn circle(&self, circle_id: &CircleId) -> Option<&CircleRecord> {
        self.circles.get(circle_id)
    }

    /// Loan by id.
    #[must_use]
    pub fn loan(&self, loan_id: &LoanId) -> Option<&LoanRecord> {
        self.loans.get(loan_id)
    }

    /// Circles in creation order.
    pub fn circles_in_order(&self) -> impl Iterator<Item = &CircleRecord> {
        self.circle_order.iter().filter_map(|id| self.circles.get(id))
    }

    /// Loans of a circle in request order.
    pub fn loans_of_circle<'a>(
        &'a self,
        circle_id: &'a CircleId,
    ) -> impl Iterator<Item = &'a LoanRecord> + 'a {
        self.loan_order
            .iter()
            .filter_map(|id| self.loans.get(id))
            .filter(move |loan| &loan.circle_id == circle_id)
    }

    /// Number of circles the account belongs to that have not completed.
    #[must_use]
    pub fn unfinished_circles_of(&self, account: &AccountId) -> usize {
        self.circles
            .values()
            .filter(|c| c.status != CircleStatus::Completed && c.is_member(account))
            .count()
    }

    /// Number of the borrower's loans that are still open at `now`.
    #[must_use]
    pub fn open_loans_of(&self, borrower: &AccountId, now: DateTime<Utc>) -> usize {
        self.loans
            .values()
            .filter(|l| &l.borrower == borrower && l.status_at(now).is_open())
            .count()
    }

    /// Reward tokens credited to the account so far.
    #[must_use]
    pub fn reward_total(&self, account: &AccountId) -> TokenAmount {
        self.rewards.get(account).copied().unwrap_or_default()
    }
}
