//! Typed messages recorded on the message log.
//!
//! Every state change of the core is one [`LedgerMessage`]. The log is the source
//! of truth; circles, loans and user profiles are folded from it in sequence order.
//!
//! On the wire a message is a JSON object:
//!
//! ```json
//! {"type": "MEMBER_JOIN", "timestamp": "...", "version": "1.0.0", "data": {...}}
//! ```

pub mod types;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use susu_shared::types::{AccountId, CircleId, LoanId, Money, SequenceId, TokenAmount, TxId};

pub use types::{
    CircleStatus, DEFAULT_REPAYMENT_PERIOD_DAYS, GuaranteeStatus, REPAYMENT_PERIODS_DAYS,
    RepaymentStatus, RewardReason, Urgency, VoteChoice,
};

/// Envelope around a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerMessage {
    /// When the command that produced the message ran.
    pub timestamp: DateTime<Utc>,
    /// Message schema version.
    pub version: String,
    /// Type tag and data.
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl LedgerMessage {
    /// Wraps a payload.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, version: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            timestamp,
            version: version.into(),
            payload,
        }
    }

    /// Returns the `type` tag.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        self.payload.message_type()
    }
}

/// A message together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedMessage {
    /// Position in the log.
    pub sequence: SequenceId,
    /// Transaction id the log assigned on submit.
    pub tx_id: TxId,
    /// The message.
    pub message: LedgerMessage,
}

/// All message kinds understood by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePayload {
    /// A new user profile.
    UserRegistration(UserRegistration),
    /// Two users vouch for a new member.
    SisterGuarantee(SisterGuarantee),
    /// A user was verified and associated with the token ledger.
    UserVerification(UserVerification),
    /// A new circle.
    CircleCreation(CircleCreation),
    /// A member took a seat in a forming circle.
    MemberJoin(MemberJoin),
    /// A circle moved to its next round or completed.
    CircleUpdate(CircleUpdate),
    /// A monthly contribution was paid into the treasury.
    Contribution(Contribution),
    /// Reward tokens were credited.
    RewardIssuance(RewardIssuance),
    /// The pooled round was paid to the rotation recipient.
    PayoutDistribution(PayoutDistribution),
    /// A member asked the circle for an emergency loan.
    EmergencyLoanRequest(EmergencyLoanRequest),
    /// A member voted on a loan request.
    EmergencyLoanVote(EmergencyLoanVote),
    /// An approved loan was disbursed.
    EmergencyLoanApproval(EmergencyLoanApproval),
    /// The borrower paid back part or all of a loan.
    EmergencyLoanRepayment(EmergencyLoanRepayment),
    /// Voting closed without quorum.
    EmergencyLoanRejection(EmergencyLoanRejection),
    /// A disbursed loan passed its due date unpaid.
    EmergencyLoanOverdue(EmergencyLoanOverdue),
}

impl MessagePayload {
    /// Returns the `type` tag used on the wire.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::UserRegistration(_) => "USER_REGISTRATION",
            Self::SisterGuarantee(_) => "SISTER_GUARANTEE",
            Self::UserVerification(_) => "USER_VERIFICATION",
            Self::CircleCreation(_) => "CIRCLE_CREATION",
            Self::MemberJoin(_) => "MEMBER_JOIN",
            Self::CircleUpdate(_) => "CIRCLE_UPDATE",
            Self::Contribution(_) => "CONTRIBUTION",
            Self::RewardIssuance(_) => "REWARD_ISSUANCE",
            Self::PayoutDistribution(_) => "PAYOUT_DISTRIBUTION",
            Self::EmergencyLoanRequest(_) => "EMERGENCY_LOAN_REQUEST",
            Self::EmergencyLoanVote(_) => "EMERGENCY_LOAN_VOTE",
            Self::EmergencyLoanApproval(_) => "EMERGENCY_LOAN_APPROVAL",
            Self::EmergencyLoanRepayment(_) => "EMERGENCY_LOAN_REPAYMENT",
            Self::EmergencyLoanRejection(_) => "EMERGENCY_LOAN_REJECTION",
            Self::EmergencyLoanOverdue(_) => "EMERGENCY_LOAN_OVERDUE",
        }
    }
}

/// USER_REGISTRATION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    /// Ledger account of the user.
    pub account_id: AccountId,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone_number: String,
    /// First guarantor named at sign-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarantor1: Option<AccountId>,
    /// Second guarantor named at sign-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarantor2: Option<AccountId>,
}

/// SISTER_GUARANTEE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SisterGuarantee {
    /// The user being vouched for.
    pub new_member: AccountId,
    /// First guarantor.
    pub guarantor1: AccountId,
    /// Second guarantor.
    pub guarantor2: AccountId,
    /// Guarantee outcome.
    pub verification_status: GuaranteeStatus,
}

/// USER_VERIFICATION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVerification {
    /// Verified account.
    pub account_id: AccountId,
    /// Verification outcome.
    pub is_verified: bool,
    /// Who performed the verification.
    pub verified_by: String,
}

/// CIRCLE_CREATION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleCreation {
    /// Fresh circle id.
    pub circle_id: CircleId,
    /// Display name.
    pub name: String,
    /// Creator; takes the first seat.
    pub creator: AccountId,
    /// Creator's display name inside the circle.
    pub creator_name: String,
    /// Contribution each member pays per round.
    pub monthly_contribution: Money,
    /// Number of seats.
    pub max_members: u32,
    /// Free text shown to prospective members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether members may request emergency loans.
    pub emergency_loans_enabled: bool,
    /// Largest loan as a percentage of circle funds.
    pub max_loan_percentage: u8,
}

/// MEMBER_JOIN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberJoin {
    /// Circle being joined.
    pub circle_id: CircleId,
    /// Joining account.
    pub member_account_id: AccountId,
    /// Display name inside the circle.
    pub member_name: String,
}

/// CIRCLE_UPDATE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleUpdate {
    /// Circle that advanced.
    pub circle_id: CircleId,
    /// Round after the update.
    pub round: u32,
    /// Status after the update.
    pub status: CircleStatus,
}

/// CONTRIBUTION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    /// Receiving circle.
    pub circle_id: CircleId,
    /// Paying member.
    pub member_account_id: AccountId,
    /// Amount paid into the treasury.
    pub amount: Money,
    /// Round the payment belongs to.
    pub round: u32,
    /// Payment ledger transaction.
    pub transaction_id: TxId,
    /// Reward credited for this contribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_tokens: Option<TokenAmount>,
}

/// REWARD_ISSUANCE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardIssuance {
    /// Credited account.
    pub account_id: AccountId,
    /// Tokens credited.
    pub amount: TokenAmount,
    /// Why the tokens were credited.
    pub reason: RewardReason,
    /// Token ledger transaction.
    pub transaction_id: TxId,
    /// Circle the reward relates to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle_id: Option<CircleId>,
}

/// PAYOUT_DISTRIBUTION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDistribution {
    /// Paying circle.
    pub circle_id: CircleId,
    /// Rotation recipient of the round.
    pub recipient_account_id: AccountId,
    /// Pooled amount.
    pub amount: Money,
    /// Round being paid out.
    pub round: u32,
    /// Payment ledger transaction.
    pub transaction_id: TxId,
}

/// EMERGENCY_LOAN_REQUEST
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLoanRequest {
    /// Fresh loan id.
    pub loan_id: LoanId,
    /// Lending circle.
    pub circle_id: CircleId,
    /// Requesting member.
    pub borrower_account_id: AccountId,
    /// Requested amount.
    pub amount: Money,
    /// Why the money is needed.
    pub reason: String,
    /// Urgency chosen by the borrower.
    pub urgency_level: Urgency,
    /// Days between disbursement and the due date.
    pub repayment_period_days: u16,
    /// Cap percentage in force at request time.
    pub max_loan_percentage: u8,
    /// Circle funds at request time.
    pub circle_funds: Money,
    /// Circle size at request time; the quorum is derived from it.
    pub member_count: u32,
    /// Votes after this instant are not counted.
    pub voting_deadline: DateTime<Utc>,
}

/// EMERGENCY_LOAN_VOTE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLoanVote {
    /// Loan voted on.
    pub loan_id: LoanId,
    /// Voting member.
    pub voter_account_id: AccountId,
    /// The vote.
    pub vote: VoteChoice,
    /// Display name of the voter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_name: Option<String>,
}

/// EMERGENCY_LOAN_APPROVAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLoanApproval {
    /// Disbursed loan.
    pub loan_id: LoanId,
    /// Receiving borrower.
    pub borrower_account_id: AccountId,
    /// Disbursed amount.
    pub amount: Money,
    /// Repayment due date.
    pub due_date: DateTime<Utc>,
    /// Payment ledger transaction.
    pub transaction_id: TxId,
}

/// EMERGENCY_LOAN_REPAYMENT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLoanRepayment {
    /// Loan being repaid.
    pub loan_id: LoanId,
    /// Paying borrower.
    pub borrower_account_id: AccountId,
    /// Amount repaid.
    pub amount: Money,
    /// Whether the loan is settled after this payment.
    pub status: RepaymentStatus,
    /// Payment ledger transaction.
    pub transaction_id: TxId,
}

/// EMERGENCY_LOAN_REJECTION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLoanRejection {
    /// Rejected loan.
    pub loan_id: LoanId,
    /// "For" votes when voting closed.
    pub votes_for: u32,
    /// Votes that were needed.
    pub quorum: u32,
}

/// EMERGENCY_LOAN_OVERDUE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLoanOverdue {
    /// Overdue loan.
    pub loan_id: LoanId,
    /// Unpaid balance.
    pub outstanding: Money,
    /// Missed due date.
    pub due_date: DateTime<Utc>,
}
