//! Error types for the ledger core.
//!
//! Every operation returns a typed success value or a [`CoreError`]. Each variant
//! belongs to one [`ErrorKind`], which decides how callers and the HTTP layer
//! treat it.

use std::fmt;
use susu_shared::AppError;
use susu_shared::types::{AccountId, CircleId, LoanId, Money, TxId};
use thiserror::Error;

use crate::context::AggregateId;
use crate::loan::LoanStatus;
use crate::message::CircleStatus;
use crate::ports::{LogError, PaymentError, TokenError};

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// The request conflicts with the current state.
    StateConflict,
    /// The caller may not perform the action.
    Authorization,
    /// A platform or circle limit would be exceeded.
    LimitExceeded,
    /// Funds or token accounts are missing.
    Resource,
    /// The ledgers and the log disagree; an operator must reconcile.
    Consistency,
    /// The referenced entity does not exist.
    NotFound,
    /// A port could not be reached before any side effect happened.
    Infrastructure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::StateConflict => "state_conflict",
            Self::Authorization => "authorization",
            Self::LimitExceeded => "limit_exceeded",
            Self::Resource => "resource",
            Self::Consistency => "consistency",
            Self::NotFound => "not_found",
            Self::Infrastructure => "infrastructure",
        };
        f.write_str(name)
    }
}

/// What was wrong with a contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionProblem {
    /// The amount differs from the circle's monthly contribution.
    WrongAmount {
        /// Monthly contribution of the circle.
        expected: Money,
        /// Amount offered.
        actual: Money,
    },
    /// The round is not the circle's current round.
    WrongRound {
        /// Current round of the circle.
        expected: u32,
        /// Round offered.
        actual: u32,
    },
}

impl fmt::Display for ContributionProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongAmount { expected, actual } => {
                write!(f, "amount {actual} does not match monthly contribution {expected}")
            }
            Self::WrongRound { expected, actual } => {
                write!(f, "round {actual} is not the current round {expected}")
            }
        }
    }
}

/// Errors raised by the ledger core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input is blank, malformed or out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The account already has a profile.
    #[error("Account {0} is already registered")]
    DuplicateRegistration(AccountId),

    /// Guarantors must be two distinct accounts other than the new member.
    #[error("Invalid guarantors: {0}")]
    InvalidGuarantor(String),

    /// Only verified users may vouch for others.
    #[error("Guarantor {0} is not verified")]
    GuarantorNotVerified(AccountId),

    /// No profile exists for the account.
    #[error("User {0} not found")]
    UserNotFound(AccountId),

    /// Circle name, size, contribution or loan percentage is out of range.
    #[error("Invalid circle parameters: {0}")]
    InvalidCircleParameters(String),

    /// Circle not found.
    #[error("Circle {0} not found")]
    CircleNotFound(CircleId),

    /// Every seat is taken.
    #[error("Circle {circle_id} is full ({max_members} members)")]
    CircleFull {
        /// The circle.
        circle_id: CircleId,
        /// Seats in the circle.
        max_members: u32,
    },

    /// The account already holds a seat.
    #[error("Account {account_id} is already a member of circle {circle_id}")]
    AlreadyMember {
        /// The circle.
        circle_id: CircleId,
        /// The account.
        account_id: AccountId,
    },

    /// Members can only join while the circle is forming.
    #[error("Circle {circle_id} is not accepting members (status {status})")]
    CircleNotForming {
        /// The circle.
        circle_id: CircleId,
        /// Its current status.
        status: CircleStatus,
    },

    /// The operation needs an active circle.
    #[error("Circle {circle_id} is not active (status {status})")]
    CircleNotActive {
        /// The circle.
        circle_id: CircleId,
        /// Its current status.
        status: CircleStatus,
    },

    /// The account already belongs to too many unfinished circles.
    #[error("Account {account_id} already belongs to {limit} unfinished circles")]
    TooManyCircles {
        /// The account.
        account_id: AccountId,
        /// Configured limit.
        limit: usize,
    },

    /// The contribution does not match the circle's terms.
    #[error("Invalid contribution: {0}")]
    InvalidContribution(ContributionProblem),

    /// The member already contributed for the round.
    #[error("Account {account_id} already contributed to circle {circle_id} for round {round}")]
    DuplicateContribution {
        /// The circle.
        circle_id: CircleId,
        /// The member.
        account_id: AccountId,
        /// The round.
        round: u32,
    },

    /// Not every member has contributed, or the payout is missing.
    #[error("Round {round} of circle {circle_id} is not complete: {detail}")]
    RoundNotComplete {
        /// The circle.
        circle_id: CircleId,
        /// The round.
        round: u32,
        /// What is missing.
        detail: String,
    },

    /// The round has already been paid out.
    #[error("Round {round} of circle {circle_id} has already been paid out")]
    PayoutAlreadyDistributed {
        /// The circle.
        circle_id: CircleId,
        /// The round.
        round: u32,
    },

    /// Part of the round's pool is lent out; the payout waits for repayments.
    #[error("Round {round} of circle {circle_id} awaits loan repayments: circle holds {available}, {required} required")]
    PayoutAwaitingRepayment {
        /// The circle.
        circle_id: CircleId,
        /// The round.
        round: u32,
        /// Amount to pay.
        required: Money,
        /// Circle funds folded from the log.
        available: Money,
    },

    /// The treasury cannot cover a payout or disbursement.
    #[error("Treasury holds {available}, {required} required")]
    InsufficientTreasuryFunds {
        /// Amount to pay.
        required: Money,
        /// Treasury balance reported by the ledger.
        available: Money,
    },

    /// A member's account cannot cover a payment.
    #[error("Account {account_id} holds {available}, {required} required")]
    InsufficientFunds {
        /// Paying account.
        account_id: AccountId,
        /// Amount to pay.
        required: Money,
        /// Balance reported by the ledger.
        available: Money,
    },

    /// The account must be associated with the reward token first.
    #[error("Account {0} is not associated with the reward token")]
    TokenAccountNotAssociated(AccountId),

    /// Loan not found.
    #[error("Loan {0} not found")]
    LoanNotFound(LoanId),

    /// The circle does not offer emergency loans.
    #[error("Emergency loans are disabled for circle {0}")]
    LoansDisabled(CircleId),

    /// The requested amount is above the circle's cap.
    #[error("Requested {requested} exceeds the loan cap of {cap}")]
    LoanLimitExceeded {
        /// Requested amount.
        requested: Money,
        /// Cap at request time.
        cap: Money,
    },

    /// The requested amount is below the platform minimum.
    #[error("Requested {requested} is below the minimum loan of {minimum}")]
    LoanBelowMinimum {
        /// Requested amount.
        requested: Money,
        /// Platform minimum.
        minimum: Money,
    },

    /// The borrower already has too many open loans.
    #[error("Account {account_id} already has {limit} active loans")]
    TooManyActiveLoans {
        /// Borrower.
        account_id: AccountId,
        /// Configured limit.
        limit: usize,
    },

    /// Votes are only accepted while the loan is voting and before the deadline.
    #[error("Loan {loan_id} is not open for voting (status {status})")]
    LoanNotVoting {
        /// The loan.
        loan_id: LoanId,
        /// Its current status.
        status: LoanStatus,
    },

    /// Borrowers cannot vote on their own loan.
    #[error("Borrower cannot vote on own loan {0}")]
    SelfVote(LoanId),

    /// Only members of the circle may take part.
    #[error("Account {account_id} is not a member of circle {circle_id}")]
    NotCircleMember {
        /// The circle.
        circle_id: CircleId,
        /// The account.
        account_id: AccountId,
    },

    /// Votes are final under the configured policy.
    #[error("Account {account_id} has already voted on loan {loan_id}")]
    AlreadyVoted {
        /// The loan.
        loan_id: LoanId,
        /// The voter.
        account_id: AccountId,
    },

    /// Only approved loans can be disbursed.
    #[error("Loan {loan_id} is not approved (status {status})")]
    LoanNotApproved {
        /// The loan.
        loan_id: LoanId,
        /// Its current status.
        status: LoanStatus,
    },

    /// Only disbursed loans can be repaid.
    #[error("Loan {loan_id} cannot be repaid (status {status})")]
    LoanNotRepayable {
        /// The loan.
        loan_id: LoanId,
        /// Its current status.
        status: LoanStatus,
    },

    /// The repayment is larger than what is owed.
    #[error("Repayment of {amount} exceeds outstanding balance {outstanding}")]
    RepaymentExceedsOutstanding {
        /// Offered amount.
        amount: Money,
        /// Outstanding balance.
        outstanding: Money,
    },

    /// A ledger side effect happened but could not be recorded.
    #[error("Ledger transaction {side_effect} on {aggregate} was not recorded: {reason}")]
    Consistency {
        /// Halted aggregate.
        aggregate: AggregateId,
        /// The unrecorded ledger transaction.
        side_effect: TxId,
        /// Underlying failure.
        reason: String,
    },

    /// The aggregate is waiting for an operator to reconcile it.
    #[error("{0} is halted pending reconciliation")]
    AggregateHalted(AggregateId),

    /// A port could not be reached.
    #[error("Infrastructure failure: {0}")]
    Infrastructure(String),
}

impl CoreError {
    /// Returns the kind of failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidGuarantor(_)
            | Self::InvalidCircleParameters(_)
            | Self::LoanBelowMinimum { .. }
            | Self::RepaymentExceedsOutstanding { .. } => ErrorKind::Validation,

            Self::InvalidContribution(problem) => match problem {
                ContributionProblem::WrongAmount { .. } => ErrorKind::Validation,
                ContributionProblem::WrongRound { .. } => ErrorKind::StateConflict,
            },

            Self::DuplicateRegistration(_)
            | Self::CircleFull { .. }
            | Self::AlreadyMember { .. }
            | Self::CircleNotForming { .. }
            | Self::CircleNotActive { .. }
            | Self::DuplicateContribution { .. }
            | Self::RoundNotComplete { .. }
            | Self::PayoutAlreadyDistributed { .. }
            | Self::PayoutAwaitingRepayment { .. }
            | Self::LoansDisabled(_)
            | Self::LoanNotVoting { .. }
            | Self::AlreadyVoted { .. }
            | Self::LoanNotApproved { .. }
            | Self::LoanNotRepayable { .. } => ErrorKind::StateConflict,

            Self::SelfVote(_) | Self::NotCircleMember { .. } | Self::GuarantorNotVerified(_) => {
                ErrorKind::Authorization
            }

            Self::LoanLimitExceeded { .. }
            | Self::TooManyActiveLoans { .. }
            | Self::TooManyCircles { .. } => ErrorKind::LimitExceeded,

            Self::InsufficientTreasuryFunds { .. }
            | Self::InsufficientFunds { .. }
            | Self::TokenAccountNotAssociated(_) => ErrorKind::Resource,

            Self::UserNotFound(_) | Self::CircleNotFound(_) | Self::LoanNotFound(_) => {
                ErrorKind::NotFound
            }

            Self::Consistency { .. } | Self::AggregateHalted(_) => ErrorKind::Consistency,

            Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::StateConflict => 409,
            ErrorKind::LimitExceeded | ErrorKind::Resource => 422,
            ErrorKind::Consistency => 500,
            ErrorKind::Infrastructure => 503,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::DuplicateRegistration(_) => "DUPLICATE_REGISTRATION",
            Self::InvalidGuarantor(_) => "INVALID_GUARANTOR",
            Self::GuarantorNotVerified(_) => "GUARANTOR_NOT_VERIFIED",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::InvalidCircleParameters(_) => "INVALID_CIRCLE_PARAMETERS",
            Self::CircleNotFound(_) => "CIRCLE_NOT_FOUND",
            Self::CircleFull { .. } => "CIRCLE_FULL",
            Self::AlreadyMember { .. } => "ALREADY_MEMBER",
            Self::CircleNotForming { .. } => "CIRCLE_NOT_FORMING",
            Self::CircleNotActive { .. } => "CIRCLE_NOT_ACTIVE",
            Self::TooManyCircles { .. } => "TOO_MANY_CIRCLES",
            Self::InvalidContribution(_) => "INVALID_CONTRIBUTION",
            Self::DuplicateContribution { .. } => "DUPLICATE_CONTRIBUTION",
            Self::RoundNotComplete { .. } => "ROUND_NOT_COMPLETE",
            Self::PayoutAlreadyDistributed { .. } => "PAYOUT_ALREADY_DISTRIBUTED",
            Self::PayoutAwaitingRepayment { .. } => "PAYOUT_AWAITING_REPAYMENT",
            Self::InsufficientTreasuryFunds { .. } => "INSUFFICIENT_TREASURY_FUNDS",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::TokenAccountNotAssociated(_) => "TOKEN_ACCOUNT_NOT_ASSOCIATED",
            Self::LoanNotFound(_) => "LOAN_NOT_FOUND",
            Self::LoansDisabled(_) => "LOANS_DISABLED",
            Self::LoanLimitExceeded { .. } => "LOAN_LIMIT_EXCEEDED",
            Self::LoanBelowMinimum { .. } => "LOAN_BELOW_MINIMUM",
            Self::TooManyActiveLoans { .. } => "TOO_MANY_ACTIVE_LOANS",
            Self::LoanNotVoting { .. } => "LOAN_NOT_VOTING",
            Self::SelfVote(_) => "SELF_VOTE",
            Self::NotCircleMember { .. } => "NOT_CIRCLE_MEMBER",
            Self::AlreadyVoted { .. } => "ALREADY_VOTED",
            Self::LoanNotApproved { .. } => "LOAN_NOT_APPROVED",
            Self::LoanNotRepayable { .. } => "LOAN_NOT_REPAYABLE",
            Self::RepaymentExceedsOutstanding { .. } => "REPAYMENT_EXCEEDS_OUTSTANDING",
            Self::Consistency { .. } => "RECONCILIATION_REQUIRED",
            Self::AggregateHalted(_) => "AGGREGATE_HALTED",
            Self::Infrastructure(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Returns true if the same request may succeed when retried unchanged.
    ///
    /// Only infrastructure failures qualify; they are raised before any
    /// ledger side effect.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Infrastructure)
    }
}

impl From<LogError> for CoreError {
    fn from(err: LogError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

impl From<PaymentError> for CoreError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InsufficientFunds {
                account,
                available,
                requested,
            } => Self::InsufficientFunds {
                account_id: account,
                required: requested,
                available,
            },
            PaymentError::InvalidTransfer(reason) => Self::InvalidInput(reason),
            PaymentError::Unavailable(reason) => {
                Self::Infrastructure(format!("payment ledger: {reason}"))
            }
        }
    }
}

impl From<TokenError> for CoreError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotAssociated(account) => Self::TokenAccountNotAssociated(account),
            TokenError::InvalidAmount(amount) => {
                Self::InvalidInput(format!("invalid token amount {amount}"))
            }
            TokenError::InsufficientBalance { .. } | TokenError::Unavailable(_) => {
                Self::Infrastructure(format!("token ledger: {err}"))
            }
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::StateConflict => Self::Conflict(message),
            ErrorKind::Authorization => Self::Forbidden(message),
            ErrorKind::LimitExceeded | ErrorKind::Resource => Self::BusinessRule(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Consistency => Self::Reconciliation(message),
            ErrorKind::Infrastructure => Self::ServiceUnavailable(message),
        }
    }
}
