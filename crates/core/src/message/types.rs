//! Enumerations carried inside ledger messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a savings circle.
///
/// - Forming → Active (the last seat is filled)
/// - Active → Completed (every member has received one payout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircleStatus {
    /// Accepting members.
    Forming,
    /// Collecting contributions and paying out in rotation.
    Active,
    /// Every member has been paid once (immutable).
    Completed,
}

impl CircleStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forming => "forming",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CircleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently the borrower needs an emergency loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Can wait for the full voting window.
    Low,
    /// Default.
    #[default]
    Medium,
    /// Needs a decision as soon as possible.
    High,
}

/// A member's position on a loan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    /// Supports the loan.
    For,
    /// Opposes the loan.
    Against,
    /// Counted as present, supports neither side.
    Abstain,
}

/// Outcome recorded on a sister guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeStatus {
    /// Submitted, waiting for verification.
    Pending,
    /// Accepted by the verifier.
    Approved,
    /// Declined by the verifier.
    Rejected,
}

/// Why reward tokens were credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RewardReason {
    /// Reward for an on-time monthly contribution.
    Contribution,
    /// Bonus for staying in a circle until it completes.
    CircleCompletion,
    /// Reward for backing an emergency loan that was disbursed.
    EmergencySupport,
}

/// Whether a repayment settled the loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentStatus {
    /// Part of the balance is still outstanding.
    Partial,
    /// Nothing is left to repay.
    Completed,
}

/// Repayment windows a borrower may choose, in days.
pub const REPAYMENT_PERIODS_DAYS: [u16; 4] = [15, 30, 45, 60];

/// Repayment window used when the borrower does not choose one.
pub const DEFAULT_REPAYMENT_PERIOD_DAYS: u16 = 30;
