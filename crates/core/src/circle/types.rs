//! Circle registry inputs and results.

use serde::{Deserialize, Serialize};
use susu_shared::types::{AccountId, Money, TxId};

use crate::message::CircleStatus;

/// Input of a circle creation.
#[derive(Debug, Clone)]
pub struct NewCircle {
    /// Display name.
    pub name: String,
    /// Creator; takes the first seat.
    pub creator: AccountId,
    /// Creator's name inside the circle; defaults to the profile name.
    pub creator_name: Option<String>,
    /// Contribution each member pays per round.
    pub monthly_contribution: Money,
    /// Number of seats.
    pub max_members: u32,
    /// Free text.
    pub description: Option<String>,
    /// Whether members may request emergency loans.
    pub emergency_loans_enabled: bool,
    /// Loan cap as a percentage of circle funds; defaults to the platform default.
    pub max_loan_percentage: Option<u8>,
}

/// Result of closing a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundAdvance {
    /// Log transaction of the CIRCLE_UPDATE message.
    pub tx_id: TxId,
    /// Round after the update.
    pub round: u32,
    /// Status after the update.
    pub status: CircleStatus,
    /// Log transactions of completion bonuses, when the circle completed.
    pub completion_rewards: Vec<TxId>,
}
