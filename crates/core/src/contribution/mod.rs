//! Monthly contribution intake, reward issuance and payout distribution.

pub mod rewards;
pub mod service;
pub mod types;

pub use service::ContributionProcessor;
pub use types::{ContributionReceipt, PayoutOutcome, PayoutReceipt};
