//! Event-sourced read model.
//!
//! # Modules
//!
//! - `state` - Folded users, circles, loans and reward totals
//! - `apply` - The pure fold over ledger messages
//! - `store` - Cache that catches up with the log before every read

pub mod apply;
pub mod state;
pub mod store;

#[cfg(test)]
mod replay_props;

pub use state::{
    CircleRecord, ContributionRecord, Guarantors, LedgerState, LoanRecord, Member, PayoutRecord,
    UserProfile,
};
pub use store::ProjectionStore;
