//! Ledger and governance core for savings circles.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Every state change is a typed message on an append-only log; circles, loans
//! and user profiles are folded from that log. Native currency and reward tokens
//! live on external ledgers reached through port traits.
//!
//! # Modules
//!
//! - `message` - Typed log messages
//! - `ports` - Message log, payment ledger, token ledger and clock contracts
//! - `projection` - Event-sourced read model
//! - `trust` - Registration, sister guarantees and verification
//! - `circle` - Circle creation, membership and payout rotation
//! - `contribution` - Contribution intake, rewards and payouts
//! - `loan` - Emergency loan voting, disbursement and repayment
//! - `facade` - One entry point over all of the above

pub mod circle;
pub mod context;
pub mod contribution;
pub mod error;
pub mod facade;
pub mod loan;
pub mod message;
pub mod ports;
pub mod projection;
pub mod trust;

pub use context::{AggregateId, Halt, RECONCILIATION_TARGET};
pub use error::{CoreError, ErrorKind};
pub use facade::LedgerFacade;
