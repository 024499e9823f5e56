//! Emergency loans: request, vote, disburse, repay.
//!
//! # Modules
//!
//! - `types` - Loan status machine and results
//! - `tally` - Vote counting and quorum
//! - `service` - The loan engine
//! - `sweep` - Deadline and due-date sweep

pub mod service;
pub mod sweep;
pub mod tally;
pub mod types;

pub use service::EmergencyLoanEngine;
pub use types::{
    Disbursement, DisbursementReceipt, LoanRequestInput, LoanStatus, LoanTally, RepaymentReceipt,
    SweepReport, VoteReceipt,
};
