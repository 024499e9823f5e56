//! User registration, sister guarantees and verification.

pub mod service;

pub use service::{NewUser, TrustGuaranteeService};
