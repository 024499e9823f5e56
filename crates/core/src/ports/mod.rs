//! Contracts the core depends on.
//!
//! The core never owns ledger state. It submits messages to a [`MessageLog`],
//! moves native currency through a [`PaymentLedger`] and credits reward tokens
//! through a [`TokenLedger`]. Any backing store that implements these traits can
//! run the core; [`memory`] holds process-local implementations.

pub mod clock;
pub mod log;
pub mod memory;
pub mod payment;
pub mod token;

use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use log::{LogError, MessageLog, MessageStream, Receipt};
pub use payment::{PaymentError, PaymentLedger};
pub use token::{TokenError, TokenLedger};

/// The collaborators a core instance runs against.
#[derive(Clone)]
pub struct Ports {
    /// Ordered append-only message log.
    pub log: Arc<dyn MessageLog>,
    /// Native-currency ledger.
    pub payments: Arc<dyn PaymentLedger>,
    /// Reward-token ledger.
    pub tokens: Arc<dyn TokenLedger>,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
}

impl Ports {
    /// Process-local ports with a clock that only moves when told to.
    ///
    /// Returns the concrete adapters alongside so callers can fund accounts and
    /// move time.
    #[must_use]
    pub fn in_memory(clock: Arc<ManualClock>) -> (Self, memory::InMemoryHandles) {
        Self::process_local(clock)
    }

    /// Process-local ports over any clock.
    #[must_use]
    pub fn process_local(clock: Arc<dyn Clock>) -> (Self, memory::InMemoryHandles) {
        let handles = memory::InMemoryHandles::default();
        let ports = Self {
            log: handles.log.clone(),
            payments: handles.payments.clone(),
            tokens: handles.tokens.clone(),
            clock,
        };
        (ports, handles)
    }
}

impl std::fmt::Debug for Ports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ports").finish_non_exhaustive()
    }
}
