//! Circle creation, membership and payout rotation.
//!
//! # Modules
//!
//! - `types` - Registry inputs and results
//! - `rotation` - Deterministic payout order
//! - `service` - The circle registry

pub mod rotation;
pub mod service;
pub mod types;

#[cfg(test)]
mod rotation_props;

pub use rotation::RotationSlot;
pub use service::CircleRegistry;
pub use types::{NewCircle, RoundAdvance};
