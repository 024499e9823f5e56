//! Payout rotation.
//!
//! Round `r` pays `members[(r - 1) mod n]`. The member order is the join order
//! and is fixed once the circle is active, so every member is paid exactly once
//! in any `n` consecutive rounds.

use serde::{Deserialize, Serialize};
use susu_shared::types::AccountId;

/// Recipient of `round` (1-based). `None` for round 0 or an empty circle.
#[must_use]
pub fn recipient(members: &[AccountId], round: u32) -> Option<&AccountId> {
    if round == 0 || members.is_empty() {
        return None;
    }
    let index = usize::try_from(round - 1).ok()? % members.len();
    members.get(index)
}

/// One entry of a circle's payout schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationSlot {
    /// Round number.
    pub round: u32,
    /// Member paid in that round.
    pub recipient: AccountId,
}

/// The full cycle: one slot per member, in payout order.
#[must_use]
pub fn schedule(members: &[AccountId]) -> Vec<RotationSlot> {
    (1_u32..)
        .zip(members)
        .map(|(round, member)| RotationSlot {
            round,
            recipient: member.clone(),
        })
        .collect()
}
