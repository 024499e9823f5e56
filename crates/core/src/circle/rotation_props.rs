//! Property-based tests for payout rotation.

use proptest::prelude::*;
use std::collections::HashMap;
use susu_shared::types::AccountId;

use crate::circle::rotation::{recipient, schedule};

/// Strategy for generating circles of 3 to 12 distinct members.
fn arb_members() -> impl Strategy<Value = Vec<AccountId>> {
    (3_usize..=12).prop_map(|n| (0..n).map(|i| AccountId::new(format!("0.0.{}", 1000 + i))).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any window of n consecutive rounds pays every member exactly once.
    #[test]
    fn prop_each_member_paid_once_per_cycle(members in arb_members(), start in 1_u32..100) {
        let n = u32::try_from(members.len()).unwrap();
        let mut paid: HashMap<&AccountId, u32> = HashMap::new();
        for round in start..start + n {
            let who = recipient(&members, round).unwrap();
            *paid.entry(who).or_default() += 1;
        }
        prop_assert_eq!(paid.len(), members.len());
        prop_assert!(paid.values().all(|count| *count == 1));
    }

    /// The schedule agrees with the recipient function.
    #[test]
    fn prop_schedule_matches_recipient(members in arb_members()) {
        for slot in schedule(&members) {
            prop_assert_eq!(recipient(&members, slot.round), Some(&slot.recipient));
        }
    }
}
