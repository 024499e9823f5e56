//! Vote counting.

use std::collections::BTreeMap;
use susu_shared::types::AccountId;

use crate::loan::types::LoanTally;
use crate::message::VoteChoice;

/// "For" votes needed to approve a loan in a circle of `member_count` members.
#[must_use]
pub fn quorum(member_count: u32) -> u32 {
    member_count.div_ceil(2)
}

/// Counts one vote per voter.
#[must_use]
pub fn tally(votes: &BTreeMap<AccountId, VoteChoice>, member_count: u32) -> LoanTally {
    let mut result = LoanTally {
        quorum: quorum(member_count),
        ..LoanTally::default()
    };
    for vote in votes.values() {
        match vote {
            VoteChoice::For => result.votes_for += 1,
            VoteChoice::Against => result.votes_against += 1,
            VoteChoice::Abstain => result.abstentions += 1,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(3, 2)]
    #[case(4, 2)]
    #[case(5, 3)]
    #[case(6, 3)]
    #[case(12, 6)]
    fn test_quorum_is_half_rounded_up(#[case] members: u32, #[case] expected: u32) {
        assert_eq!(quorum(members), expected);
    }

    #[test]
    fn test_tally_counts_each_choice() {
        let votes = BTreeMap::from([
            (AccountId::from("a"), VoteChoice::For),
            (AccountId::from("b"), VoteChoice::For),
            (AccountId::from("c"), VoteChoice::Against),
            (AccountId::from("d"), VoteChoice::Abstain),
        ]);
        let result = tally(&votes, 6);
        assert_eq!(result.votes_for, 2);
        assert_eq!(result.votes_against, 1);
        assert_eq!(result.abstentions, 1);
        assert_eq!(result.quorum, 3);
        assert!(!result.has_quorum());
    }
}
