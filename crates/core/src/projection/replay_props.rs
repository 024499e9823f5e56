//! Property-based tests for the fold.
//!
//! Replaying any log, in one pass or in chunks, must reconstruct the same state.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use susu_shared::VotePolicy;
use susu_shared::types::{AccountId, CircleId, LoanId, Money, SequenceId, TxId};
use uuid::Uuid;

use crate::message::{
    CircleCreation, CircleStatus, CircleUpdate, Contribution, EmergencyLoanRequest,
    EmergencyLoanVote, LedgerMessage, MemberJoin, MessagePayload, PayoutDistribution,
    SequencedMessage, Urgency, UserRegistration, VoteChoice,
};
use crate::projection::state::LedgerState;

const MEMBERS: usize = 4;

fn account(i: usize) -> AccountId {
    AccountId::new(format!("0.0.{}", 500 + i))
}

fn circle_id() -> CircleId {
    CircleId::from_uuid(Uuid::from_u128(7))
}

fn loan_id() -> LoanId {
    LoanId::from_uuid(Uuid::from_u128(11))
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
}

/// Strategy for generating one message, valid or not, about a small fixed circle.
fn arb_payload() -> impl Strategy<Value = MessagePayload> {
    let who = 0..MEMBERS + 1;
    prop_oneof![
        who.clone().prop_map(|i| MessagePayload::UserRegistration(UserRegistration {
            account_id: account(i),
            name: format!("user {i}"),
            phone_number: "+233".into(),
            guarantor1: None,
            guarantor2: None,
        })),
        (10_u32..=60).prop_map(|pct| MessagePayload::CircleCreation(CircleCreation {
            circle_id: circle_id(),
            name: "props".into(),
            creator: account(0),
            creator_name: "creator".into(),
            monthly_contribution: Money::new(10_000),
            max_members: u32::try_from(MEMBERS).unwrap(),
            description: None,
            emergency_loans_enabled: true,
            max_loan_percentage: u8::try_from(pct).unwrap(),
        })),
        who.clone().prop_map(|i| MessagePayload::MemberJoin(MemberJoin {
            circle_id: circle_id(),
            member_account_id: account(i),
            member_name: format!("member {i}"),
        })),
        (who.clone(), 1_u32..4, prop_oneof![Just(10_000_i64), Just(9_000)]).prop_map(
            |(i, round, amount)| MessagePayload::Contribution(Contribution {
                circle_id: circle_id(),
                member_account_id: account(i),
                amount: Money::new(amount),
                round,
                transaction_id: TxId::new(format!("pay-{i}-{round}")),
                reward_tokens: None,
            })
        ),
        (who.clone(), 1_u32..4).prop_map(|(i, round)| {
            MessagePayload::PayoutDistribution(PayoutDistribution {
                circle_id: circle_id(),
                recipient_account_id: account(i),
                amount: Money::new(40_000),
                round,
                transaction_id: TxId::new(format!("payout-{round}")),
            })
        }),
        (2_u32..5).prop_map(|round| MessagePayload::CircleUpdate(CircleUpdate {
            circle_id: circle_id(),
            round,
            status: CircleStatus::Active,
        })),
        Just(MessagePayload::EmergencyLoanRequest(EmergencyLoanRequest {
            loan_id: loan_id(),
            circle_id: circle_id(),
            borrower_account_id: account(0),
            amount: Money::new(5_000),
            reason: "props".into(),
            urgency_level: Urgency::Low,
            repayment_period_days: 30,
            max_loan_percentage: 50,
            circle_funds: Money::new(10_000),
            member_count: u32::try_from(MEMBERS).unwrap(),
            voting_deadline: base() + Duration::hours(24),
        })),
        (
            who,
            prop_oneof![
                Just(VoteChoice::For),
                Just(VoteChoice::Against),
                Just(VoteChoice::Abstain)
            ]
        )
            .prop_map(|(i, vote)| MessagePayload::EmergencyLoanVote(EmergencyLoanVote {
                loan_id: loan_id(),
                voter_account_id: account(i),
                vote,
                voter_name: None,
            })),
    ]
}

fn arb_policy() -> impl Strategy<Value = VotePolicy> {
    prop_oneof![
        Just(VotePolicy::LastWriterWins),
        Just(VotePolicy::FirstVoteFinal)
    ]
}

fn sequence(payloads: Vec<MessagePayload>) -> Vec<SequencedMessage> {
    (1_u64..)
        .zip(payloads)
        .map(|(n, payload)| SequencedMessage {
            sequence: SequenceId(n),
            tx_id: TxId::new(format!("msg-{n}")),
            message: LedgerMessage::new(
                base() + Duration::minutes(i64::try_from(n).unwrap()),
                "1.0.0",
                payload,
            ),
        })
        .collect()
}

fn fold(policy: VotePolicy, log: &[SequencedMessage]) -> LedgerState {
    let mut state = LedgerState::new(policy);
    for entry in log {
        state.apply(entry);
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Folding the same log twice gives the same state.
    #[test]
    fn prop_replay_is_deterministic(
        payloads in prop::collection::vec(arb_payload(), 0..60),
        policy in arb_policy()
    ) {
        let log = sequence(payloads);
        prop_assert_eq!(fold(policy, &log), fold(policy, &log));
    }

    /// Folding in two chunks equals folding in one pass.
    #[test]
    fn prop_chunked_replay_matches_full_replay(
        payloads in prop::collection::vec(arb_payload(), 1..60),
        split in any::<prop::sample::Index>(),
        policy in arb_policy()
    ) {
        let log = sequence(payloads);
        let cut = split.index(log.len());

        let mut chunked = fold(policy, &log[..cut]);
        for entry in &log[cut..] {
            chunked.apply(entry);
        }
        prop_assert_eq!(chunked, fold(policy, &log));
    }

    /// Re-delivering already folded messages changes nothing.
    #[test]
    fn prop_redelivery_is_idempotent(
        payloads in prop::collection::vec(arb_payload(), 1..60),
        policy in arb_policy()
    ) {
        let log = sequence(payloads);
        let mut state = fold(policy, &log);
        let before = state.clone();
        for entry in &log {
            state.apply(entry);
        }
        prop_assert_eq!(state, before);
    }

    /// Circle invariants hold after any log.
    #[test]
    fn prop_circle_invariants(payloads in prop::collection::vec(arb_payload(), 0..80)) {
        let state = fold(VotePolicy::LastWriterWins, &sequence(payloads));
        if let Some(circle) = state.circle(&circle_id()) {
            prop_assert!(circle.member_count() <= circle.max_members);
            prop_assert!(circle.current_round >= 1);
            for (round, records) in &circle.contributions {
                prop_assert!(records.len() <= circle.members.len());
                let mut seen: Vec<_> = records.iter().map(|r| &r.member_account_id).collect();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), records.len());
                if circle.payouts.contains_key(round) {
                    prop_assert_eq!(
                        circle.round_total(*round),
                        circle.payout_amount().unwrap()
                    );
                }
            }
        }
    }

    /// A voter is never counted twice.
    #[test]
    fn prop_votes_never_double_count(
        payloads in prop::collection::vec(arb_payload(), 0..80),
        policy in arb_policy()
    ) {
        let state = fold(policy, &sequence(payloads));
        if let Some(loan) = state.loan(&loan_id()) {
            let tally = loan.tally();
            prop_assert_eq!(tally.total() as usize, loan.votes.len());
            prop_assert!(loan.votes.len() < MEMBERS);
        }
    }
}
