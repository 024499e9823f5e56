use super::*;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use susu_shared::types::TokenAmount;

use crate::contribution::PayoutOutcome;
use crate::error::{ContributionProblem, ErrorKind};
use crate::loan::LoanStatus;
use crate::message::{CircleStatus, GuaranteeStatus, Urgency};
use crate::ports::log::MockMessageLog;
use crate::ports::memory::{InMemoryHandles, InMemoryMessageLog};
use crate::ports::{LogError, ManualClock, PaymentLedger};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

const FUNDING: i64 = 1_000_000;

struct Harness {
    facade: LedgerFacade,
    handles: InMemoryHandles,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    fn with_config(config: LedgerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let (ports, handles) = Ports::in_memory(clock.clone());
        Self {
            facade: LedgerFacade::new(ports, config),
            handles,
            clock,
        }
    }

    fn treasury(&self) -> Money {
        self.handles.payments.balance(&AccountId::from("treasury"))
    }

    fn balance(&self, account: &AccountId) -> Money {
        self.handles.payments.balance(account)
    }

    /// Registered and funded, but not verified.
    async fn registered(&self, id: &str) -> AccountId {
        let account = AccountId::from(id);
        self.facade
            .register_user(NewUser {
                account_id: account.clone(),
                name: format!("Member {id}"),
                phone: "+233240000000".into(),
                guarantors: None,
            })
            .await
            .unwrap();
        self.handles
            .payments
            .deposit(&account, Money::new(FUNDING));
        account
    }

    async fn member(&self, id: &str) -> AccountId {
        let account = self.registered(id).await;
        self.facade.verify_user(&account, "ops").await.unwrap();
        account
    }

    async fn circle(&self, prefix: &str, seats: u32, contribution: i64) -> (CircleId, Vec<AccountId>) {
        self.circle_with(prefix, seats, contribution, true).await
    }

    async fn circle_with(
        &self,
        prefix: &str,
        seats: u32,
        contribution: i64,
        loans: bool,
    ) -> (CircleId, Vec<AccountId>) {
        let mut members = Vec::new();
        for seat in 0..seats {
            members.push(self.member(&format!("{prefix}-{seat}")).await);
        }
        let circle_id = self
            .facade
            .create_circle(new_circle(&members[0], seats, contribution, loans))
            .await
            .unwrap();
        for member in &members[1..] {
            self.facade
                .join_circle(circle_id, member, "")
                .await
                .unwrap();
        }
        (circle_id, members)
    }

    async fn contribute_all(&self, circle_id: CircleId, members: &[AccountId], amount: i64, round: u32) {
        for member in members {
            self.facade
                .collect_contribution(circle_id, member, Money::new(amount), round)
                .await
                .unwrap();
        }
    }

    async fn request(&self, circle_id: CircleId, borrower: &AccountId, amount: i64) -> Result<LoanId, CoreError> {
        self.facade
            .request_loan(LoanRequestInput {
                circle_id,
                borrower: borrower.clone(),
                amount: Money::new(amount),
                reason: "Hospital bill".into(),
                urgency: Urgency::High,
                repayment_period_days: None,
            })
            .await
    }

    async fn vote_for(&self, loan_id: LoanId, voters: &[AccountId]) -> VoteReceipt {
        let mut last = None;
        for voter in voters {
            last = Some(
                self.facade
                    .cast_vote(loan_id, voter, VoteChoice::For, None)
                    .await
                    .unwrap(),
            );
        }
        last.unwrap()
    }
}

fn new_circle(creator: &AccountId, seats: u32, contribution: i64, loans: bool) -> NewCircle {
    NewCircle {
        name: "Market Women".into(),
        creator: creator.clone(),
        creator_name: None,
        monthly_contribution: Money::new(contribution),
        max_members: seats,
        description: Some("Makola traders".into()),
        emergency_loans_enabled: loans,
        max_loan_percentage: Some(50),
    }
}

// Users

#[tokio::test]
async fn test_register_rejects_duplicate_and_blank_fields() {
    let h = Harness::new();
    let ama = h.registered("ama").await;

    let err = h
        .facade
        .register_user(NewUser {
            account_id: ama.clone(),
            name: "Ama".into(),
            phone: "+233".into(),
            guarantors: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateRegistration(ref a) if a == &ama));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let err = h
        .facade
        .register_user(NewUser {
            account_id: AccountId::from("kofi"),
            name: "  ".into(),
            phone: "+233".into(),
            guarantors: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_guarantors_must_be_distinct_registered_and_verified() {
    let h = Harness::new();
    let ama = h.member("ama").await;
    let esi = h.member("esi").await;
    let kojo = h.registered("kojo").await;

    let register = |id: &str, guarantors: (AccountId, AccountId)| NewUser {
        account_id: AccountId::from(id),
        name: "Abena".into(),
        phone: "+233201234567".into(),
        guarantors: Some(guarantors),
    };

    let err = h
        .facade
        .register_user(register("abena", (ama.clone(), ama.clone())))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidGuarantor(_)));

    let err = h
        .facade
        .register_user(register("abena", (ama.clone(), kojo.clone())))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GuarantorNotVerified(ref a) if a == &kojo));

    let err = h
        .facade
        .register_user(register("abena", (ama.clone(), AccountId::from("ghost"))))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UserNotFound(_)));

    let before = h.handles.log.len();
    h.facade
        .register_user(register("abena", (ama.clone(), esi.clone())))
        .await
        .unwrap();
    assert_eq!(h.handles.log.len(), before + 1);
    let profile = h.facade.get_user(&AccountId::from("abena")).await.unwrap();
    let guarantors = profile.guarantors.unwrap();
    assert_eq!(guarantors.first, ama);
    assert_eq!(guarantors.second, esi);
    assert_eq!(guarantors.status, GuaranteeStatus::Pending);
}

#[tokio::test]
async fn test_submit_guarantee_rules() {
    let h = Harness::new();
    let ama = h.member("ama").await;
    let esi = h.member("esi").await;
    let kojo = h.registered("kojo").await;

    let err = h
        .facade
        .submit_guarantee(&kojo, &kojo, &ama)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidGuarantor(_)));

    let err = h
        .facade
        .submit_guarantee(&AccountId::from("ghost"), &ama, &esi)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UserNotFound(_)));

    h.facade.submit_guarantee(&kojo, &ama, &esi).await.unwrap();
    let profile = h.facade.get_user(&kojo).await.unwrap();
    assert!(profile.guarantors.is_some());
}

#[tokio::test]
async fn test_verify_is_idempotent() {
    let h = Harness::new();
    let ama = h.registered("ama").await;

    let first = h.facade.verify_user(&ama, "ops").await.unwrap();
    let second = h.facade.verify_user(&ama, "ops").await.unwrap();
    assert_eq!(first, second);

    let profile = h.facade.get_user(&ama).await.unwrap();
    assert!(profile.verified);
    assert_eq!(profile.verification_tx_id, Some(first));

    let err = h
        .facade
        .verify_user(&AccountId::from("ghost"), "ops")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// Circles

#[tokio::test]
async fn test_create_circle_validates_parameters() {
    let h = Harness::new();
    let ama = h.member("ama").await;

    for input in [
        new_circle(&ama, 2, 50_000, true),
        new_circle(&ama, 13, 50_000, true),
        new_circle(&ama, 6, 100, true),
        NewCircle {
            max_loan_percentage: Some(90),
            ..new_circle(&ama, 6, 50_000, true)
        },
        NewCircle {
            name: " ".into(),
            ..new_circle(&ama, 6, 50_000, true)
        },
    ] {
        let err = h.facade.create_circle(input).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidCircleParameters(_)), "{err}");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    let err = h
        .facade
        .create_circle(new_circle(&AccountId::from("ghost"), 6, 50_000, true))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UserNotFound(_)));
}

#[tokio::test]
async fn test_membership_limit_per_account() {
    let mut config = LedgerConfig::default();
    config.circle.max_circles_per_member = 1;
    let h = Harness::with_config(config);
    let ama = h.member("ama").await;

    h.facade
        .create_circle(new_circle(&ama, 3, 50_000, true))
        .await
        .unwrap();
    let err = h
        .facade
        .create_circle(new_circle(&ama, 3, 50_000, true))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TooManyCircles { limit: 1, .. }));
}

#[tokio::test]
async fn test_join_rules() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("c", 3, 50_000).await;

    let err = h
        .facade
        .join_circle(circle_id, &members[1], "")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyMember { .. }));

    let late = h.member("late").await;
    let err = h.facade.join_circle(circle_id, &late, "").await.unwrap_err();
    assert!(matches!(err, CoreError::CircleFull { max_members: 3, .. }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let err = h
        .facade
        .join_circle(CircleId::new(), &late, "")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CircleNotFound(_)));
}

#[tokio::test]
async fn test_rotation_recipient() {
    let h = Harness::new();
    let ama = h.member("ama").await;
    let circle_id = h
        .facade
        .create_circle(new_circle(&ama, 3, 50_000, true))
        .await
        .unwrap();

    let err = h
        .facade
        .rotation_recipient(circle_id, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CircleNotActive { status: CircleStatus::Forming, .. }));

    let esi = h.member("esi").await;
    let kojo = h.member("kojo").await;
    h.facade.join_circle(circle_id, &esi, "Esi").await.unwrap();
    h.facade.join_circle(circle_id, &kojo, "Kojo").await.unwrap();

    assert_eq!(h.facade.rotation_recipient(circle_id, 1).await.unwrap(), ama);
    assert_eq!(h.facade.rotation_recipient(circle_id, 3).await.unwrap(), kojo);
    assert_eq!(h.facade.rotation_recipient(circle_id, 4).await.unwrap(), ama);
    assert!(h.facade.rotation_recipient(circle_id, 0).await.is_err());
}

#[tokio::test]
async fn test_list_circles_paginates_in_creation_order() {
    let h = Harness::new();
    let mut created = Vec::new();
    for id in ["a", "b", "c"] {
        let creator = h.member(id).await;
        created.push(
            h.facade
                .create_circle(new_circle(&creator, 3, 50_000, true))
                .await
                .unwrap(),
        );
    }

    let page = h
        .facade
        .list_circles(&PageRequest {
            page: 1,
            per_page: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.meta.total, 3);
    assert_eq!(page.meta.total_pages, 2);
    let ids: Vec<CircleId> = page.data.iter().map(|c| c.circle_id).collect();
    assert_eq!(ids, created[..2]);
}

// Contributions

#[tokio::test]
async fn test_full_circle_activates_and_first_round_pays_first_member() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("a", 6, 50_000).await;

    let view = h.facade.get_circle(circle_id).await.unwrap();
    assert_eq!(view.status, CircleStatus::Active);
    assert_eq!(view.current_round, 1);
    assert_eq!(view.schedule.len(), 6);
    assert_eq!(view.schedule[0].recipient, members[0]);
    assert_eq!(view.payout_amount, Some(Money::new(300_000)));

    let mut receipts = Vec::new();
    for member in &members {
        receipts.push(
            h.facade
                .collect_contribution(circle_id, member, Money::new(50_000), 1)
                .await
                .unwrap(),
        );
    }
    assert!(receipts[..5].iter().all(|r| r.payout.is_none()));

    let payout = receipts[5]
        .payout
        .as_ref()
        .and_then(PayoutOutcome::distributed)
        .expect("last contribution pays out");
    assert_eq!(payout.recipient, members[0]);
    assert_eq!(payout.amount, Money::new(300_000));
    assert_eq!(payout.advance.round, 2);
    assert_eq!(payout.advance.status, CircleStatus::Active);

    assert_eq!(h.balance(&members[0]), Money::new(FUNDING - 50_000 + 300_000));
    assert_eq!(h.balance(&members[1]), Money::new(FUNDING - 50_000));
    assert_eq!(h.treasury(), Money::ZERO);

    let view = h.facade.get_circle(circle_id).await.unwrap();
    assert_eq!(view.current_round, 2);
    assert_eq!(view.funds, Money::ZERO);
    assert_eq!(view.contributions_received, 0);
    assert_eq!(
        view.schedule[0].payment_tx_id.as_ref(),
        Some(&payout.payment_tx_id)
    );
    assert!(view.schedule[1].payment_tx_id.is_none());
}

#[tokio::test]
async fn test_contribution_rewards_match_token_ledger() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("r", 3, 50_000).await;

    let receipt = h
        .facade
        .collect_contribution(circle_id, &members[1], Money::new(50_000), 1)
        .await
        .unwrap();
    let expected = TokenAmount::from_whole(5_000_000).unwrap();
    assert_eq!(receipt.reward_tokens, Some(expected));
    assert!(receipt.reward_tx_id.is_some());

    let balance = h.facade.get_account_balance(&members[1]).await.unwrap();
    assert_eq!(balance.native, Money::new(FUNDING - 50_000));
    assert_eq!(balance.token, expected);
    assert_eq!(balance.rewards_earned, expected);
}

#[tokio::test]
async fn test_duplicate_contribution_moves_money_once() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("d", 6, 50_000).await;

    h.facade
        .collect_contribution(circle_id, &members[2], Money::new(50_000), 1)
        .await
        .unwrap();
    let err = h
        .facade
        .collect_contribution(circle_id, &members[2], Money::new(50_000), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::DuplicateContribution { round: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(h.balance(&members[2]), Money::new(FUNDING - 50_000));
    assert_eq!(h.treasury(), Money::new(50_000));
}

#[tokio::test]
async fn test_contribution_validation() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("v", 3, 50_000).await;

    let err = h
        .facade
        .collect_contribution(circle_id, &members[0], Money::new(40_000), 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidContribution(ContributionProblem::WrongAmount { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .facade
        .collect_contribution(circle_id, &members[0], Money::new(50_000), 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidContribution(ContributionProblem::WrongRound { expected: 1, actual: 2 })
    ));
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let outsider = h.member("outsider").await;
    let err = h
        .facade
        .collect_contribution(circle_id, &outsider, Money::new(50_000), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotCircleMember { .. }));

    assert_eq!(h.treasury(), Money::ZERO);
}

#[tokio::test]
async fn test_contribution_to_forming_circle_is_refused() {
    let h = Harness::new();
    let ama = h.member("ama").await;
    let circle_id = h
        .facade
        .create_circle(new_circle(&ama, 3, 50_000, true))
        .await
        .unwrap();

    let err = h
        .facade
        .collect_contribution(circle_id, &ama, Money::new(50_000), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CircleNotActive { .. }));
}

#[tokio::test]
async fn test_unassociated_account_is_refused_before_any_transfer() {
    let h = Harness::new();
    let ama = h.member("ama").await;
    let esi = h.member("esi").await;
    let kojo = h.registered("kojo").await;
    let circle_id = h
        .facade
        .create_circle(new_circle(&ama, 3, 50_000, true))
        .await
        .unwrap();
    h.facade.join_circle(circle_id, &esi, "").await.unwrap();
    h.facade.join_circle(circle_id, &kojo, "").await.unwrap();

    let err = h
        .facade
        .collect_contribution(circle_id, &kojo, Money::new(50_000), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TokenAccountNotAssociated(ref a) if a == &kojo));
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(h.balance(&kojo), Money::new(FUNDING));
    assert_eq!(h.treasury(), Money::ZERO);
}

#[tokio::test]
async fn test_payout_and_advance_preconditions() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("p", 3, 50_000).await;

    h.facade
        .collect_contribution(circle_id, &members[0], Money::new(50_000), 1)
        .await
        .unwrap();
    let err = h.facade.distribute_payout(circle_id, 1).await.unwrap_err();
    assert!(matches!(err, CoreError::RoundNotComplete { round: 1, .. }));
    let err = h.facade.advance_round(circle_id).await.unwrap_err();
    assert!(matches!(err, CoreError::RoundNotComplete { .. }));

    h.contribute_all(circle_id, &members[1..], 50_000, 1).await;
    let err = h.facade.distribute_payout(circle_id, 1).await.unwrap_err();
    assert!(matches!(err, CoreError::PayoutAlreadyDistributed { round: 1, .. }));
    let err = h.facade.distribute_payout(circle_id, 3).await.unwrap_err();
    assert!(matches!(err, CoreError::RoundNotComplete { round: 3, .. }));
}

#[tokio::test]
async fn test_full_cycle_completes_circle_and_pays_bonus() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("f", 3, 10_000).await;

    for round in 1..=2 {
        h.contribute_all(circle_id, &members, 10_000, round).await;
    }
    let mut last = None;
    for member in &members {
        last = Some(
            h.facade
                .collect_contribution(circle_id, member, Money::new(10_000), 3)
                .await
                .unwrap(),
        );
    }
    let outcome = last.unwrap().payout.unwrap();
    let payout = outcome.distributed().expect("final round pays out");
    assert_eq!(payout.recipient, members[2]);
    assert_eq!(payout.advance.round, 4);
    assert_eq!(payout.advance.status, CircleStatus::Completed);
    assert_eq!(payout.advance.completion_rewards.len(), 3);

    let view = h.facade.get_circle(circle_id).await.unwrap();
    assert_eq!(view.status, CircleStatus::Completed);
    assert_eq!(view.current_round, 4);
    assert_eq!(view.rounds_completed, 3);
    assert_eq!(view.contributions_received, 0);
    assert!(view.schedule.iter().all(|slot| slot.payment_tx_id.is_some()));

    let per_round = TokenAmount::from_whole(1_000_000).unwrap();
    let bonus = TokenAmount::from_whole(500).unwrap();
    let expected = per_round
        .checked_add(per_round)
        .and_then(|t| t.checked_add(per_round))
        .and_then(|t| t.checked_add(bonus))
        .unwrap();
    for member in &members {
        assert_eq!(h.balance(member), Money::new(FUNDING));
        let balance = h.facade.get_account_balance(member).await.unwrap();
        assert_eq!(balance.token, expected);
        assert_eq!(balance.rewards_earned, expected);
    }

    let err = h.facade.advance_round(circle_id).await.unwrap_err();
    assert!(matches!(err, CoreError::CircleNotActive { status: CircleStatus::Completed, .. }));
}

// Loans

#[tokio::test]
async fn test_loan_cap_is_half_of_circle_funds() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("b", 6, 90_000).await;
    h.contribute_all(circle_id, &members[..5], 90_000, 1).await;
    assert_eq!(
        h.facade.get_circle(circle_id).await.unwrap().funds,
        Money::new(450_000)
    );

    let loan_id = h.request(circle_id, &members[1], 75_000).await.unwrap();
    let loan = h.facade.get_loan(loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Voting);
    assert_eq!(loan.tally.quorum, 3);
    assert_eq!(loan.time_remaining_secs, 24 * 3600);

    let err = h.request(circle_id, &members[2], 300_000).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::LoanLimitExceeded { cap, .. } if cap == Money::new(225_000)
    ));
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);

    let err = h.request(circle_id, &members[2], 1_000).await.unwrap_err();
    assert!(matches!(err, CoreError::LoanBelowMinimum { .. }));
}

#[tokio::test]
async fn test_loan_request_rules() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("l", 3, 50_000).await;
    h.contribute_all(circle_id, &members[..2], 50_000, 1).await;

    let outsider = h.member("outsider").await;
    let err = h.request(circle_id, &outsider, 10_000).await.unwrap_err();
    assert!(matches!(err, CoreError::NotCircleMember { .. }));

    let err = h
        .facade
        .request_loan(LoanRequestInput {
            circle_id,
            borrower: members[0].clone(),
            amount: Money::new(10_000),
            reason: " ".into(),
            urgency: Urgency::Low,
            repayment_period_days: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .facade
        .request_loan(LoanRequestInput {
            circle_id,
            borrower: members[0].clone(),
            amount: Money::new(10_000),
            reason: "School fees".into(),
            urgency: Urgency::Low,
            repayment_period_days: Some(20),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    h.request(circle_id, &members[0], 10_000).await.unwrap();
    h.request(circle_id, &members[0], 10_000).await.unwrap();
    let err = h.request(circle_id, &members[0], 10_000).await.unwrap_err();
    assert!(matches!(err, CoreError::TooManyActiveLoans { limit: 2, .. }));
}

#[tokio::test]
async fn test_loans_disabled_circle() {
    let h = Harness::new();
    let (circle_id, members) = h.circle_with("n", 3, 50_000, false).await;
    h.contribute_all(circle_id, &members[..2], 50_000, 1).await;

    let err = h.request(circle_id, &members[0], 10_000).await.unwrap_err();
    assert!(matches!(err, CoreError::LoansDisabled(id) if id == circle_id));
}

#[tokio::test]
async fn test_quorum_approves_early_and_deadline_rejects() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("q", 6, 50_000).await;
    h.contribute_all(circle_id, &members[..5], 50_000, 1).await;

    let approved = h.request(circle_id, &members[1], 75_000).await.unwrap();
    let receipt = h.vote_for(approved, &members[2..4]).await;
    assert_eq!(receipt.status, LoanStatus::Voting);
    assert_eq!(receipt.tally.votes_for, 2);
    assert_eq!(receipt.tally.quorum, 3);

    let receipt = h.vote_for(approved, &members[4..5]).await;
    assert_eq!(receipt.status, LoanStatus::Approved);
    assert_eq!(h.facade.get_loan(approved).await.unwrap().status, LoanStatus::Approved);

    let err = h
        .facade
        .cast_vote(approved, &members[5], VoteChoice::For, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LoanNotVoting { status: LoanStatus::Approved, .. }));

    let expiring = h.request(circle_id, &members[2], 50_000).await.unwrap();
    h.vote_for(expiring, &members[3..5]).await;
    h.clock.advance(Duration::hours(25));

    let loan = h.facade.get_loan(expiring).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Rejected);
    assert_eq!(loan.time_remaining_secs, 0);
    assert_eq!(loan.tally.votes_for, 2);

    let err = h
        .facade
        .cast_vote(expiring, &members[5], VoteChoice::For, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LoanNotVoting { status: LoanStatus::Rejected, .. }));

    let report = h.facade.sweep().await.unwrap();
    assert_eq!(report.rejected, vec![expiring]);
    assert!(report.overdue.is_empty());
    assert_eq!(h.facade.get_loan(approved).await.unwrap().status, LoanStatus::Approved);

    let again = h.facade.sweep().await.unwrap();
    assert!(again.rejected.is_empty());
}

#[tokio::test]
async fn test_vote_eligibility() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("e", 3, 50_000).await;
    h.contribute_all(circle_id, &members[..2], 50_000, 1).await;
    let loan_id = h.request(circle_id, &members[0], 20_000).await.unwrap();

    let err = h
        .facade
        .cast_vote(loan_id, &members[0], VoteChoice::For, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::SelfVote(_)));
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let outsider = h.member("outsider").await;
    let err = h
        .facade
        .cast_vote(loan_id, &outsider, VoteChoice::For, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotCircleMember { .. }));
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = h
        .facade
        .cast_vote(LoanId::new(), &members[1], VoteChoice::For, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LoanNotFound(_)));
}

#[tokio::test]
async fn test_last_writer_wins_replaces_vote() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("w", 6, 50_000).await;
    h.contribute_all(circle_id, &members[..5], 50_000, 1).await;
    let loan_id = h.request(circle_id, &members[0], 20_000).await.unwrap();

    h.facade
        .cast_vote(loan_id, &members[1], VoteChoice::For, Some("Esi".into()))
        .await
        .unwrap();
    let receipt = h
        .facade
        .cast_vote(loan_id, &members[1], VoteChoice::Against, None)
        .await
        .unwrap();

    assert_eq!(receipt.tally.votes_for, 0);
    assert_eq!(receipt.tally.votes_against, 1);
    assert_eq!(receipt.tally.total(), 1);
}

#[tokio::test]
async fn test_first_vote_final_refuses_second_vote() {
    let mut config = LedgerConfig::default();
    config.loans.vote_policy = susu_shared::VotePolicy::FirstVoteFinal;
    let h = Harness::with_config(config);
    let (circle_id, members) = h.circle("x", 6, 50_000).await;
    h.contribute_all(circle_id, &members[..5], 50_000, 1).await;
    let loan_id = h.request(circle_id, &members[0], 20_000).await.unwrap();

    h.facade
        .cast_vote(loan_id, &members[1], VoteChoice::Abstain, None)
        .await
        .unwrap();
    let err = h
        .facade
        .cast_vote(loan_id, &members[1], VoteChoice::For, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyVoted { .. }));

    let tally = h.facade.tally(loan_id).await.unwrap();
    assert_eq!(tally.abstentions, 1);
    assert_eq!(tally.votes_for, 0);
}

#[tokio::test]
async fn test_disburse_and_repay() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("m", 6, 50_000).await;
    h.contribute_all(circle_id, &members[..5], 50_000, 1).await;
    let borrower = &members[1];
    let loan_id = h.request(circle_id, borrower, 75_000).await.unwrap();

    let err = h.facade.approve_and_disburse(loan_id).await.unwrap_err();
    assert!(matches!(err, CoreError::LoanNotApproved { status: LoanStatus::Voting, .. }));

    h.vote_for(loan_id, &members[2..5]).await;
    let disbursed = h.facade.approve_and_disburse(loan_id).await.unwrap();
    assert_eq!(disbursed.due_date, start() + Duration::days(30));
    assert_eq!(disbursed.support_rewards.len(), 3);
    let supporter = h.facade.get_account_balance(&members[2]).await.unwrap();
    assert_eq!(supporter.token, TokenAmount::from_whole(5_000_050).unwrap());
    let non_voter = h.facade.get_account_balance(&members[5]).await.unwrap();
    assert_eq!(non_voter.token, TokenAmount::ZERO);
    assert_eq!(h.balance(borrower), Money::new(FUNDING - 50_000 + 75_000));
    assert_eq!(h.treasury(), Money::new(175_000));
    assert_eq!(
        h.facade.get_circle(circle_id).await.unwrap().funds,
        Money::new(175_000)
    );

    let err = h.facade.approve_and_disburse(loan_id).await.unwrap_err();
    assert!(matches!(err, CoreError::LoanNotApproved { status: LoanStatus::Disbursed, .. }));

    let partial = h.facade.repay_loan(loan_id, Money::new(25_000)).await.unwrap();
    assert_eq!(partial.outstanding, Money::new(50_000));
    assert_eq!(partial.status, LoanStatus::Disbursed);

    let err = h
        .facade
        .repay_loan(loan_id, Money::new(60_000))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RepaymentExceedsOutstanding { .. }));

    let settled = h.facade.repay_loan(loan_id, Money::new(50_000)).await.unwrap();
    assert_eq!(settled.outstanding, Money::ZERO);
    assert_eq!(settled.status, LoanStatus::Repaid);

    let loan = h.facade.get_loan(loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Repaid);
    assert_eq!(loan.outstanding, Money::ZERO);
    assert_eq!(
        h.facade.get_circle(circle_id).await.unwrap().funds,
        Money::new(250_000)
    );

    let err = h
        .facade
        .repay_loan(loan_id, Money::new(1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LoanNotRepayable { status: LoanStatus::Repaid, .. }));

    let loans = h.facade.list_loans(circle_id).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].loan_id, loan_id);
}

#[tokio::test]
async fn test_sweep_marks_late_loan_overdue() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("o", 6, 50_000).await;
    h.contribute_all(circle_id, &members[..5], 50_000, 1).await;
    let loan_id = h.request(circle_id, &members[1], 40_000).await.unwrap();
    h.vote_for(loan_id, &members[2..5]).await;
    h.facade.approve_and_disburse(loan_id).await.unwrap();
    h.facade
        .repay_loan(loan_id, Money::new(10_000))
        .await
        .unwrap();

    h.clock.advance(Duration::days(29));
    assert!(h.facade.sweep().await.unwrap().overdue.is_empty());

    h.clock.advance(Duration::days(2));
    let report = h.facade.sweep().await.unwrap();
    assert_eq!(report.overdue, vec![loan_id]);

    let loan = h.facade.get_loan(loan_id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Overdue);
    assert_eq!(loan.outstanding, Money::new(30_000));

    let err = h
        .facade
        .repay_loan(loan_id, Money::new(30_000))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LoanNotRepayable { status: LoanStatus::Overdue, .. }));
}

// Operator tools

#[tokio::test]
async fn test_rebuild_reproduces_views() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("z", 3, 50_000).await;
    h.contribute_all(circle_id, &members, 50_000, 1).await;
    h.facade
        .collect_contribution(circle_id, &members[0], Money::new(50_000), 2)
        .await
        .unwrap();
    let loan_id = h.request(circle_id, &members[2], 20_000).await.unwrap();
    h.vote_for(loan_id, &members[..2]).await;

    let circle = h.facade.get_circle(circle_id).await.unwrap();
    let loan = h.facade.get_loan(loan_id).await.unwrap();
    let sequence = h.facade.rebuild_projection().await.unwrap();

    assert_eq!(sequence.0, h.handles.log.len() as u64);
    assert_eq!(h.facade.get_circle(circle_id).await.unwrap(), circle);
    assert_eq!(h.facade.get_loan(loan_id).await.unwrap(), loan);
}

fn failing_contribution_log(inner: Arc<InMemoryMessageLog>, fail: Arc<AtomicBool>) -> MockMessageLog {
    let mut log = MockMessageLog::new();
    let submit_log = inner.clone();
    log.expect_submit().returning(move |message| {
        if fail.load(Ordering::SeqCst) && message.message_type() == "CONTRIBUTION" {
            Err(LogError::Unavailable("log node unreachable".into()))
        } else {
            Ok(submit_log.append(message))
        }
    });
    log.expect_read_from().returning(move |from| {
        Ok(futures::stream::iter(inner.entries_from(from).into_iter().map(Ok)).boxed())
    });
    log
}

#[tokio::test]
async fn test_unrecorded_contribution_halts_circle() {
    let clock = Arc::new(ManualClock::new(start()));
    let (mut ports, handles) = Ports::in_memory(clock.clone());
    let inner = Arc::new(InMemoryMessageLog::new());
    let fail = Arc::new(AtomicBool::new(false));
    ports.log = Arc::new(failing_contribution_log(inner, fail.clone()));
    let h = Harness {
        facade: LedgerFacade::new(ports, LedgerConfig::default()),
        handles,
        clock,
    };
    let (circle_id, members) = h.circle("h", 3, 50_000).await;

    fail.store(true, Ordering::SeqCst);
    let err = h
        .facade
        .collect_contribution(circle_id, &members[0], Money::new(50_000), 1)
        .await
        .unwrap_err();
    let CoreError::Consistency {
        ref aggregate,
        ref side_effect,
        ..
    } = err
    else {
        panic!("expected a consistency error, got {err:?}");
    };
    assert_eq!(aggregate, &AggregateId::Circle(circle_id));
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(err.http_status_code(), 500);
    assert!(!err.is_retryable());
    assert_eq!(h.balance(&members[0]), Money::new(FUNDING - 50_000));

    let halts = h.facade.halts();
    assert_eq!(halts.len(), 1);
    assert_eq!(halts[0].side_effect.as_ref(), Some(side_effect));

    fail.store(false, Ordering::SeqCst);
    let err = h
        .facade
        .collect_contribution(circle_id, &members[1], Money::new(50_000), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AggregateHalted(_)));
    assert_eq!(h.balance(&members[1]), Money::new(FUNDING));

    assert!(h.facade.resolve_halt(&AggregateId::Circle(circle_id)));
    assert!(!h.facade.resolve_halt(&AggregateId::Circle(circle_id)));
    h.facade
        .collect_contribution(circle_id, &members[1], Money::new(50_000), 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_short_treasury_halts_payout_until_resolved() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("t", 3, 50_000).await;
    h.contribute_all(circle_id, &members[..2], 50_000, 1).await;

    let treasury = AccountId::from("treasury");
    h.handles
        .payments
        .transfer(&treasury, &AccountId::from("elsewhere"), Money::new(100_000), "leak")
        .await
        .unwrap();

    let receipt = h
        .facade
        .collect_contribution(circle_id, &members[2], Money::new(50_000), 1)
        .await
        .unwrap();
    let Some(PayoutOutcome::Failed {
        round,
        ref error,
        ref message,
    }) = receipt.payout
    else {
        panic!("expected a failed payout, got {:?}", receipt.payout);
    };
    assert_eq!(round, 1);
    assert_eq!(error, "INSUFFICIENT_TREASURY_FUNDS");
    assert!(message.contains("150000"));
    assert_eq!(h.balance(&members[2]), Money::new(FUNDING - 50_000));

    let circle = h.facade.get_circle(circle_id).await.unwrap();
    assert_eq!(circle.contributions_received, 3);
    assert!(circle.schedule[0].payment_tx_id.is_none());
    assert_eq!(h.facade.halts().len(), 1);

    assert!(h.facade.resolve_halt(&AggregateId::Circle(circle_id)));
    h.handles.payments.deposit(&treasury, Money::new(100_000));
    let payout = h.facade.distribute_payout(circle_id, 1).await.unwrap();
    assert_eq!(payout.recipient, members[0]);
    assert_eq!(payout.advance.round, 2);
}

#[tokio::test]
async fn test_loan_taken_mid_round_defers_payout_until_repaid() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("d", 3, 50_000).await;
    h.contribute_all(circle_id, &members[..2], 50_000, 1).await;

    let borrower = &members[2];
    let loan_id = h.request(circle_id, borrower, 50_000).await.unwrap();
    h.vote_for(loan_id, &members[..2]).await;
    h.facade.approve_and_disburse(loan_id).await.unwrap();
    assert_eq!(h.treasury(), Money::new(50_000));

    let receipt = h
        .facade
        .collect_contribution(circle_id, borrower, Money::new(50_000), 1)
        .await
        .unwrap();
    assert_eq!(
        receipt.payout,
        Some(PayoutOutcome::AwaitingRepayment {
            round: 1,
            required: Money::new(150_000),
            available: Money::new(100_000),
        })
    );
    assert!(h.facade.halts().is_empty());
    assert_eq!(h.balance(borrower), Money::new(FUNDING));
    assert_eq!(h.balance(&members[0]), Money::new(FUNDING - 50_000));

    let view = h.facade.get_circle(circle_id).await.unwrap();
    assert_eq!(view.status, CircleStatus::Active);
    assert_eq!(view.current_round, 1);
    assert_eq!(view.contributions_received, 3);
    assert!(view.schedule[0].payment_tx_id.is_none());

    let err = h.facade.distribute_payout(circle_id, 1).await.unwrap_err();
    assert!(matches!(err, CoreError::PayoutAwaitingRepayment { round: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert!(h.facade.halts().is_empty());

    let partial = h.facade.repay_loan(loan_id, Money::new(20_000)).await.unwrap();
    assert!(matches!(
        partial.payout,
        Some(PayoutOutcome::AwaitingRepayment { available, .. }) if available == Money::new(120_000)
    ));

    let settled = h.facade.repay_loan(loan_id, Money::new(30_000)).await.unwrap();
    assert_eq!(settled.status, LoanStatus::Repaid);
    let payout = settled
        .payout
        .as_ref()
        .and_then(PayoutOutcome::distributed)
        .expect("full repayment releases the payout");
    assert_eq!(payout.recipient, members[0]);
    assert_eq!(payout.amount, Money::new(150_000));
    assert_eq!(payout.advance.round, 2);

    assert_eq!(h.balance(&members[0]), Money::new(FUNDING + 100_000));
    assert_eq!(h.treasury(), Money::ZERO);
    assert_eq!(h.facade.get_circle(circle_id).await.unwrap().funds, Money::ZERO);
    assert!(h.facade.halts().is_empty());
}

#[tokio::test]
async fn test_repayment_without_pending_round_releases_nothing() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("r", 6, 50_000).await;
    h.contribute_all(circle_id, &members[..4], 50_000, 1).await;
    let loan_id = h.request(circle_id, &members[1], 50_000).await.unwrap();
    h.vote_for(loan_id, &members[2..5]).await;
    h.facade.approve_and_disburse(loan_id).await.unwrap();

    let receipt = h.facade.repay_loan(loan_id, Money::new(50_000)).await.unwrap();
    assert!(receipt.payout.is_none());
}

// Concurrency

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_contributions_and_votes_are_serialized() {
    let h = Harness::new();
    let (circle_id, members) = h.circle("c", 6, 50_000).await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let facade = h.facade.clone();
            let member = members[0].clone();
            tokio::spawn(async move {
                facade
                    .collect_contribution(circle_id, &member, Money::new(50_000), 1)
                    .await
            })
        })
        .collect();
    let mut accepted = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(err, CoreError::DuplicateContribution { .. })),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(h.balance(&members[0]), Money::new(FUNDING - 50_000));
    let view = h.facade.get_circle(circle_id).await.unwrap();
    assert_eq!(view.contributions_received, 1);
    assert_eq!(view.funds, Money::new(50_000));

    let loan_id = h.request(circle_id, &members[1], 25_000).await.unwrap();
    let ballots = [
        (&members[2], VoteChoice::For),
        (&members[3], VoteChoice::For),
        (&members[4], VoteChoice::Against),
        (&members[5], VoteChoice::Abstain),
    ];
    let votes: Vec<_> = ballots
        .iter()
        .flat_map(|(voter, choice)| [(*voter).clone(), (*voter).clone()].map(|v| (v, *choice)))
        .map(|(voter, choice)| {
            let facade = h.facade.clone();
            tokio::spawn(async move { facade.cast_vote(loan_id, &voter, choice, None).await })
        })
        .collect();
    for vote in votes {
        vote.await.unwrap().unwrap();
    }

    let tally = h.facade.tally(loan_id).await.unwrap();
    assert_eq!(tally.votes_for, 2);
    assert_eq!(tally.votes_against, 1);
    assert_eq!(tally.abstentions, 1);
    assert_eq!(tally.total(), 4);
    assert_eq!(
        h.facade.get_loan(loan_id).await.unwrap().status,
        LoanStatus::Voting
    );
}
