//! The fold: one message at a time, in sequence order.
//!
//! Folding is pure. A message that contradicts what has already been folded is
//! ignored and logged, so the first writer in log order wins and replaying any
//! prefix of the log always yields the same state.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use susu_shared::VotePolicy;
use susu_shared::types::{Money, TxId};

use crate::loan::types::{Disbursement, LoanStatus};
use crate::message::{
    CircleCreation, CircleStatus, CircleUpdate, Contribution, EmergencyLoanApproval,
    EmergencyLoanOverdue, EmergencyLoanRejection, EmergencyLoanRepayment, EmergencyLoanRequest,
    EmergencyLoanVote, GuaranteeStatus, MemberJoin, MessagePayload, PayoutDistribution,
    RewardIssuance, SequencedMessage, SisterGuarantee, UserRegistration, UserVerification,
};
use crate::projection::state::{
    CircleRecord, ContributionRecord, Guarantors, LedgerState, LoanRecord, Member, PayoutRecord,
    UserProfile,
};

type Folded = Result<(), String>;

impl LedgerState {
    /// Folds one message. Messages at or before `last_sequence` are skipped.
    pub fn apply(&mut self, entry: &SequencedMessage) {
        if entry.sequence <= self.last_sequence {
            return;
        }

        let at = entry.message.timestamp;
        let tx_id = &entry.tx_id;
        let outcome = match &entry.message.payload {
            MessagePayload::UserRegistration(m) => self.on_user_registration(m, at),
            MessagePayload::SisterGuarantee(m) => self.on_sister_guarantee(m),
            MessagePayload::UserVerification(m) => self.on_user_verification(m, tx_id),
            MessagePayload::CircleCreation(m) => self.on_circle_creation(m, at),
            MessagePayload::MemberJoin(m) => self.on_member_join(m, at),
            MessagePayload::CircleUpdate(m) => self.on_circle_update(m),
            MessagePayload::Contribution(m) => self.on_contribution(m),
            MessagePayload::RewardIssuance(m) => self.on_reward_issuance(m),
            MessagePayload::PayoutDistribution(m) => self.on_payout(m),
            MessagePayload::EmergencyLoanRequest(m) => self.on_loan_request(m, at),
            MessagePayload::EmergencyLoanVote(m) => self.on_loan_vote(m, at),
            MessagePayload::EmergencyLoanApproval(m) => self.on_loan_approval(m, at),
            MessagePayload::EmergencyLoanRepayment(m) => self.on_loan_repayment(m, at),
            MessagePayload::EmergencyLoanRejection(m) => self.on_loan_rejection(m, at),
            MessagePayload::EmergencyLoanOverdue(m) => self.on_loan_overdue(m, at),
        };

        if let Err(reason) = outcome {
            tracing::warn!(
                sequence = %entry.sequence,
                tx_id = %entry.tx_id,
                message_type = entry.message.message_type(),
                reason = %reason,
                "Message ignored by fold"
            );
        }
        self.last_sequence = entry.sequence;
    }

    fn on_user_registration(&mut self, m: &UserRegistration, at: DateTime<Utc>) -> Folded {
        if self.users.contains_key(&m.account_id) {
            return Err(format!("account {} is already registered", m.account_id));
        }
        let guarantors = match (&m.guarantor1, &m.guarantor2) {
            (Some(first), Some(second)) => Some(Guarantors {
                first: first.clone(),
                second: second.clone(),
                status: GuaranteeStatus::Pending,
            }),
            _ => None,
        };
        self.users.insert(
            m.account_id.clone(),
            UserProfile {
                account_id: m.account_id.clone(),
                name: m.name.clone(),
                phone: m.phone_number.clone(),
                verified: false,
                verified_by: None,
                verification_tx_id: None,
                guarantors,
                registered_at: at,
            },
        );
        Ok(())
    }

    fn on_sister_guarantee(&mut self, m: &SisterGuarantee) -> Folded {
        if m.guarantor1 == m.guarantor2 || m.guarantor1 == m.new_member || m.guarantor2 == m.new_member
        {
            return Err("guarantors must be distinct from each other and the new member".into());
        }
        let user = self
            .users
            .get_mut(&m.new_member)
            .ok_or_else(|| format!("account {} is not registered", m.new_member))?;
        user.guarantors = Some(Guarantors {
            first: m.guarantor1.clone(),
            second: m.guarantor2.clone(),
            status: m.verification_status,
        });
        Ok(())
    }

    fn on_user_verification(&mut self, m: &UserVerification, tx_id: &TxId) -> Folded {
        let user = self
            .users
            .get_mut(&m.account_id)
            .ok_or_else(|| format!("account {} is not registered", m.account_id))?;
        if user.verified && m.is_verified {
            return Err(format!("account {} is already verified", m.account_id));
        }
        user.verified = m.is_verified;
        user.verified_by = Some(m.verified_by.clone());
        user.verification_tx_id = Some(tx_id.clone());
        Ok(())
    }

    fn on_circle_creation(&mut self, m: &CircleCreation, at: DateTime<Utc>) -> Folded {
        if self.circles.contains_key(&m.circle_id) {
            return Err(format!("circle {} already exists", m.circle_id));
        }
        if m.max_members == 0 {
            return Err("circle has no seats".into());
        }
        let mut circle = CircleRecord {
            circle_id: m.circle_id,
            name: m.name.clone(),
            description: m.description.clone(),
            creator: m.creator.clone(),
            monthly_contribution: m.monthly_contribution,
            max_members: m.max_members,
            members: vec![Member {
                account_id: m.creator.clone(),
                name: m.creator_name.clone(),
                joined_at: at,
            }],
            current_round: 1,
            status: CircleStatus::Forming,
            emergency_loans_enabled: m.emergency_loans_enabled,
            max_loan_percentage: m.max_loan_percentage,
            contributions: BTreeMap::new(),
            payouts: BTreeMap::new(),
            funds: Money::ZERO,
            created_at: at,
            activated_at: None,
        };
        if circle.is_full() {
            circle.status = CircleStatus::Active;
            circle.activated_at = Some(at);
        }
        self.circle_order.push(m.circle_id);
        self.circles.insert(m.circle_id, circle);
        Ok(())
    }

    fn on_member_join(&mut self, m: &MemberJoin, at: DateTime<Utc>) -> Folded {
        let circle = self
            .circles
            .get_mut(&m.circle_id)
            .ok_or_else(|| format!("circle {} does not exist", m.circle_id))?;
        if circle.status != CircleStatus::Forming {
            return Err(format!("circle is {}", circle.status));
        }
        if circle.is_member(&m.member_account_id) {
            return Err(format!("{} is already a member", m.member_account_id));
        }
        if circle.is_full() {
            return Err("circle is full".into());
        }

        circle.members.push(Member {
            account_id: m.member_account_id.clone(),
            name: m.member_name.clone(),
            joined_at: at,
        });
        if circle.is_full() {
            circle.status = CircleStatus::Active;
            circle.current_round = 1;
            circle.activated_at = Some(at);
        }
        Ok(())
    }

    fn on_circle_update(&mut self, m: &CircleUpdate) -> Folded {
        let circle = self
            .circles
            .get_mut(&m.circle_id)
            .ok_or_else(|| format!("circle {} does not exist", m.circle_id))?;
        if circle.status != CircleStatus::Active {
            return Err(format!("circle is {}", circle.status));
        }
        if !circle.payouts.contains_key(&circle.current_round) {
            return Err(format!("round {} has not been paid out", circle.current_round));
        }
        let (round, status) = circle.next_round();
        if (m.round, m.status) != (round, status) {
            return Err(format!(
                "expected round {round} ({status}), got round {} ({})",
                m.round, m.status
            ));
        }
        circle.current_round = round;
        circle.status = status;
        Ok(())
    }

    fn on_contribution(&mut self, m: &Contribution) -> Folded {
        let circle = self
            .circles
            .get_mut(&m.circle_id)
            .ok_or_else(|| format!("circle {} does not exist", m.circle_id))?;
        if circle.status != CircleStatus::Active {
            return Err(format!("circle is {}", circle.status));
        }
        if m.round != circle.current_round {
            return Err(format!(
                "round {} is not the current round {}",
                m.round, circle.current_round
            ));
        }
        if !circle.is_member(&m.member_account_id) {
            return Err(format!("{} is not a member", m.member_account_id));
        }
        if circle.contribution(m.round, &m.member_account_id).is_some() {
            return Err(format!(
                "{} already contributed for round {}",
                m.member_account_id, m.round
            ));
        }
        if m.amount != circle.monthly_contribution {
            return Err(format!(
                "amount {} differs from monthly contribution {}",
                m.amount, circle.monthly_contribution
            ));
        }

        circle
            .contributions
            .entry(m.round)
            .or_default()
            .push(ContributionRecord {
                member_account_id: m.member_account_id.clone(),
                amount: m.amount,
                round: m.round,
                payment_tx_id: m.transaction_id.clone(),
                reward_tokens: m.reward_tokens,
            });
        circle.funds = circle.funds.saturating_add(m.amount);
        Ok(())
    }

    fn on_reward_issuance(&mut self, m: &RewardIssuance) -> Folded {
        if !m.amount.is_positive() {
            return Err(format!("reward of {} tokens is not positive", m.amount));
        }
        let total = self.rewards.entry(m.account_id.clone()).or_default();
        *total = total.saturating_add(m.amount);
        Ok(())
    }

    fn on_payout(&mut self, m: &PayoutDistribution) -> Folded {
        let circle = self
            .circles
            .get_mut(&m.circle_id)
            .ok_or_else(|| format!("circle {} does not exist", m.circle_id))?;
        if circle.status != CircleStatus::Active || m.round != circle.current_round {
            return Err(format!(
                "circle is {} in round {}, payout is for round {}",
                circle.status, circle.current_round, m.round
            ));
        }
        if circle.payouts.contains_key(&m.round) {
            return Err(format!("round {} already paid out", m.round));
        }
        if !circle.round_collected(m.round) {
            return Err(format!("round {} is not fully collected", m.round));
        }
        if circle.recipient(m.round).as_ref() != Some(&m.recipient_account_id) {
            return Err(format!(
                "{} is not the rotation recipient of round {}",
                m.recipient_account_id, m.round
            ));
        }
        if circle.payout_amount() != Some(m.amount) {
            return Err(format!("payout amount {} is not the pooled round", m.amount));
        }

        circle.payouts.insert(
            m.round,
            PayoutRecord {
                round: m.round,
                recipient_account_id: m.recipient_account_id.clone(),
                amount: m.amount,
                payment_tx_id: m.transaction_id.clone(),
            },
        );
        circle.funds = circle.funds.saturating_sub(m.amount);
        Ok(())
    }

    fn on_loan_request(&mut self, m: &EmergencyLoanRequest, at: DateTime<Utc>) -> Folded {
        if self.loans.contains_key(&m.loan_id) {
            return Err(format!("loan {} already exists", m.loan_id));
        }
        if !self.circles.contains_key(&m.circle_id) {
            return Err(format!("circle {} does not exist", m.circle_id));
        }
        self.loan_order.push(m.loan_id);
        self.loans.insert(
            m.loan_id,
            LoanRecord {
                loan_id: m.loan_id,
                circle_id: m.circle_id,
                borrower: m.borrower_account_id.clone(),
                amount: m.amount,
                reason: m.reason.clone(),
                urgency: m.urgency_level,
                status: LoanStatus::Voting,
                requested_at: at,
                voting_deadline: m.voting_deadline,
                repayment_period_days: m.repayment_period_days,
                max_loan_percentage: m.max_loan_percentage,
                circle_funds: m.circle_funds,
                member_count: m.member_count,
                votes: BTreeMap::new(),
                approved_at: None,
                disbursement: None,
                repaid: Money::ZERO,
                closed_at: None,
            },
        );
        Ok(())
    }

    fn on_loan_vote(&mut self, m: &EmergencyLoanVote, at: DateTime<Utc>) -> Folded {
        let loan = self
            .loans
            .get_mut(&m.loan_id)
            .ok_or_else(|| format!("loan {} does not exist", m.loan_id))?;
        if loan.status != LoanStatus::Voting {
            return Err(format!("loan is {}", loan.status));
        }
        if at > loan.voting_deadline {
            return Err("vote arrived after the deadline".into());
        }
        if m.voter_account_id == loan.borrower {
            return Err("borrower voted on own loan".into());
        }
        let is_member = self
            .circles
            .get(&loan.circle_id)
            .is_some_and(|c| c.is_member(&m.voter_account_id));
        if !is_member {
            return Err(format!("{} is not a circle member", m.voter_account_id));
        }
        if self.vote_policy == VotePolicy::FirstVoteFinal
            && loan.votes.contains_key(&m.voter_account_id)
        {
            return Err(format!("{} already voted", m.voter_account_id));
        }

        loan.votes.insert(m.voter_account_id.clone(), m.vote);
        if loan.tally().has_quorum() {
            loan.status = LoanStatus::Approved;
            loan.approved_at = Some(at);
        }
        Ok(())
    }

    fn on_loan_approval(&mut self, m: &EmergencyLoanApproval, at: DateTime<Utc>) -> Folded {
        let loan = self
            .loans
            .get_mut(&m.loan_id)
            .ok_or_else(|| format!("loan {} does not exist", m.loan_id))?;
        if loan.status != LoanStatus::Approved {
            return Err(format!("loan is {}", loan.status));
        }
        if m.amount != loan.amount || m.borrower_account_id != loan.borrower {
            return Err("disbursement does not match the request".into());
        }

        loan.status = LoanStatus::Disbursed;
        loan.disbursement = Some(Disbursement {
            transaction_id: m.transaction_id.clone(),
            disbursed_at: at,
            due_date: m.due_date,
        });
        if let Some(circle) = self.circles.get_mut(&loan.circle_id) {
            circle.funds = circle.funds.saturating_sub(m.amount);
        }
        Ok(())
    }

    fn on_loan_repayment(&mut self, m: &EmergencyLoanRepayment, at: DateTime<Utc>) -> Folded {
        let loan = self
            .loans
            .get_mut(&m.loan_id)
            .ok_or_else(|| format!("loan {} does not exist", m.loan_id))?;
        if loan.status != LoanStatus::Disbursed {
            return Err(format!("loan is {}", loan.status));
        }
        if !m.amount.is_positive() || m.amount > loan.outstanding() {
            return Err(format!(
                "repayment of {} does not fit outstanding {}",
                m.amount,
                loan.outstanding()
            ));
        }

        loan.repaid = loan.repaid.saturating_add(m.amount);
        if loan.outstanding().is_zero() {
            loan.status = LoanStatus::Repaid;
            loan.closed_at = Some(at);
        }
        if let Some(circle) = self.circles.get_mut(&loan.circle_id) {
            circle.funds = circle.funds.saturating_add(m.amount);
        }
        Ok(())
    }

    fn on_loan_rejection(&mut self, m: &EmergencyLoanRejection, at: DateTime<Utc>) -> Folded {
        let loan = self
            .loans
            .get_mut(&m.loan_id)
            .ok_or_else(|| format!("loan {} does not exist", m.loan_id))?;
        if loan.status != LoanStatus::Voting {
            return Err(format!("loan is {}", loan.status));
        }
        if at <= loan.voting_deadline {
            return Err("voting is still open".into());
        }
        loan.status = LoanStatus::Rejected;
        loan.closed_at = Some(at);
        Ok(())
    }

    fn on_loan_overdue(&mut self, m: &EmergencyLoanOverdue, at: DateTime<Utc>) -> Folded {
        let loan = self
            .loans
            .get_mut(&m.loan_id)
            .ok_or_else(|| format!("loan {} does not exist", m.loan_id))?;
        if loan.status != LoanStatus::Disbursed {
            return Err(format!("loan is {}", loan.status));
        }
        let Some(due) = loan.due_date() else {
            return Err("loan has no due date".into());
        };
        if at <= due || loan.outstanding().is_zero() {
            return Err("loan is not past due with a balance".into());
        }
        loan.status = LoanStatus::Overdue;
        loan.closed_at = Some(at);
        Ok(())
    }
}
