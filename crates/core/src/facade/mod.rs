//! One entry point over the four services.
//!
//! The facade holds no state of its own: every read folds the message log through
//! the shared projection, and every command goes to the service that owns it.

pub mod views;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use susu_shared::LedgerConfig;
use susu_shared::types::{AccountId, CircleId, LoanId, Money, PageRequest, PageResponse, SequenceId, TxId};

use crate::circle::{CircleRegistry, NewCircle, RoundAdvance};
use crate::context::{AggregateId, CoreContext, Halt};
use crate::contribution::{ContributionProcessor, ContributionReceipt, PayoutReceipt};
use crate::error::CoreError;
use crate::loan::{
    DisbursementReceipt, EmergencyLoanEngine, LoanRequestInput, LoanTally, RepaymentReceipt,
    SweepReport, VoteReceipt,
};
use crate::message::VoteChoice;
use crate::ports::Ports;
use crate::projection::UserProfile;
use crate::trust::{NewUser, TrustGuaranteeService};

pub use views::{AccountBalance, CircleView, LoanView, ScheduleEntry, VoteView};

/// The ledger core behind one API.
#[derive(Debug, Clone)]
pub struct LedgerFacade {
    ctx: Arc<CoreContext>,
    trust: TrustGuaranteeService,
    circles: CircleRegistry,
    contributions: ContributionProcessor,
    loans: EmergencyLoanEngine,
}

impl LedgerFacade {
    /// Wires the services over `ports`.
    #[must_use]
    pub fn new(ports: Ports, config: LedgerConfig) -> Self {
        let ctx = Arc::new(CoreContext::new(ports, config));
        let circles = CircleRegistry::new(ctx.clone());
        Self {
            trust: TrustGuaranteeService::new(ctx.clone()),
            contributions: ContributionProcessor::new(ctx.clone(), circles.clone()),
            loans: EmergencyLoanEngine::new(ctx.clone()),
            circles,
            ctx,
        }
    }

    // Users

    /// See [`TrustGuaranteeService::register_user`].
    pub async fn register_user(&self, user: NewUser) -> Result<TxId, CoreError> {
        self.trust.register_user(user).await
    }

    /// See [`TrustGuaranteeService::verify_user`].
    pub async fn verify_user(
        &self,
        account_id: &AccountId,
        verified_by: &str,
    ) -> Result<TxId, CoreError> {
        self.trust.verify_user(account_id, verified_by).await
    }

    /// See [`TrustGuaranteeService::submit_guarantee`].
    pub async fn submit_guarantee(
        &self,
        new_member: &AccountId,
        guarantor1: &AccountId,
        guarantor2: &AccountId,
    ) -> Result<TxId, CoreError> {
        self.trust
            .submit_guarantee(new_member, guarantor1, guarantor2)
            .await
    }

    /// See [`TrustGuaranteeService::get_user`].
    pub async fn get_user(&self, account_id: &AccountId) -> Result<UserProfile, CoreError> {
        self.trust.get_user(account_id).await
    }

    /// Native balance from the payment ledger, token balance from the token ledger,
    /// and the reward total folded from the log.
    pub async fn get_account_balance(
        &self,
        account_id: &AccountId,
    ) -> Result<AccountBalance, CoreError> {
        let native = self.ctx.payments.balance_of(account_id).await?;
        let token = self.ctx.tokens.balance_of(account_id).await?;
        let rewards_earned = self
            .ctx
            .state(|state| state.reward_total(account_id))
            .await?;
        Ok(AccountBalance {
            account_id: account_id.clone(),
            native,
            token,
            rewards_earned,
        })
    }

    // Circles

    /// See [`CircleRegistry::create_circle`].
    pub async fn create_circle(&self, input: NewCircle) -> Result<CircleId, CoreError> {
        self.circles.create_circle(input).await
    }

    /// See [`CircleRegistry::join_circle`].
    pub async fn join_circle(
        &self,
        circle_id: CircleId,
        member: &AccountId,
        member_name: &str,
    ) -> Result<TxId, CoreError> {
        self.circles.join_circle(circle_id, member, member_name).await
    }

    /// Circle with members, round, funds and rotation schedule.
    pub async fn get_circle(&self, circle_id: CircleId) -> Result<CircleView, CoreError> {
        let circle = self.circles.get_circle(circle_id).await?;
        Ok(CircleView::from(&circle))
    }

    /// Circles in creation order.
    pub async fn list_circles(
        &self,
        page: &PageRequest,
    ) -> Result<PageResponse<CircleView>, CoreError> {
        let views: Vec<CircleView> = self
            .ctx
            .state(|state| state.circles_in_order().map(CircleView::from).collect())
            .await?;
        Ok(page.paginate(&views))
    }

    /// See [`CircleRegistry::rotation_recipient`].
    pub async fn rotation_recipient(
        &self,
        circle_id: CircleId,
        round: u32,
    ) -> Result<AccountId, CoreError> {
        self.circles.rotation_recipient(circle_id, round).await
    }

    // Contributions

    /// See [`ContributionProcessor::collect_contribution`].
    pub async fn collect_contribution(
        &self,
        circle_id: CircleId,
        member: &AccountId,
        amount: Money,
        round: u32,
    ) -> Result<ContributionReceipt, CoreError> {
        self.contributions
            .collect_contribution(circle_id, member, amount, round)
            .await
    }

    /// See [`ContributionProcessor::distribute_payout`].
    pub async fn distribute_payout(
        &self,
        circle_id: CircleId,
        round: u32,
    ) -> Result<PayoutReceipt, CoreError> {
        self.contributions.distribute_payout(circle_id, round).await
    }

    /// See [`CircleRegistry::advance_round`].
    pub async fn advance_round(&self, circle_id: CircleId) -> Result<RoundAdvance, CoreError> {
        self.contributions.advance_round(circle_id).await
    }

    // Loans

    /// See [`EmergencyLoanEngine::request_loan`].
    pub async fn request_loan(&self, input: LoanRequestInput) -> Result<LoanId, CoreError> {
        self.loans.request_loan(input).await
    }

    /// See [`EmergencyLoanEngine::cast_vote`].
    pub async fn cast_vote(
        &self,
        loan_id: LoanId,
        voter: &AccountId,
        vote: VoteChoice,
        voter_name: Option<String>,
    ) -> Result<VoteReceipt, CoreError> {
        self.loans.cast_vote(loan_id, voter, vote, voter_name).await
    }

    /// See [`EmergencyLoanEngine::tally`].
    pub async fn tally(&self, loan_id: LoanId) -> Result<LoanTally, CoreError> {
        self.loans.tally(loan_id).await
    }

    /// See [`EmergencyLoanEngine::approve_and_disburse`].
    pub async fn approve_and_disburse(
        &self,
        loan_id: LoanId,
    ) -> Result<DisbursementReceipt, CoreError> {
        self.loans.approve_and_disburse(loan_id).await
    }

    /// See [`EmergencyLoanEngine::repay`].
    ///
    /// A repayment that refills the pool of a collected round releases its payout.
    pub async fn repay_loan(
        &self,
        loan_id: LoanId,
        amount: Money,
    ) -> Result<RepaymentReceipt, CoreError> {
        let circle_id = self.loans.get_loan(loan_id).await?.circle_id;
        let mut receipt = self.loans.repay(loan_id, amount).await?;
        receipt.payout = self.contributions.settle_pending_payout(circle_id).await;
        Ok(receipt)
    }

    /// Loan with tally, time remaining and outstanding balance.
    pub async fn get_loan(&self, loan_id: LoanId) -> Result<LoanView, CoreError> {
        let loan = self.loans.get_loan(loan_id).await?;
        Ok(LoanView::at(&loan, self.ctx.now()))
    }

    /// Loans of a circle in request order.
    pub async fn list_loans(&self, circle_id: CircleId) -> Result<Vec<LoanView>, CoreError> {
        let now = self.ctx.now();
        let loans = self.loans.list_loans(circle_id).await?;
        Ok(loans.iter().map(|loan| LoanView::at(loan, now)).collect())
    }

    /// See [`EmergencyLoanEngine::sweep`].
    pub async fn sweep(&self) -> Result<SweepReport, CoreError> {
        self.loans.sweep().await
    }

    // Operator tools

    /// Catches the projection up with the log and returns its position.
    pub async fn last_sequence(&self) -> Result<SequenceId, CoreError> {
        Ok(self.ctx.projection().catch_up().await?)
    }

    /// Folds the whole log again from the first message.
    pub async fn rebuild_projection(&self) -> Result<SequenceId, CoreError> {
        Ok(self.ctx.projection().rebuild().await?)
    }

    /// Lifts a halt after manual reconciliation. Returns false if nothing was halted.
    pub fn resolve_halt(&self, aggregate: &AggregateId) -> bool {
        self.ctx.resolve_halt(aggregate)
    }

    /// Outstanding halts, oldest first.
    #[must_use]
    pub fn halts(&self) -> Vec<Halt> {
        self.ctx.halts()
    }
}
