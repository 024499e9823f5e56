//! Emergency loan engine.

use chrono::Duration;
use std::sync::Arc;
use susu_shared::types::{AccountId, CircleId, LoanId, Money};

use crate::circle::service::find_circle;
use crate::context::{AggregateId, CoreContext};
use crate::contribution::rewards;
use crate::error::CoreError;
use crate::loan::types::{
    DisbursementReceipt, LoanRequestInput, LoanStatus, LoanTally, RepaymentReceipt, VoteReceipt,
};
use crate::message::{
    CircleStatus, DEFAULT_REPAYMENT_PERIOD_DAYS, EmergencyLoanApproval, EmergencyLoanRepayment,
    EmergencyLoanRequest, EmergencyLoanVote, MessagePayload, REPAYMENT_PERIODS_DAYS,
    RepaymentStatus, VoteChoice,
};
use crate::ports::PaymentError;
use crate::projection::{LedgerState, LoanRecord};
use susu_shared::VotePolicy;

/// Runs the loan state machine: voting, approved, disbursed, then repaid or overdue.
#[derive(Debug, Clone)]
pub struct EmergencyLoanEngine {
    pub(crate) ctx: Arc<CoreContext>,
}

impl EmergencyLoanEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Opens a loan for voting.
    ///
    /// The cap is `circle funds × min(circle cap, platform cap) / 100`, evaluated
    /// against the funds folded at request time.
    pub async fn request_loan(&self, input: LoanRequestInput) -> Result<LoanId, CoreError> {
        let policy = &self.ctx.config.loans;
        let reason = input.reason.trim().to_string();
        if reason.is_empty() {
            return Err(CoreError::InvalidInput("reason must not be blank".into()));
        }
        let period = input
            .repayment_period_days
            .unwrap_or(DEFAULT_REPAYMENT_PERIOD_DAYS);
        if !REPAYMENT_PERIODS_DAYS.contains(&period) {
            return Err(CoreError::InvalidInput(format!(
                "repayment period must be one of {REPAYMENT_PERIODS_DAYS:?} days"
            )));
        }
        if !input.amount.is_positive() {
            return Err(CoreError::InvalidInput("amount must be positive".into()));
        }

        let circle_id = input.circle_id;
        let borrower = &input.borrower;
        let _account = self
            .ctx
            .lock(AggregateId::Account(borrower.clone()))
            .await;
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        self.ctx
            .ensure_not_halted(&[AggregateId::Circle(circle_id)])?;

        let now = self.ctx.now();
        let snapshot = self
            .ctx
            .state(|state| {
                let circle = find_circle(state, circle_id)?;
                if circle.status != CircleStatus::Active {
                    return Err(CoreError::CircleNotActive {
                        circle_id,
                        status: circle.status,
                    });
                }
                if !circle.emergency_loans_enabled {
                    return Err(CoreError::LoansDisabled(circle_id));
                }
                if !circle.is_member(borrower) {
                    return Err(CoreError::NotCircleMember {
                        circle_id,
                        account_id: borrower.clone(),
                    });
                }
                let minimum = Money::new(policy.min_loan_amount);
                if input.amount < minimum {
                    return Err(CoreError::LoanBelowMinimum {
                        requested: input.amount,
                        minimum,
                    });
                }
                if state.open_loans_of(borrower, now) >= policy.max_active_loans_per_borrower {
                    return Err(CoreError::TooManyActiveLoans {
                        account_id: borrower.clone(),
                        limit: policy.max_active_loans_per_borrower,
                    });
                }
                let percentage = circle.max_loan_percentage.min(policy.max_loan_percentage);
                let cap = circle.funds.percent(percentage);
                if input.amount > cap {
                    return Err(CoreError::LoanLimitExceeded {
                        requested: input.amount,
                        cap,
                    });
                }
                Ok((percentage, circle.funds, circle.member_count()))
            })
            .await??;
        let (max_loan_percentage, circle_funds, member_count) = snapshot;

        let loan_id = LoanId::new();
        let voting_deadline = now + Duration::hours(policy.voting_period_hours);
        let receipt = self
            .ctx
            .append(MessagePayload::EmergencyLoanRequest(EmergencyLoanRequest {
                loan_id,
                circle_id,
                borrower_account_id: borrower.clone(),
                amount: input.amount,
                reason,
                urgency_level: input.urgency,
                repayment_period_days: period,
                max_loan_percentage,
                circle_funds,
                member_count,
                voting_deadline,
            }))
            .await?;

        tracing::info!(
            loan_id = %loan_id,
            circle_id = %circle_id,
            account_id = %borrower,
            amount = %input.amount,
            tx_id = %receipt.tx_id,
            "Emergency loan requested"
        );
        Ok(loan_id)
    }

    /// Records a member's vote. Reaching quorum approves the loan at once.
    pub async fn cast_vote(
        &self,
        loan_id: LoanId,
        voter: &AccountId,
        vote: VoteChoice,
        voter_name: Option<String>,
    ) -> Result<VoteReceipt, CoreError> {
        let _loan = self.ctx.lock(AggregateId::Loan(loan_id)).await;
        let now = self.ctx.now();
        let policy = self.ctx.config.loans.vote_policy;

        let loan = self
            .ctx
            .state(|state| {
                let loan = find_loan(state, loan_id)?;
                let status = loan.status_at(now);
                if status != LoanStatus::Voting {
                    return Err(CoreError::LoanNotVoting { loan_id, status });
                }
                if &loan.borrower == voter {
                    return Err(CoreError::SelfVote(loan_id));
                }
                let circle = find_circle(state, loan.circle_id)?;
                if !circle.is_member(voter) {
                    return Err(CoreError::NotCircleMember {
                        circle_id: loan.circle_id,
                        account_id: voter.clone(),
                    });
                }
                if policy == VotePolicy::FirstVoteFinal && loan.votes.contains_key(voter) {
                    return Err(CoreError::AlreadyVoted {
                        loan_id,
                        account_id: voter.clone(),
                    });
                }
                Ok(loan.clone())
            })
            .await??;
        self.ctx.ensure_not_halted(&[
            AggregateId::Loan(loan_id),
            AggregateId::Circle(loan.circle_id),
        ])?;

        let receipt = self
            .ctx
            .append(MessagePayload::EmergencyLoanVote(EmergencyLoanVote {
                loan_id,
                voter_account_id: voter.clone(),
                vote,
                voter_name: voter_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            }))
            .await?;

        let (tally, status) = self
            .ctx
            .state(|state| {
                find_loan(state, loan_id).map(|loan| (loan.tally(), loan.status_at(now)))
            })
            .await??;

        tracing::info!(
            loan_id = %loan_id,
            account_id = %voter,
            vote = ?vote,
            votes_for = tally.votes_for,
            quorum = tally.quorum,
            status = %status,
            tx_id = %receipt.tx_id,
            "Vote recorded"
        );
        Ok(VoteReceipt {
            tx_id: receipt.tx_id,
            tally,
            status,
        })
    }

    /// Current vote counts of a loan.
    pub async fn tally(&self, loan_id: LoanId) -> Result<LoanTally, CoreError> {
        self.ctx
            .state(|state| find_loan(state, loan_id).map(LoanRecord::tally))
            .await?
    }

    /// Sends an approved loan to the borrower and starts the repayment clock.
    pub async fn approve_and_disburse(
        &self,
        loan_id: LoanId,
    ) -> Result<DisbursementReceipt, CoreError> {
        let circle_id = self
            .ctx
            .state(|state| find_loan(state, loan_id).map(|loan| loan.circle_id))
            .await??;
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        let _loan = self.ctx.lock(AggregateId::Loan(loan_id)).await;
        let aggregates = [AggregateId::Loan(loan_id), AggregateId::Circle(circle_id)];
        self.ctx.ensure_not_halted(&aggregates)?;

        let now = self.ctx.now();
        let loan = self
            .ctx
            .state(|state| find_loan(state, loan_id).cloned())
            .await??;
        let status = loan.status_at(now);
        if status != LoanStatus::Approved {
            return Err(CoreError::LoanNotApproved { loan_id, status });
        }

        let memo = format!("loan-disbursement:{loan_id}");
        let payment_tx_id = match self
            .ctx
            .payments
            .transfer(&self.ctx.treasury, &loan.borrower, loan.amount, &memo)
            .await
        {
            Ok(tx_id) => tx_id,
            Err(PaymentError::InsufficientFunds { available, .. }) => {
                return Err(CoreError::InsufficientTreasuryFunds {
                    required: loan.amount,
                    available,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let due_date = now + Duration::days(i64::from(loan.repayment_period_days));
        let receipt = self
            .ctx
            .append_recorded(
                &aggregates,
                &payment_tx_id,
                MessagePayload::EmergencyLoanApproval(EmergencyLoanApproval {
                    loan_id,
                    borrower_account_id: loan.borrower.clone(),
                    amount: loan.amount,
                    due_date,
                    transaction_id: payment_tx_id.clone(),
                }),
            )
            .await?;

        tracing::info!(
            loan_id = %loan_id,
            circle_id = %circle_id,
            account_id = %loan.borrower,
            amount = %loan.amount,
            due_date = %due_date,
            tx_id = %receipt.tx_id,
            "Emergency loan disbursed"
        );
        let support_rewards =
            rewards::issue_support_rewards(&self.ctx, &loan, &receipt.tx_id).await?;
        Ok(DisbursementReceipt {
            loan_id,
            payment_tx_id,
            log_tx_id: receipt.tx_id,
            due_date,
            support_rewards,
        })
    }

    /// Moves a repayment from the borrower to the treasury.
    pub async fn repay(&self, loan_id: LoanId, amount: Money) -> Result<RepaymentReceipt, CoreError> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidInput(
                "repayment amount must be positive".into(),
            ));
        }
        let circle_id = self
            .ctx
            .state(|state| find_loan(state, loan_id).map(|loan| loan.circle_id))
            .await??;
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        let _loan = self.ctx.lock(AggregateId::Loan(loan_id)).await;
        let aggregates = [AggregateId::Loan(loan_id), AggregateId::Circle(circle_id)];
        self.ctx.ensure_not_halted(&aggregates)?;

        let loan = self
            .ctx
            .state(|state| find_loan(state, loan_id).cloned())
            .await??;
        if loan.status != LoanStatus::Disbursed {
            return Err(CoreError::LoanNotRepayable {
                loan_id,
                status: loan.status,
            });
        }
        let outstanding = loan.outstanding();
        if amount > outstanding {
            return Err(CoreError::RepaymentExceedsOutstanding {
                amount,
                outstanding,
            });
        }

        let memo = format!("loan-repayment:{loan_id}");
        let payment_tx_id = self
            .ctx
            .payments
            .transfer(&loan.borrower, &self.ctx.treasury, amount, &memo)
            .await?;

        let remaining = outstanding.saturating_sub(amount);
        let repayment_status = if remaining.is_zero() {
            RepaymentStatus::Completed
        } else {
            RepaymentStatus::Partial
        };
        let receipt = self
            .ctx
            .append_recorded(
                &aggregates,
                &payment_tx_id,
                MessagePayload::EmergencyLoanRepayment(EmergencyLoanRepayment {
                    loan_id,
                    borrower_account_id: loan.borrower.clone(),
                    amount,
                    status: repayment_status,
                    transaction_id: payment_tx_id.clone(),
                }),
            )
            .await?;

        let status = if remaining.is_zero() {
            LoanStatus::Repaid
        } else {
            LoanStatus::Disbursed
        };
        tracing::info!(
            loan_id = %loan_id,
            account_id = %loan.borrower,
            amount = %amount,
            outstanding = %remaining,
            tx_id = %receipt.tx_id,
            "Loan repayment recorded"
        );
        Ok(RepaymentReceipt {
            loan_id,
            payment_tx_id,
            log_tx_id: receipt.tx_id,
            outstanding: remaining,
            status,
            payout: None,
        })
    }

    /// Folded state of a loan.
    pub async fn get_loan(&self, loan_id: LoanId) -> Result<LoanRecord, CoreError> {
        self.ctx
            .state(|state| find_loan(state, loan_id).cloned())
            .await?
    }

    /// Loans of a circle in request order.
    pub async fn list_loans(&self, circle_id: CircleId) -> Result<Vec<LoanRecord>, CoreError> {
        self.ctx
            .state(|state| {
                find_circle(state, circle_id)?;
                Ok::<_, CoreError>(state.loans_of_circle(&circle_id).cloned().collect())
            })
            .await?
    }
}

pub(crate) fn find_loan(state: &LedgerState, loan_id: LoanId) -> Result<&LoanRecord, CoreError> {
    state.loan(&loan_id).ok_or(CoreError::LoanNotFound(loan_id))
}
