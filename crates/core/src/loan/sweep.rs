//! Periodic sweep over loans whose deadline or due date has passed.

use crate::context::AggregateId;
use crate::error::CoreError;
use crate::loan::service::{EmergencyLoanEngine, find_loan};
use crate::loan::types::{LoanStatus, SweepReport};
use crate::message::{EmergencyLoanOverdue, EmergencyLoanRejection, MessagePayload};
use crate::projection::LoanRecord;

enum Expiry {
    Rejected,
    Overdue,
}

fn due_for_closure(loan: &LoanRecord, now: chrono::DateTime<chrono::Utc>) -> Option<Expiry> {
    match loan.status {
        LoanStatus::Voting if now > loan.voting_deadline => Some(Expiry::Rejected),
        LoanStatus::Disbursed
            if loan.due_date().is_some_and(|due| now > due) && loan.outstanding().is_positive() =>
        {
            Some(Expiry::Overdue)
        }
        _ => None,
    }
}

impl EmergencyLoanEngine {
    /// Records rejections for expired votes and overdue markers for late loans.
    ///
    /// Halted loans and loans of halted circles are reported as skipped.
    pub async fn sweep(&self) -> Result<SweepReport, CoreError> {
        let now = self.ctx.now();
        let candidates: Vec<_> = self
            .ctx
            .state(|state| {
                state
                    .loan_order
                    .iter()
                    .filter_map(|id| state.loan(id))
                    .filter(|loan| due_for_closure(loan, now).is_some())
                    .map(|loan| (loan.loan_id, loan.circle_id))
                    .collect()
            })
            .await?;

        let mut report = SweepReport::default();
        for (loan_id, circle_id) in candidates {
            let _loan = self.ctx.lock(AggregateId::Loan(loan_id)).await;
            if self
                .ctx
                .ensure_not_halted(&[AggregateId::Loan(loan_id), AggregateId::Circle(circle_id)])
                .is_err()
            {
                report.skipped.push(loan_id);
                continue;
            }

            let loan = self
                .ctx
                .state(|state| find_loan(state, loan_id).cloned())
                .await??;
            match due_for_closure(&loan, now) {
                Some(Expiry::Rejected) => {
                    let tally = loan.tally();
                    let receipt = self
                        .ctx
                        .append(MessagePayload::EmergencyLoanRejection(EmergencyLoanRejection {
                            loan_id,
                            votes_for: tally.votes_for,
                            quorum: tally.quorum,
                        }))
                        .await?;
                    tracing::info!(
                        loan_id = %loan_id,
                        votes_for = tally.votes_for,
                        quorum = tally.quorum,
                        tx_id = %receipt.tx_id,
                        "Loan rejected after voting deadline"
                    );
                    report.rejected.push(loan_id);
                }
                Some(Expiry::Overdue) => {
                    let Some(due_date) = loan.due_date() else {
                        continue;
                    };
                    let outstanding = loan.outstanding();
                    let receipt = self
                        .ctx
                        .append(MessagePayload::EmergencyLoanOverdue(EmergencyLoanOverdue {
                            loan_id,
                            outstanding,
                            due_date,
                        }))
                        .await?;
                    tracing::warn!(
                        loan_id = %loan_id,
                        account_id = %loan.borrower,
                        outstanding = %outstanding,
                        tx_id = %receipt.tx_id,
                        "Loan overdue"
                    );
                    report.overdue.push(loan_id);
                }
                None => {}
            }
        }

        if !report.rejected.is_empty() || !report.overdue.is_empty() {
            tracing::info!(
                rejected = report.rejected.len(),
                overdue = report.overdue.len(),
                skipped = report.skipped.len(),
                "Loan sweep finished"
            );
        }
        Ok(report)
    }
}
