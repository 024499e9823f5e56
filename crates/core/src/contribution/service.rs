//! Contribution processor.

use std::sync::Arc;
use susu_shared::AppError;
use susu_shared::types::{AccountId, CircleId, Money};

use crate::circle::CircleRegistry;
use crate::circle::service::find_circle;
use crate::context::{AggregateId, CoreContext};
use crate::contribution::rewards;
use crate::contribution::types::{ContributionReceipt, PayoutOutcome, PayoutReceipt};
use crate::error::{ContributionProblem, CoreError};
use crate::message::{CircleStatus, Contribution, MessagePayload, PayoutDistribution, RewardReason};
use crate::ports::PaymentError;

/// Takes monthly contributions into the treasury and pays each round out.
#[derive(Debug, Clone)]
pub struct ContributionProcessor {
    ctx: Arc<CoreContext>,
    registry: CircleRegistry,
}

impl ContributionProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new(ctx: Arc<CoreContext>, registry: CircleRegistry) -> Self {
        Self { ctx, registry }
    }

    /// Collects one member's contribution for the current round.
    ///
    /// Order of effects: payment to the treasury, reward mint, CONTRIBUTION
    /// message, REWARD_ISSUANCE message. The last outstanding contribution of a
    /// round triggers the payout; its outcome is reported in the receipt and
    /// never turns a recorded contribution into an error.
    pub async fn collect_contribution(
        &self,
        circle_id: CircleId,
        member: &AccountId,
        amount: Money,
        round: u32,
    ) -> Result<ContributionReceipt, CoreError> {
        let aggregates = [AggregateId::Circle(circle_id)];
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        self.ctx.ensure_not_halted(&aggregates)?;

        let circle = self
            .ctx
            .state(|state| find_circle(state, circle_id).cloned())
            .await??;
        if circle.status != CircleStatus::Active {
            return Err(CoreError::CircleNotActive {
                circle_id,
                status: circle.status,
            });
        }
        if !circle.is_member(member) {
            return Err(CoreError::NotCircleMember {
                circle_id,
                account_id: member.clone(),
            });
        }
        if amount != circle.monthly_contribution {
            return Err(CoreError::InvalidContribution(
                ContributionProblem::WrongAmount {
                    expected: circle.monthly_contribution,
                    actual: amount,
                },
            ));
        }
        if round != circle.current_round {
            return Err(CoreError::InvalidContribution(
                ContributionProblem::WrongRound {
                    expected: circle.current_round,
                    actual: round,
                },
            ));
        }
        if circle.contribution(round, member).is_some() {
            return Err(CoreError::DuplicateContribution {
                circle_id,
                account_id: member.clone(),
                round,
            });
        }
        if !self.ctx.tokens.is_associated(member).await? {
            return Err(CoreError::TokenAccountNotAssociated(member.clone()));
        }

        let reward = rewards::contribution_reward(&self.ctx.config.rewards, amount)
            .filter(|tokens| tokens.is_positive());
        let memo = format!("contribution:{circle_id}:{round}");

        let payment_tx_id = self
            .ctx
            .payments
            .transfer(member, &self.ctx.treasury, amount, &memo)
            .await?;

        let reward_tx_id = match reward {
            Some(tokens) => match self.ctx.tokens.mint(member, tokens, &memo).await {
                Ok(tx_id) => Some(tx_id),
                Err(err) => {
                    return Err(self.ctx.inconsistent(
                        &aggregates,
                        &payment_tx_id,
                        &format!("reward mint failed after contribution payment: {err}"),
                    ));
                }
            },
            None => None,
        };

        let log_receipt = self
            .ctx
            .append_recorded(
                &aggregates,
                &payment_tx_id,
                MessagePayload::Contribution(Contribution {
                    circle_id,
                    member_account_id: member.clone(),
                    amount,
                    round,
                    transaction_id: payment_tx_id.clone(),
                    reward_tokens: reward,
                }),
            )
            .await?;

        if let (Some(tokens), Some(mint_tx)) = (reward, &reward_tx_id) {
            rewards::record_issuance(
                &self.ctx,
                &aggregates,
                member,
                tokens,
                RewardReason::Contribution,
                circle_id,
                mint_tx,
            )
            .await?;
        }

        tracing::info!(
            circle_id = %circle_id,
            account_id = %member,
            round,
            amount = %amount,
            tx_id = %log_receipt.tx_id,
            "Contribution collected"
        );

        let collected = self
            .ctx
            .state(|state| {
                state
                    .circle(&circle_id)
                    .is_some_and(|c| c.current_round == round && c.round_collected(round))
            })
            .await?;
        let payout = if collected {
            Some(self.settle_round(circle_id, round).await)
        } else {
            None
        };

        Ok(ContributionReceipt {
            payment_tx_id,
            reward_tx_id,
            reward_tokens: reward,
            log_tx_id: log_receipt.tx_id,
            payout,
        })
    }

    /// Pays the pooled round to its rotation recipient and closes the round.
    pub async fn distribute_payout(
        &self,
        circle_id: CircleId,
        round: u32,
    ) -> Result<PayoutReceipt, CoreError> {
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        self.ctx
            .ensure_not_halted(&[AggregateId::Circle(circle_id)])?;
        self.distribute_payout_locked(circle_id, round).await
    }

    /// Pays out a collected round that is still waiting, typically after a loan
    /// repayment refilled the pool. Returns `None` if nothing is pending.
    pub async fn settle_pending_payout(&self, circle_id: CircleId) -> Option<PayoutOutcome> {
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        if self
            .ctx
            .ensure_not_halted(&[AggregateId::Circle(circle_id)])
            .is_err()
        {
            return None;
        }
        let pending = self
            .ctx
            .state(|state| {
                state.circle(&circle_id).and_then(|circle| {
                    let round = circle.current_round;
                    (circle.status == CircleStatus::Active
                        && circle.round_collected(round)
                        && !circle.payouts.contains_key(&round))
                    .then_some(round)
                })
            })
            .await;
        match pending {
            Ok(Some(round)) => Some(self.settle_round(circle_id, round).await),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(circle_id = %circle_id, error = %err, "Pending payout check failed");
                None
            }
        }
    }

    async fn settle_round(&self, circle_id: CircleId, round: u32) -> PayoutOutcome {
        match self.distribute_payout_locked(circle_id, round).await {
            Ok(receipt) => PayoutOutcome::Distributed(receipt),
            Err(CoreError::PayoutAwaitingRepayment {
                required,
                available,
                ..
            }) => {
                tracing::warn!(
                    circle_id = %circle_id,
                    round,
                    required = %required,
                    available = %available,
                    "Payout waits for loan repayments"
                );
                PayoutOutcome::AwaitingRepayment {
                    round,
                    required,
                    available,
                }
            }
            Err(err) => {
                tracing::error!(circle_id = %circle_id, round, error = %err, "Payout failed");
                PayoutOutcome::Failed {
                    round,
                    error: err.error_code().to_string(),
                    message: AppError::from(err).public_message(),
                }
            }
        }
    }

    async fn distribute_payout_locked(
        &self,
        circle_id: CircleId,
        round: u32,
    ) -> Result<PayoutReceipt, CoreError> {
        let aggregates = [AggregateId::Circle(circle_id)];
        let circle = self
            .ctx
            .state(|state| find_circle(state, circle_id).cloned())
            .await??;
        if circle.status != CircleStatus::Active {
            return Err(CoreError::CircleNotActive {
                circle_id,
                status: circle.status,
            });
        }
        if circle.payouts.contains_key(&round) || round < circle.current_round {
            return Err(CoreError::PayoutAlreadyDistributed { circle_id, round });
        }
        if round > circle.current_round {
            return Err(CoreError::RoundNotComplete {
                circle_id,
                round,
                detail: format!("current round is {}", circle.current_round),
            });
        }

        let amount = circle
            .payout_amount()
            .ok_or_else(|| CoreError::InvalidCircleParameters("payout amount overflows".into()))?;
        let collected = circle.round_total(round);
        if !circle.round_collected(round) || collected != amount {
            return Err(CoreError::RoundNotComplete {
                circle_id,
                round,
                detail: format!("collected {collected} of {amount}"),
            });
        }
        if circle.funds < amount {
            return Err(CoreError::PayoutAwaitingRepayment {
                circle_id,
                round,
                required: amount,
                available: circle.funds,
            });
        }
        let recipient = circle.recipient(round).ok_or_else(|| {
            CoreError::InvalidInput(format!("no rotation recipient for round {round}"))
        })?;

        let memo = format!("payout:{circle_id}:{round}");
        let payment_tx_id = match self
            .ctx
            .payments
            .transfer(&self.ctx.treasury, &recipient, amount, &memo)
            .await
        {
            Ok(tx_id) => tx_id,
            Err(PaymentError::InsufficientFunds { available, .. }) => {
                let err = CoreError::InsufficientTreasuryFunds {
                    required: amount,
                    available,
                };
                self.ctx.halt(&aggregates, &err.to_string(), None);
                return Err(err);
            }
            Err(err) => return Err(err.into()),
        };

        let log_receipt = self
            .ctx
            .append_recorded(
                &aggregates,
                &payment_tx_id,
                MessagePayload::PayoutDistribution(PayoutDistribution {
                    circle_id,
                    recipient_account_id: recipient.clone(),
                    amount,
                    round,
                    transaction_id: payment_tx_id.clone(),
                }),
            )
            .await?;

        tracing::info!(
            circle_id = %circle_id,
            account_id = %recipient,
            round,
            amount = %amount,
            tx_id = %log_receipt.tx_id,
            "Payout distributed"
        );

        let advance = self.registry.advance_round_locked(circle_id).await?;

        Ok(PayoutReceipt {
            round,
            recipient,
            amount,
            payment_tx_id,
            log_tx_id: log_receipt.tx_id,
            advance,
        })
    }

    /// Closes the current round; see [`CircleRegistry::advance_round`].
    pub async fn advance_round(
        &self,
        circle_id: CircleId,
    ) -> Result<crate::circle::RoundAdvance, CoreError> {
        self.registry.advance_round(circle_id).await
    }
}
