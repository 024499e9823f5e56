//! Circle registry.

use std::sync::Arc;
use susu_shared::types::{AccountId, CircleId, Money, TxId};

use crate::circle::types::{NewCircle, RoundAdvance};
use crate::context::{AggregateId, CoreContext};
use crate::contribution::rewards;
use crate::error::CoreError;
use crate::message::{CircleCreation, CircleStatus, CircleUpdate, MemberJoin, MessagePayload};
use crate::projection::{CircleRecord, LedgerState};

/// Creates circles, seats members and owns the payout rotation.
#[derive(Debug, Clone)]
pub struct CircleRegistry {
    ctx: Arc<CoreContext>,
}

impl CircleRegistry {
    /// Creates the registry.
    #[must_use]
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Creates a circle with the creator in the first seat.
    pub async fn create_circle(&self, input: NewCircle) -> Result<CircleId, CoreError> {
        let limits = &self.ctx.config.circle;
        let loans = &self.ctx.config.loans;

        if input.name.trim().is_empty() {
            return Err(CoreError::InvalidCircleParameters(
                "name must not be blank".into(),
            ));
        }
        if !(limits.min_members..=limits.max_members).contains(&input.max_members) {
            return Err(CoreError::InvalidCircleParameters(format!(
                "max members must be between {} and {}",
                limits.min_members, limits.max_members
            )));
        }
        let contribution = input.monthly_contribution.minor_units();
        if !(limits.min_contribution..=limits.max_contribution).contains(&contribution) {
            return Err(CoreError::InvalidCircleParameters(format!(
                "monthly contribution must be between {} and {}",
                limits.min_contribution, limits.max_contribution
            )));
        }
        let max_loan_percentage = input
            .max_loan_percentage
            .unwrap_or(loans.default_max_loan_percentage);
        if !(loans.min_loan_percentage..=loans.max_loan_percentage).contains(&max_loan_percentage)
        {
            return Err(CoreError::InvalidCircleParameters(format!(
                "max loan percentage must be between {} and {}",
                loans.min_loan_percentage, loans.max_loan_percentage
            )));
        }

        let _guard = self
            .ctx
            .lock(AggregateId::Account(input.creator.clone()))
            .await;

        let creator_name = self
            .ctx
            .state(|state| {
                let profile = state
                    .user(&input.creator)
                    .ok_or_else(|| CoreError::UserNotFound(input.creator.clone()))?;
                ensure_circle_capacity(state, &input.creator, limits.max_circles_per_member)?;
                Ok::<_, CoreError>(display_name(input.creator_name.as_deref(), &profile.name))
            })
            .await??;

        let circle_id = CircleId::new();
        let receipt = self
            .ctx
            .append(MessagePayload::CircleCreation(CircleCreation {
                circle_id,
                name: input.name.trim().to_string(),
                creator: input.creator.clone(),
                creator_name,
                monthly_contribution: input.monthly_contribution,
                max_members: input.max_members,
                description: input
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                emergency_loans_enabled: input.emergency_loans_enabled,
                max_loan_percentage,
            }))
            .await?;

        tracing::info!(
            circle_id = %circle_id,
            account_id = %input.creator,
            tx_id = %receipt.tx_id,
            "Circle created"
        );
        Ok(circle_id)
    }

    /// Seats a member. The join that fills the last seat activates the circle.
    pub async fn join_circle(
        &self,
        circle_id: CircleId,
        member: &AccountId,
        member_name: &str,
    ) -> Result<TxId, CoreError> {
        let _account = self.ctx.lock(AggregateId::Account(member.clone())).await;
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        self.ctx.ensure_not_halted(&[AggregateId::Circle(circle_id)])?;

        let max_circles = self.ctx.config.circle.max_circles_per_member;
        let name = self
            .ctx
            .state(|state| {
                let circle = find_circle(state, circle_id)?;
                let profile = state
                    .user(member)
                    .ok_or_else(|| CoreError::UserNotFound(member.clone()))?;
                if circle.is_member(member) {
                    return Err(CoreError::AlreadyMember {
                        circle_id,
                        account_id: member.clone(),
                    });
                }
                if circle.is_full() {
                    return Err(CoreError::CircleFull {
                        circle_id,
                        max_members: circle.max_members,
                    });
                }
                if circle.status != CircleStatus::Forming {
                    return Err(CoreError::CircleNotForming {
                        circle_id,
                        status: circle.status,
                    });
                }
                ensure_circle_capacity(state, member, max_circles)?;
                Ok(display_name(Some(member_name), &profile.name))
            })
            .await??;

        let receipt = self
            .ctx
            .append(MessagePayload::MemberJoin(MemberJoin {
                circle_id,
                member_account_id: member.clone(),
                member_name: name,
            }))
            .await?;

        let activated = self
            .ctx
            .state(|state| {
                state
                    .circle(&circle_id)
                    .is_some_and(|c| c.status == CircleStatus::Active)
            })
            .await?;
        tracing::info!(
            circle_id = %circle_id,
            account_id = %member,
            tx_id = %receipt.tx_id,
            activated,
            "Member joined circle"
        );
        Ok(receipt.tx_id)
    }

    /// Member paid in `round`: `members[(round - 1) mod n]`.
    pub async fn rotation_recipient(
        &self,
        circle_id: CircleId,
        round: u32,
    ) -> Result<AccountId, CoreError> {
        if round == 0 {
            return Err(CoreError::InvalidInput("rounds start at 1".into()));
        }
        self.ctx
            .state(|state| {
                let circle = find_circle(state, circle_id)?;
                if circle.status == CircleStatus::Forming {
                    return Err(CoreError::CircleNotActive {
                        circle_id,
                        status: circle.status,
                    });
                }
                circle
                    .recipient(round)
                    .ok_or_else(|| CoreError::InvalidInput(format!("no recipient for round {round}")))
            })
            .await?
    }

    /// Closes the current round once it is collected and paid out.
    ///
    /// Completing the last round of the cycle completes the circle and credits
    /// every member the completion bonus.
    pub async fn advance_round(&self, circle_id: CircleId) -> Result<RoundAdvance, CoreError> {
        let _circle = self.ctx.lock(AggregateId::Circle(circle_id)).await;
        self.ctx.ensure_not_halted(&[AggregateId::Circle(circle_id)])?;
        self.advance_round_locked(circle_id).await
    }

    /// [`Self::advance_round`] for callers that already hold the circle lock.
    pub(crate) async fn advance_round_locked(
        &self,
        circle_id: CircleId,
    ) -> Result<RoundAdvance, CoreError> {
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
        let round = circle.current_round;
        if !circle.round_collected(round) {
            return Err(CoreError::RoundNotComplete {
                circle_id,
                round,
                detail: format!(
                    "{} of {} contributions received",
                    circle.round_contributions(round).len(),
                    circle.members.len()
                ),
            });
        }
        if !circle.payouts.contains_key(&round) {
            return Err(CoreError::RoundNotComplete {
                circle_id,
                round,
                detail: "payout has not been distributed".into(),
            });
        }

        let (next_round, status) = circle.next_round();
        let receipt = self
            .ctx
            .append(MessagePayload::CircleUpdate(CircleUpdate {
                circle_id,
                round: next_round,
                status,
            }))
            .await?;

        let completion_rewards = if status == CircleStatus::Completed {
            tracing::info!(circle_id = %circle_id, rounds = round, "Circle completed");
            rewards::issue_completion_bonus(&self.ctx, &circle, &receipt.tx_id).await?
        } else {
            tracing::info!(circle_id = %circle_id, round = next_round, "Circle advanced to next round");
            Vec::new()
        };

        Ok(RoundAdvance {
            tx_id: receipt.tx_id,
            round: next_round,
            status,
            completion_rewards,
        })
    }

    /// Folded state of a circle.
    pub async fn get_circle(&self, circle_id: CircleId) -> Result<CircleRecord, CoreError> {
        self.ctx
            .state(|state| find_circle(state, circle_id).cloned())
            .await?
    }

    /// Pooled amount a round pays out.
    pub async fn payout_amount(&self, circle_id: CircleId) -> Result<Money, CoreError> {
        let circle = self.get_circle(circle_id).await?;
        circle
            .payout_amount()
            .ok_or_else(|| CoreError::InvalidCircleParameters("payout amount overflows".into()))
    }
}

pub(crate) fn find_circle(
    state: &LedgerState,
    circle_id: CircleId,
) -> Result<&CircleRecord, CoreError> {
    state
        .circle(&circle_id)
        .ok_or(CoreError::CircleNotFound(circle_id))
}

fn ensure_circle_capacity(
    state: &LedgerState,
    account: &AccountId,
    limit: usize,
) -> Result<(), CoreError> {
    if state.unfinished_circles_of(account) >= limit {
        return Err(CoreError::TooManyCircles {
            account_id: account.clone(),
            limit,
        });
    }
    Ok(())
}

fn display_name(requested: Option<&str>, profile_name: &str) -> String {
    match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => profile_name.to_string(),
    }
}
