//! Reward token policy.
//!
//! Contributions earn `amount / 10^currency_decimals * tokens_per_unit` tokens,
//! truncated to the token scale. Completing a circle earns every member a fixed
//! bonus, and voting "for" a loan that gets disbursed earns a support reward.

use susu_shared::RewardPolicy;
use susu_shared::types::{AccountId, CircleId, Money, TokenAmount, TxId};

use crate::context::{AggregateId, CoreContext};
use crate::error::CoreError;
use crate::message::{MessagePayload, RewardIssuance, RewardReason, VoteChoice};
use crate::projection::{CircleRecord, LoanRecord};

/// Tokens earned by a contribution. `None` on overflow.
#[must_use]
pub fn contribution_reward(policy: &RewardPolicy, amount: Money) -> Option<TokenAmount> {
    amount
        .to_major(policy.currency_decimals)?
        .checked_mul(policy.tokens_per_unit)
        .and_then(TokenAmount::from_decimal)
}

/// Tokens every member earns when a circle completes.
#[must_use]
pub fn completion_bonus(policy: &RewardPolicy) -> Option<TokenAmount> {
    TokenAmount::from_whole(policy.completion_bonus_tokens)
}

/// Tokens each supporter of a disbursed loan earns.
#[must_use]
pub fn support_reward(policy: &RewardPolicy) -> Option<TokenAmount> {
    TokenAmount::from_whole(policy.emergency_support_tokens)
}

/// Records a minted reward on the log.
pub(crate) async fn record_issuance(
    ctx: &CoreContext,
    aggregates: &[AggregateId],
    account: &AccountId,
    amount: TokenAmount,
    reason: RewardReason,
    circle_id: CircleId,
    mint_tx: &TxId,
) -> Result<TxId, CoreError> {
    let receipt = ctx
        .append_recorded(
            aggregates,
            mint_tx,
            MessagePayload::RewardIssuance(RewardIssuance {
                account_id: account.clone(),
                amount,
                reason,
                transaction_id: mint_tx.clone(),
                circle_id: Some(circle_id),
            }),
        )
        .await?;
    Ok(receipt.tx_id)
}

/// Mints and records the completion bonus for every member of a completed circle.
///
/// A failure leaves the circle halted; the completion itself is already recorded
/// under `completion_tx`.
pub(crate) async fn issue_completion_bonus(
    ctx: &CoreContext,
    circle: &CircleRecord,
    completion_tx: &TxId,
) -> Result<Vec<TxId>, CoreError> {
    let Some(bonus) = completion_bonus(&ctx.config.rewards).filter(|tokens| tokens.is_positive())
    else {
        return Ok(Vec::new());
    };

    let aggregates = [AggregateId::Circle(circle.circle_id)];
    let memo = format!("completion:{}", circle.circle_id);
    let mut issued = Vec::with_capacity(circle.members.len());
    for member in &circle.members {
        let mint_tx = match ctx.tokens.mint(&member.account_id, bonus, &memo).await {
            Ok(tx) => tx,
            Err(err) => {
                return Err(ctx.inconsistent(
                    &aggregates,
                    completion_tx,
                    &format!("completion bonus for {} not minted: {err}", member.account_id),
                ));
            }
        };
        let tx_id = record_issuance(
            ctx,
            &aggregates,
            &member.account_id,
            bonus,
            RewardReason::CircleCompletion,
            circle.circle_id,
            &mint_tx,
        )
        .await?;
        issued.push(tx_id);
    }

    tracing::info!(
        circle_id = %circle.circle_id,
        members = circle.members.len(),
        bonus = %bonus,
        "Completion bonus issued"
    );
    Ok(issued)
}

/// Mints and records the support reward for every "for" voter of a disbursed loan.
///
/// Voters without a token account are skipped. A mint failure halts the loan and
/// its circle; the disbursement is already recorded under `approval_tx`.
pub(crate) async fn issue_support_rewards(
    ctx: &CoreContext,
    loan: &LoanRecord,
    approval_tx: &TxId,
) -> Result<Vec<TxId>, CoreError> {
    let Some(reward) = support_reward(&ctx.config.rewards).filter(|tokens| tokens.is_positive())
    else {
        return Ok(Vec::new());
    };

    let aggregates = [
        AggregateId::Loan(loan.loan_id),
        AggregateId::Circle(loan.circle_id),
    ];
    let memo = format!("emergency-support:{}", loan.loan_id);
    let mut issued = Vec::new();
    for (voter, _) in loan.votes.iter().filter(|(_, vote)| **vote == VoteChoice::For) {
        if !ctx.tokens.is_associated(voter).await.unwrap_or(false) {
            tracing::debug!(
                loan_id = %loan.loan_id,
                account_id = %voter,
                "Supporter has no token account"
            );
            continue;
        }
        let mint_tx = match ctx.tokens.mint(voter, reward, &memo).await {
            Ok(tx) => tx,
            Err(err) => {
                return Err(ctx.inconsistent(
                    &aggregates,
                    approval_tx,
                    &format!("support reward for {voter} not minted: {err}"),
                ));
            }
        };
        let tx_id = record_issuance(
            ctx,
            &aggregates,
            voter,
            reward,
            RewardReason::EmergencySupport,
            loan.circle_id,
            &mint_tx,
        )
        .await?;
        issued.push(tx_id);
    }

    if !issued.is_empty() {
        tracing::info!(
            loan_id = %loan.loan_id,
            supporters = issued.len(),
            reward = %reward,
            "Emergency support rewards issued"
        );
    }
    Ok(issued)
}
