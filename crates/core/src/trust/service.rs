//! Trust and guarantee service.

use std::sync::Arc;
use susu_shared::types::{AccountId, TxId};

use crate::context::{AggregateId, CoreContext};
use crate::error::CoreError;
use crate::message::{
    GuaranteeStatus, MessagePayload, SisterGuarantee, UserRegistration, UserVerification,
};
use crate::projection::{LedgerState, UserProfile};

/// Input of a registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Ledger account of the user.
    pub account_id: AccountId,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Two verified users vouching for the new one.
    pub guarantors: Option<(AccountId, AccountId)>,
}

/// Registers users, records sister guarantees and verifies accounts.
#[derive(Debug, Clone)]
pub struct TrustGuaranteeService {
    ctx: Arc<CoreContext>,
}

impl TrustGuaranteeService {
    /// Creates the service.
    #[must_use]
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Registers a user.
    ///
    /// Guarantors travel inside the registration message, so the profile and its
    /// pending guarantee are recorded by one append.
    pub async fn register_user(&self, user: NewUser) -> Result<TxId, CoreError> {
        if user.account_id.is_blank() {
            return Err(CoreError::InvalidInput("account id must not be blank".into()));
        }
        if user.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("name must not be blank".into()));
        }
        if user.phone.trim().is_empty() {
            return Err(CoreError::InvalidInput("phone must not be blank".into()));
        }

        let _guard = self
            .ctx
            .lock(AggregateId::Account(user.account_id.clone()))
            .await;

        let account_id = user.account_id.clone();
        let guarantors = user.guarantors.clone();
        self.ctx
            .state(|state| {
                if state.user(&account_id).is_some() {
                    return Err(CoreError::DuplicateRegistration(account_id.clone()));
                }
                match &guarantors {
                    Some((first, second)) => check_guarantors(state, &account_id, first, second),
                    None => Ok(()),
                }
            })
            .await??;

        let (guarantor1, guarantor2) = user.guarantors.clone().unzip();
        let receipt = self
            .ctx
            .append(MessagePayload::UserRegistration(UserRegistration {
                account_id: user.account_id.clone(),
                name: user.name.trim().to_string(),
                phone_number: user.phone.trim().to_string(),
                guarantor1,
                guarantor2,
            }))
            .await?;

        tracing::info!(account_id = %user.account_id, tx_id = %receipt.tx_id, "User registered");
        Ok(receipt.tx_id)
    }

    /// Records two verified users vouching for a registered one.
    pub async fn submit_guarantee(
        &self,
        new_member: &AccountId,
        guarantor1: &AccountId,
        guarantor2: &AccountId,
    ) -> Result<TxId, CoreError> {
        let _guard = self.ctx.lock(AggregateId::Account(new_member.clone())).await;

        self.ctx
            .state(|state| {
                if state.user(new_member).is_none() {
                    return Err(CoreError::UserNotFound(new_member.clone()));
                }
                check_guarantors(state, new_member, guarantor1, guarantor2)
            })
            .await??;

        let receipt = self
            .ctx
            .append(MessagePayload::SisterGuarantee(SisterGuarantee {
                new_member: new_member.clone(),
                guarantor1: guarantor1.clone(),
                guarantor2: guarantor2.clone(),
                verification_status: GuaranteeStatus::Pending,
            }))
            .await?;

        tracing::info!(account_id = %new_member, tx_id = %receipt.tx_id, "Sister guarantee recorded");
        Ok(receipt.tx_id)
    }

    /// Associates the account with the token ledger and marks it verified.
    ///
    /// Verifying an already verified account returns the earlier transaction id.
    pub async fn verify_user(
        &self,
        account_id: &AccountId,
        verified_by: &str,
    ) -> Result<TxId, CoreError> {
        let _guard = self.ctx.lock(AggregateId::Account(account_id.clone())).await;

        let profile = self
            .ctx
            .state(|state| state.user(account_id).cloned())
            .await?
            .ok_or_else(|| CoreError::UserNotFound(account_id.clone()))?;

        if profile.verified
            && let Some(tx_id) = profile.verification_tx_id
        {
            tracing::debug!(account_id = %account_id, "User already verified");
            return Ok(tx_id);
        }

        self.ctx.tokens.associate(account_id).await?;

        let verifier = if verified_by.trim().is_empty() {
            "system"
        } else {
            verified_by.trim()
        };
        let receipt = self
            .ctx
            .append(MessagePayload::UserVerification(UserVerification {
                account_id: account_id.clone(),
                is_verified: true,
                verified_by: verifier.to_string(),
            }))
            .await?;

        tracing::info!(account_id = %account_id, tx_id = %receipt.tx_id, "User verified");
        Ok(receipt.tx_id)
    }

    /// Profile of a registered user.
    pub async fn get_user(&self, account_id: &AccountId) -> Result<UserProfile, CoreError> {
        self.ctx
            .state(|state| state.user(account_id).cloned())
            .await?
            .ok_or_else(|| CoreError::UserNotFound(account_id.clone()))
    }
}

fn check_guarantors(
    state: &LedgerState,
    new_member: &AccountId,
    first: &AccountId,
    second: &AccountId,
) -> Result<(), CoreError> {
    if first == second {
        return Err(CoreError::InvalidGuarantor(
            "the two guarantors must be different people".into(),
        ));
    }
    if first == new_member || second == new_member {
        return Err(CoreError::InvalidGuarantor(
            "a member cannot guarantee themselves".into(),
        ));
    }
    for guarantor in [first, second] {
        match state.user(guarantor) {
            None => return Err(CoreError::UserNotFound(guarantor.clone())),
            Some(profile) if !profile.verified => {
                return Err(CoreError::GuarantorNotVerified(guarantor.clone()));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
