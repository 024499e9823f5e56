//! Native-currency ledger stored in `native_balances`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use susu_core::ports::{PaymentError, PaymentLedger};
use susu_shared::types::{AccountId, Money, TxId};
use uuid::Uuid;

use crate::entities::{native_balances, native_transfers};

/// Native-currency balances in PostgreSQL.
///
/// A transfer is one database transaction: a conditional debit that only
/// matches when the balance covers the amount, an upserted credit and a
/// journal row.
#[derive(Debug, Clone)]
pub struct PgPaymentLedger {
    db: DatabaseConnection,
}

impl PgPaymentLedger {
    /// Creates a new ledger over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Credits an account from outside the system.
    pub async fn deposit(&self, account: &AccountId, amount: Money) -> Result<(), PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidTransfer(format!(
                "deposit must be positive, got {amount}"
            )));
        }
        credit(&self.db, account, amount).await.map_err(unavailable)?;
        tracing::info!(account_id = %account, amount = %amount, "Native deposit");
        Ok(())
    }
}

fn unavailable(err: DbErr) -> PaymentError {
    PaymentError::Unavailable(err.to_string())
}

async fn credit<C: ConnectionTrait>(db: &C, account: &AccountId, amount: Money) -> Result<(), DbErr> {
    let now = Utc::now();
    native_balances::Entity::insert(native_balances::ActiveModel {
        account_id: Set(account.as_str().to_owned()),
        balance: Set(amount.minor_units()),
        updated_at: Set(now.into()),
    })
    .on_conflict(
        OnConflict::column(native_balances::Column::AccountId)
            .value(
                native_balances::Column::Balance,
                Expr::col((native_balances::Entity, native_balances::Column::Balance))
                    .add(amount.minor_units()),
            )
            .value(native_balances::Column::UpdatedAt, Expr::value(now))
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    Ok(())
}

async fn balance<C: ConnectionTrait>(db: &C, account: &AccountId) -> Result<Money, DbErr> {
    Ok(native_balances::Entity::find_by_id(account.as_str().to_owned())
        .one(db)
        .await?
        .map_or(Money::ZERO, |row| Money::new(row.balance)))
}

#[async_trait]
impl PaymentLedger for PgPaymentLedger {
    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Money,
        memo: &str,
    ) -> Result<TxId, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidTransfer(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if from == to {
            return Err(PaymentError::InvalidTransfer(
                "source and destination are the same account".to_string(),
            ));
        }

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(unavailable)?;

        let debited = native_balances::Entity::update_many()
            .col_expr(
                native_balances::Column::Balance,
                Expr::col(native_balances::Column::Balance).sub(amount.minor_units()),
            )
            .col_expr(native_balances::Column::UpdatedAt, Expr::value(now))
            .filter(native_balances::Column::AccountId.eq(from.as_str()))
            .filter(native_balances::Column::Balance.gte(amount.minor_units()))
            .exec(&txn)
            .await
            .map_err(unavailable)?;

        if debited.rows_affected == 0 {
            let available = balance(&txn, from).await.map_err(unavailable)?;
            txn.rollback().await.map_err(unavailable)?;
            return Err(PaymentError::InsufficientFunds {
                account: from.clone(),
                available,
                requested: amount,
            });
        }

        credit(&txn, to, amount).await.map_err(unavailable)?;

        let id = Uuid::now_v7();
        native_transfers::ActiveModel {
            id: Set(id),
            from_account: Set(from.as_str().to_owned()),
            to_account: Set(to.as_str().to_owned()),
            amount: Set(amount.minor_units()),
            memo: Set(memo.to_owned()),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(unavailable)?;

        txn.commit().await.map_err(unavailable)?;

        tracing::debug!(
            from = %from,
            to = %to,
            amount = %amount,
            memo,
            tx_id = %id,
            "Native transfer committed"
        );
        Ok(TxId::new(id.to_string()))
    }

    async fn balance_of(&self, account: &AccountId) -> Result<Money, PaymentError> {
        balance(&self.db, account).await.map_err(unavailable)
    }
}
