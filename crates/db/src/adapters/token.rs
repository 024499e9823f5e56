//! Reward-token ledger stored in `token_accounts`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use susu_core::ports::{TokenError, TokenLedger};
use susu_shared::types::{AccountId, TokenAmount, TxId};
use uuid::Uuid;

use crate::entities::{token_accounts, token_transfers};

/// Reward-token balances in PostgreSQL.
///
/// A row in `token_accounts` is the association; credits to an account
/// without one match no row and fail.
#[derive(Debug, Clone)]
pub struct PgTokenLedger {
    db: DatabaseConnection,
}

impl PgTokenLedger {
    /// Creates a new ledger over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn unavailable(err: DbErr) -> TokenError {
    TokenError::Unavailable(err.to_string())
}

async fn find<C: ConnectionTrait>(
    db: &C,
    account: &AccountId,
) -> Result<Option<token_accounts::Model>, DbErr> {
    token_accounts::Entity::find_by_id(account.as_str().to_owned())
        .one(db)
        .await
}

/// Adds `units` to an associated account. Returns false if there is none.
async fn credit(txn: &DatabaseTransaction, account: &AccountId, units: i64) -> Result<bool, DbErr> {
    let result = token_accounts::Entity::update_many()
        .col_expr(
            token_accounts::Column::Balance,
            Expr::col(token_accounts::Column::Balance).add(units),
        )
        .col_expr(token_accounts::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(token_accounts::Column::AccountId.eq(account.as_str()))
        .exec(txn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn journal(
    txn: &DatabaseTransaction,
    from: Option<&AccountId>,
    to: &AccountId,
    amount: TokenAmount,
    memo: &str,
) -> Result<TxId, DbErr> {
    let id = Uuid::now_v7();
    token_transfers::ActiveModel {
        id: Set(id),
        from_account: Set(from.map(|a| a.as_str().to_owned())),
        to_account: Set(to.as_str().to_owned()),
        amount: Set(amount.units()),
        memo: Set(memo.to_owned()),
        created_at: Set(Utc::now().into()),
    }
    .insert(txn)
    .await?;
    Ok(TxId::new(id.to_string()))
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn associate(&self, account: &AccountId) -> Result<(), TokenError> {
        let now = Utc::now();
        let inserted = token_accounts::Entity::insert(token_accounts::ActiveModel {
            account_id: Set(account.as_str().to_owned()),
            balance: Set(0),
            associated_at: Set(now.into()),
            updated_at: Set(now.into()),
        })
        .on_conflict(
            OnConflict::column(token_accounts::Column::AccountId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await;

        match inserted {
            Ok(rows) => {
                if rows > 0 {
                    tracing::info!(account_id = %account, "Token account associated");
                }
                Ok(())
            }
            Err(DbErr::RecordNotInserted) => Ok(()),
            Err(err) => Err(unavailable(err)),
        }
    }

    async fn is_associated(&self, account: &AccountId) -> Result<bool, TokenError> {
        Ok(find(&self.db, account).await.map_err(unavailable)?.is_some())
    }

    async fn mint(
        &self,
        to: &AccountId,
        amount: TokenAmount,
        memo: &str,
    ) -> Result<TxId, TokenError> {
        if !amount.is_positive() {
            return Err(TokenError::InvalidAmount(amount));
        }

        let txn = self.db.begin().await.map_err(unavailable)?;
        if !credit(&txn, to, amount.units()).await.map_err(unavailable)? {
            txn.rollback().await.map_err(unavailable)?;
            return Err(TokenError::NotAssociated(to.clone()));
        }
        let tx_id = journal(&txn, None, to, amount, memo)
            .await
            .map_err(unavailable)?;
        txn.commit().await.map_err(unavailable)?;

        tracing::debug!(account_id = %to, amount = %amount, memo, tx_id = %tx_id, "Tokens minted");
        Ok(tx_id)
    }

    async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: TokenAmount,
        memo: &str,
    ) -> Result<TxId, TokenError> {
        if !amount.is_positive() {
            return Err(TokenError::InvalidAmount(amount));
        }

        let txn = self.db.begin().await.map_err(unavailable)?;

        let debited = token_accounts::Entity::update_many()
            .col_expr(
                token_accounts::Column::Balance,
                Expr::col(token_accounts::Column::Balance).sub(amount.units()),
            )
            .col_expr(token_accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(token_accounts::Column::AccountId.eq(from.as_str()))
            .filter(token_accounts::Column::Balance.gte(amount.units()))
            .exec(&txn)
            .await
            .map_err(unavailable)?;

        if debited.rows_affected == 0 {
            let source = find(&txn, from).await.map_err(unavailable)?;
            txn.rollback().await.map_err(unavailable)?;
            return Err(match source {
                None => TokenError::NotAssociated(from.clone()),
                Some(row) => TokenError::InsufficientBalance {
                    account: from.clone(),
                    available: TokenAmount::from_units(row.balance),
                    requested: amount,
                },
            });
        }

        if !credit(&txn, to, amount.units()).await.map_err(unavailable)? {
            txn.rollback().await.map_err(unavailable)?;
            return Err(TokenError::NotAssociated(to.clone()));
        }
        let tx_id = journal(&txn, Some(from), to, amount, memo)
            .await
            .map_err(unavailable)?;
        txn.commit().await.map_err(unavailable)?;

        tracing::debug!(from = %from, to = %to, amount = %amount, tx_id = %tx_id, "Tokens transferred");
        Ok(tx_id)
    }

    async fn balance_of(&self, account: &AccountId) -> Result<TokenAmount, TokenError> {
        Ok(find(&self.db, account)
            .await
            .map_err(unavailable)?
            .map_or(TokenAmount::ZERO, |row| TokenAmount::from_units(row.balance)))
    }
}
