//! Message log stored in `ledger_messages`.

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    NotSet, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use susu_core::message::{LedgerMessage, SequencedMessage};
use susu_core::ports::{LogError, MessageLog, MessageStream, Receipt};
use susu_shared::types::{SequenceId, TxId};
use uuid::Uuid;

use crate::entities::ledger_messages;

/// Advisory lock held while appending, so commit order matches sequence order.
const APPEND_LOCK_KEY: i64 = 0x5355_5355;

/// Append-only message log in PostgreSQL.
///
/// Sequences come from a `BIGSERIAL` column. A failed insert can leave a gap,
/// which readers tolerate because they always read `>= from`.
#[derive(Debug, Clone)]
pub struct PgMessageLog {
    db: DatabaseConnection,
}

impl PgMessageLog {
    /// Creates a new log over a connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn unavailable(err: DbErr) -> LogError {
    LogError::Unavailable(err.to_string())
}

fn decode(row: ledger_messages::Model) -> Result<SequencedMessage, LogError> {
    let sequence = u64::try_from(row.sequence).map(SequenceId).map_err(|_| LogError::Corrupt {
        sequence: SequenceId::ZERO,
        reason: format!("negative sequence {}", row.sequence),
    })?;
    let message: LedgerMessage =
        serde_json::from_value(row.payload).map_err(|e| LogError::Corrupt {
            sequence,
            reason: e.to_string(),
        })?;
    Ok(SequencedMessage {
        sequence,
        tx_id: TxId::new(row.tx_id),
        message,
    })
}

#[async_trait]
impl MessageLog for PgMessageLog {
    async fn submit(&self, message: &LedgerMessage) -> Result<Receipt, LogError> {
        let payload =
            serde_json::to_value(message).map_err(|e| LogError::Rejected(e.to_string()))?;
        let tx_id = Uuid::now_v7().to_string();

        let txn = self.db.begin().await.map_err(unavailable)?;
        txn.execute_unprepared(&format!("SELECT pg_advisory_xact_lock({APPEND_LOCK_KEY})"))
            .await
            .map_err(unavailable)?;
        let row = ledger_messages::ActiveModel {
            sequence: NotSet,
            tx_id: Set(tx_id.clone()),
            message_type: Set(message.message_type().to_string()),
            payload: Set(payload),
            recorded_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await
        .map_err(unavailable)?;
        txn.commit().await.map_err(unavailable)?;

        let sequence = u64::try_from(row.sequence)
            .map(SequenceId)
            .map_err(|_| LogError::Rejected(format!("negative sequence {}", row.sequence)))?;
        Ok(Receipt {
            sequence,
            tx_id: TxId::new(tx_id),
        })
    }

    async fn read_from(&self, from: SequenceId) -> Result<MessageStream, LogError> {
        let from = i64::try_from(from.0)
            .map_err(|_| LogError::Rejected(format!("sequence {from} out of range")))?;
        let rows = ledger_messages::Entity::find()
            .filter(ledger_messages::Column::Sequence.gte(from))
            .order_by_asc(ledger_messages::Column::Sequence)
            .all(&self.db)
            .await
            .map_err(unavailable)?;

        tracing::trace!(from, rows = rows.len(), "Read message log tail");
        let entries: Vec<_> = rows.into_iter().map(decode).collect();
        Ok(futures::stream::iter(entries).boxed())
    }
}
