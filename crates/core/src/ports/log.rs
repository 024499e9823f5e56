//! Ordered append-only message log.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use susu_shared::types::{SequenceId, TxId};
use thiserror::Error;

use crate::message::{LedgerMessage, SequencedMessage};

/// Stream of messages in sequence order.
pub type MessageStream = BoxStream<'static, Result<SequencedMessage, LogError>>;

/// Acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Position assigned to the message.
    pub sequence: SequenceId,
    /// Transaction id assigned to the message.
    pub tx_id: TxId,
}

/// Errors raised by a message log.
#[derive(Debug, Clone, Error)]
pub enum LogError {
    /// The log could not be reached.
    #[error("Message log unavailable: {0}")]
    Unavailable(String),

    /// The log refused the message.
    #[error("Message rejected by log: {0}")]
    Rejected(String),

    /// A stored message could not be decoded.
    #[error("Message {sequence} is corrupt: {reason}")]
    Corrupt {
        /// Position of the bad message.
        sequence: SequenceId,
        /// Decoder error.
        reason: String,
    },
}

/// Append-only, strictly ordered, immutable sequence of messages.
///
/// Sequence ids start at 1 and increase by one per accepted message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Appends a message and returns its position.
    async fn submit(&self, message: &LedgerMessage) -> Result<Receipt, LogError>;

    /// Streams every message at or after `from`, in order.
    async fn read_from(&self, from: SequenceId) -> Result<MessageStream, LogError>;
}
