//! Cached projection kept in step with the message log.

use futures::TryStreamExt;
use std::sync::Arc;
use susu_shared::VotePolicy;
use susu_shared::types::SequenceId;
use tokio::sync::RwLock;

use crate::ports::{LogError, MessageLog};
use crate::projection::state::LedgerState;

/// A [`LedgerState`] that catches up with the log before every read.
pub struct ProjectionStore {
    log: Arc<dyn MessageLog>,
    vote_policy: VotePolicy,
    state: RwLock<LedgerState>,
}

impl std::fmt::Debug for ProjectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionStore")
            .field("vote_policy", &self.vote_policy)
            .finish_non_exhaustive()
    }
}

impl ProjectionStore {
    /// Creates an empty projection over `log`.
    #[must_use]
    pub fn new(log: Arc<dyn MessageLog>, vote_policy: VotePolicy) -> Self {
        Self {
            log,
            vote_policy,
            state: RwLock::new(LedgerState::new(vote_policy)),
        }
    }

    async fn fold_tail(log: &dyn MessageLog, state: &mut LedgerState) -> Result<u64, LogError> {
        let mut stream = log.read_from(state.last_sequence.next()).await?;
        let mut applied = 0_u64;
        while let Some(entry) = stream.try_next().await? {
            state.apply(&entry);
            applied += 1;
        }
        Ok(applied)
    }

    /// Folds every message appended since the last catch-up.
    pub async fn catch_up(&self) -> Result<SequenceId, LogError> {
        let mut state = self.state.write().await;
        let applied = Self::fold_tail(self.log.as_ref(), &mut state).await?;
        if applied > 0 {
            tracing::trace!(applied, sequence = %state.last_sequence, "Projection caught up");
        }
        Ok(state.last_sequence)
    }

    /// Catches up, then runs `f` on the state.
    pub async fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> Result<R, LogError> {
        self.catch_up().await?;
        let state = self.state.read().await;
        Ok(f(&state))
    }

    /// A copy of the caught-up state.
    pub async fn snapshot(&self) -> Result<LedgerState, LogError> {
        self.read(LedgerState::clone).await
    }

    /// Discards the cache and folds the whole log again.
    pub async fn rebuild(&self) -> Result<SequenceId, LogError> {
        let mut fresh = LedgerState::new(self.vote_policy);
        Self::fold_tail(self.log.as_ref(), &mut fresh).await?;

        let mut state = self.state.write().await;
        Self::fold_tail(self.log.as_ref(), &mut fresh).await?;
        *state = fresh;
        tracing::info!(sequence = %state.last_sequence, "Projection rebuilt from the log");
        Ok(state.last_sequence)
    }
}
