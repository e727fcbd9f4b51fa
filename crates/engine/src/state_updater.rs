//! Persistence of cycle-state changes.
//!
//! Two write modes, chosen per token by its config: immediate (persist after
//! every tick) and batched (buffer the latest snapshot and flush on a fixed
//! cadence, or immediately on a phase flip). Batching only reduces write
//! volume; a reader sees state no staler than one flush interval.
//!
//! In-memory actor state is authoritative between flushes. A failed persist
//! leaves the snapshot buffered and is retried on the next flush, so a crash
//! loses at most one flush interval of progress.

use flywheel_core::{CycleState, CycleStateStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct StateUpdater {
    store: Arc<dyn CycleStateStore>,
    pending: Mutex<HashMap<Uuid, CycleState>>,
}

impl StateUpdater {
    #[must_use]
    pub fn new(store: Arc<dyn CycleStateStore>) -> Self {
        Self {
            store,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Records the state resulting from a tick.
    ///
    /// `batch` selects the token's write mode; `flipped` forces a
    /// write-through even in batched mode, so a phase boundary is never only
    /// in memory.
    pub async fn record(&self, state: &CycleState, batch: bool, flipped: bool) {
        self.pending
            .lock()
            .await
            .insert(state.token_id, state.clone());
        if !batch || flipped {
            self.flush_token(state.token_id).await;
        }
    }

    /// Attempts to persist every buffered snapshot. Failures stay buffered.
    ///
    /// Returns the number of snapshots written.
    pub async fn flush(&self) -> usize {
        let snapshot: Vec<CycleState> = self.pending.lock().await.values().cloned().collect();
        let mut written = 0;
        for state in snapshot {
            if self.persist(&state).await {
                written += 1;
            }
        }
        written
    }

    async fn flush_token(&self, token_id: Uuid) {
        let buffered = self.pending.lock().await.get(&token_id).cloned();
        if let Some(state) = buffered {
            self.persist(&state).await;
        }
    }

    /// Persists one snapshot, clearing it from the buffer only if no newer
    /// snapshot arrived while the write was in flight.
    async fn persist(&self, state: &CycleState) -> bool {
        match self.store.save_state(state).await {
            Ok(()) => {
                let mut pending = self.pending.lock().await;
                if pending.get(&state.token_id) == Some(state) {
                    pending.remove(&state.token_id);
                }
                true
            }
            Err(e) => {
                tracing::warn!(
                    token_id = %state.token_id,
                    "cycle state persist failed, will retry from memory: {e:#}"
                );
                false
            }
        }
    }

    /// Number of snapshots waiting for a flush.
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Spawns the periodic flush task for batched tokens.
    #[must_use]
    pub fn spawn_flush_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let updater = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick carries nothing
            loop {
                ticker.tick().await;
                let written = updater.flush().await;
                if written > 0 {
                    tracing::debug!(written, "flushed batched cycle states");
                }
            }
        })
    }
}
