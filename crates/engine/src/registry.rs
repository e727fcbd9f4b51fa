use crate::commands::TokenStatus;
use crate::handle::TokenHandle;
use crate::rate_limiter::TradeRateLimiter;
use crate::state_updater::StateUpdater;
use crate::token_actor::TokenActor;
use anyhow::{Context, Result};
use flywheel_core::{
    ConfigStore, CycleState, CycleStateStore, FeeClaimer, Store, TokenConfig, TokenStore,
    TradeExecutor, UserToken,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Shared collaborators handed to every token actor. The limiter and the
/// updater are the only cross-token contention points.
#[derive(Clone)]
pub struct EngineServices {
    pub store: Arc<dyn Store>,
    pub limiter: Arc<TradeRateLimiter>,
    pub updater: Arc<StateUpdater>,
    pub executor: Arc<dyn TradeExecutor>,
    pub claimer: Option<Arc<dyn FeeClaimer>>,
}

struct TokenEntry {
    handle: TokenHandle,
    task: JoinHandle<()>,
}

/// Owns one actor task per active token.
pub struct TokenRegistry {
    tokens: Arc<RwLock<HashMap<Uuid, TokenEntry>>>,
    services: EngineServices,
}

impl TokenRegistry {
    #[must_use]
    pub fn new(services: EngineServices) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            services,
        }
    }

    /// Spawns an actor for a token. The config is validated first; the cycle
    /// state is loaded from the store or freshly created for a new token.
    ///
    /// # Errors
    /// Returns an error if the config is invalid for scheduling.
    pub async fn spawn_token(&self, token: UserToken, config: TokenConfig) -> Result<TokenHandle> {
        let warnings = config
            .validate()
            .with_context(|| format!("refusing to schedule token {}", token.mint))?;
        for warning in &warnings {
            tracing::warn!(mint = %token.mint, ?warning, "config warning");
        }

        let state = match self.services.store.get_state(token.id).await {
            Ok(Some(state)) => state,
            Ok(None) => {
                let state = CycleState::new(token.id);
                if let Err(e) = self.services.store.save_state(&state).await {
                    tracing::warn!(
                        mint = %token.mint,
                        "initial cycle state persist failed, continuing from memory: {e:#}"
                    );
                }
                state
            }
            Err(e) => {
                tracing::warn!(
                    mint = %token.mint,
                    "cycle state load failed, starting fresh: {e:#}"
                );
                CycleState::new(token.id)
            }
        };

        let (tx, rx) = mpsc::channel(32);
        let (status_tx, status_rx) =
            watch::channel(TokenStatus::snapshot(&token, &state, false));
        let handle = TokenHandle::new(tx, status_rx);

        let token_id = token.id;
        let mint = token.mint.clone();
        let actor = TokenActor::new(token, config, state, rx, status_tx, self.services.clone());
        let task = tokio::spawn(async move {
            if let Err(e) = actor.run().await {
                tracing::error!(%mint, "token actor failed: {e:#}");
            }
        });

        self.tokens.write().await.insert(
            token_id,
            TokenEntry {
                handle: handle.clone(),
                task,
            },
        );
        Ok(handle)
    }

    /// Gets a handle to a scheduled token.
    pub async fn get_token(&self, token_id: Uuid) -> Option<TokenHandle> {
        self.tokens
            .read()
            .await
            .get(&token_id)
            .map(|entry| entry.handle.clone())
    }

    /// Lists the token ids currently scheduled.
    pub async fn list_tokens(&self) -> Vec<Uuid> {
        self.tokens.read().await.keys().copied().collect()
    }

    /// Removes a token, shuts its actor down, and waits for the actor to
    /// finish so its final state persist has happened on return.
    ///
    /// # Errors
    /// Never fails today; kept fallible for parity with the other lifecycle
    /// operations.
    pub async fn remove_token(&self, token_id: Uuid) -> Result<()> {
        let entry = self.tokens.write().await.remove(&token_id);
        if let Some(entry) = entry {
            Self::stop_entry(entry).await;
        }
        Ok(())
    }

    /// Shuts down all actors, waiting for each to exit. On return every
    /// actor has force-persisted its final state.
    ///
    /// # Errors
    /// Never fails today; kept fallible for parity with the other lifecycle
    /// operations.
    pub async fn shutdown_all(&self) -> Result<()> {
        let entries: Vec<TokenEntry> = {
            let mut tokens = self.tokens.write().await;
            tokens.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            Self::stop_entry(entry).await;
        }
        Ok(())
    }

    /// Delivers `Shutdown` and reaps the actor task. A closed command
    /// channel means the actor already exited; the join still runs so the
    /// final persist is not raced.
    async fn stop_entry(entry: TokenEntry) {
        let _ = entry.handle.shutdown().await;
        if let Err(e) = entry.task.await {
            tracing::error!("token actor task join failed: {e}");
        }
    }

    /// Spawns and starts an actor for every active token in the store.
    /// Tokens with a missing or invalid config are skipped, not fatal.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn restore_from_store(&self) -> Result<Vec<Uuid>> {
        let active = self
            .services
            .store
            .list_active()
            .await
            .context("failed to list active tokens")?;

        let mut restored = Vec::new();
        for token in active {
            match self.activate(token).await {
                Ok(token_id) => restored.push(token_id),
                Err(e) => tracing::error!("failed to restore token: {e:#}"),
            }
        }
        Ok(restored)
    }

    /// Reconciles the running actor set with the store: starts actors for
    /// newly active tokens (e.g. created by the launch reconciler) and stops
    /// actors whose token is gone or inactive.
    ///
    /// Returns `(started, stopped)` token ids.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn sync_with_store(&self) -> Result<(Vec<Uuid>, Vec<Uuid>)> {
        let active = self
            .services
            .store
            .list_active()
            .await
            .context("failed to list active tokens")?;
        let active_ids: std::collections::HashSet<Uuid> = active.iter().map(|t| t.id).collect();
        let running: Vec<Uuid> = self.list_tokens().await;

        let mut started = Vec::new();
        for token in active {
            if running.contains(&token.id) {
                continue;
            }
            let mint = token.mint.clone();
            match self.activate(token).await {
                Ok(token_id) => {
                    tracing::info!(%mint, "picked up newly active token");
                    started.push(token_id);
                }
                Err(e) => tracing::error!(%mint, "failed to activate token: {e:#}"),
            }
        }

        let mut stopped = Vec::new();
        for token_id in running {
            if !active_ids.contains(&token_id) {
                match self.remove_token(token_id).await {
                    Ok(()) => {
                        tracing::info!(%token_id, "stopped inactive token");
                        stopped.push(token_id);
                    }
                    Err(e) => tracing::error!(%token_id, "failed to stop token: {e:#}"),
                }
            }
        }

        Ok((started, stopped))
    }

    /// Spawns the periodic store re-scan task.
    #[must_use]
    pub fn spawn_sync_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = registry.sync_with_store().await {
                    tracing::error!("registry sync failed: {e:#}");
                }
            }
        })
    }

    async fn activate(&self, token: UserToken) -> Result<Uuid> {
        let token_id = token.id;
        let config = self
            .services
            .store
            .get_config(token_id)
            .await?
            .with_context(|| format!("token {} has no config", token.mint))?;
        let handle = self.spawn_token(token, config).await?;
        handle.start().await?;
        Ok(token_id)
    }
}
