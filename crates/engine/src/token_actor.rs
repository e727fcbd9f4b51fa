use crate::commands::{TokenCommand, TokenStatus};
use crate::registry::EngineServices;
use crate::tick::{apply_flip, apply_rate_limited, apply_trade_result, plan_tick, TickPlan,
    TradeResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use flywheel_core::{AuditEvent, AuditKind, AuditSink, CycleState, Phase, TokenConfig,
    TradeExecutor, TradeOutcome, UserToken};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// One independent scheduling task per token. Owning the cycle state in a
/// single task serializes that token's ticks; a stuck trade call for one
/// token never delays another.
pub struct TokenActor {
    token: UserToken,
    config: TokenConfig,
    state: CycleState,
    rx: mpsc::Receiver<TokenCommand>,
    status_tx: watch::Sender<TokenStatus>,
    services: EngineServices,
    running: bool,
}

impl TokenActor {
    #[must_use]
    pub fn new(
        token: UserToken,
        config: TokenConfig,
        state: CycleState,
        rx: mpsc::Receiver<TokenCommand>,
        status_tx: watch::Sender<TokenStatus>,
        services: EngineServices,
    ) -> Self {
        Self {
            token,
            config,
            state,
            rx,
            status_tx,
            services,
            running: false,
        }
    }

    /// Runs the actor loop: commands interleaved with interval-driven ticks.
    ///
    /// # Errors
    /// Never fails today; the `Result` keeps the spawn site uniform with the
    /// rest of the engine tasks.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(mint = %self.token.mint, "token actor started");
        let mut ticker = self.make_ticker();

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match cmd {
                        TokenCommand::Start => {
                            if self.running {
                                tracing::warn!(mint = %self.token.mint, "already running, start ignored");
                            } else {
                                self.running = true;
                                ticker = self.make_ticker();
                                tracing::info!(mint = %self.token.mint, "cycle scheduling started");
                            }
                        }
                        TokenCommand::Stop => {
                            self.running = false;
                            tracing::info!(mint = %self.token.mint, "cycle scheduling stopped");
                        }
                        TokenCommand::UpdateConfig(new_config) => {
                            self.apply_config_update(*new_config);
                            ticker = self.make_ticker();
                        }
                        TokenCommand::GetStatus(tx) => {
                            let _ = tx.send(self.status());
                        }
                        TokenCommand::Shutdown => break,
                    }
                    self.publish_status();
                }
                _ = ticker.tick(), if self.running => {
                    self.tick(Utc::now()).await;
                    self.publish_status();
                }
            }
        }

        // Force-persist the final in-memory state regardless of write mode.
        self.services.updater.record(&self.state, false, false).await;
        tracing::info!(mint = %self.token.mint, "token actor shut down");
        Ok(())
    }

    fn make_ticker(&self) -> tokio::time::Interval {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker
    }

    /// Replaces the config after re-validating. Invalid updates are rejected
    /// here too, even though the write path already validates, so a bad row
    /// can never steer the scheduler.
    fn apply_config_update(&mut self, new_config: TokenConfig) {
        match new_config.validate() {
            Ok(warnings) => {
                for warning in &warnings {
                    tracing::warn!(mint = %self.token.mint, ?warning, "config warning");
                }
                self.config = new_config;
                tracing::info!(mint = %self.token.mint, "config updated");
            }
            Err(e) => {
                tracing::error!(mint = %self.token.mint, "rejected config update: {e}");
            }
        }
    }

    /// One scheduling decision for this token. At most one trade attempt.
    async fn tick(&mut self, now: DateTime<Utc>) {
        match plan_tick(&self.state, &self.config, now) {
            TickPlan::NotDue => {}
            TickPlan::Flip => {
                apply_flip(&mut self.state, now);
                tracing::debug!(
                    mint = %self.token.mint,
                    phase = self.state.phase.as_str(),
                    "cycle phase flipped"
                );
                self.services
                    .updater
                    .record(&self.state, self.config.batch_state_updates, true)
                    .await;
            }
            TickPlan::Trade(phase) => {
                if !self.services.limiter.try_acquire() {
                    tracing::debug!(
                        mint = %self.token.mint,
                        share = self.config.rate_limit_share,
                        "trade attempt rate limited"
                    );
                    apply_rate_limited(&mut self.state, now);
                    self.services
                        .updater
                        .record(&self.state, self.config.batch_state_updates, false)
                        .await;
                    return;
                }

                let result = run_trade(
                    self.services.executor.as_ref(),
                    &self.token.mint,
                    phase,
                    Duration::from_secs(self.config.confirmation_timeout_secs),
                )
                .await;
                let traded = result == TradeResult::Filled;
                apply_trade_result(&mut self.state, result, now);
                self.services
                    .updater
                    .record(&self.state, self.config.batch_state_updates, false)
                    .await;

                if traded {
                    self.maybe_claim().await;
                }
            }
        }
    }

    /// Triggers a fee claim when the ops wallet crossed the configured
    /// threshold. Purely a trigger: failures are logged and never touch the
    /// cycle state.
    async fn maybe_claim(&self) {
        if !self.config.auto_claim {
            return;
        }
        let Some(claimer) = &self.services.claimer else {
            return;
        };
        let balance = match claimer.ops_balance(&self.token.mint).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(mint = %self.token.mint, "ops balance check failed: {e:#}");
                return;
            }
        };
        if balance < self.config.auto_claim_threshold {
            return;
        }
        match claimer.claim_fees(&self.token.mint).await {
            Ok(()) => {
                tracing::info!(mint = %self.token.mint, %balance, "fee claim triggered");
                let event = AuditEvent::new(AuditKind::ClaimTriggered).for_token(self.token.id);
                if let Err(e) = self.services.store.record(&event).await {
                    tracing::debug!(mint = %self.token.mint, "audit write failed (ignored): {e:#}");
                }
            }
            Err(e) => {
                tracing::warn!(mint = %self.token.mint, "fee claim failed: {e:#}");
            }
        }
    }

    fn status(&self) -> TokenStatus {
        TokenStatus::snapshot(&self.token, &self.state, self.running)
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(self.status());
    }
}

/// Runs one trade bounded by the confirmation timeout and condenses the
/// outcome. On timeout the executor future is dropped; a completion that
/// lands after the deadline is discarded rather than double-applied.
pub(crate) async fn run_trade(
    executor: &dyn TradeExecutor,
    mint: &str,
    phase: Phase,
    timeout: Duration,
) -> TradeResult {
    match tokio::time::timeout(timeout, executor.execute_trade(mint, phase)).await {
        Ok(Ok(TradeOutcome::Filled)) => TradeResult::Filled,
        Ok(Ok(TradeOutcome::InsufficientFunds)) => {
            tracing::debug!(mint, "trade skipped: insufficient funds");
            TradeResult::InsufficientFunds
        }
        Ok(Ok(TradeOutcome::ChainError(reason))) => {
            tracing::warn!(mint, %reason, "trade failed on chain");
            TradeResult::Failed
        }
        Ok(Err(e)) => {
            tracing::error!(mint, "trade executor error: {e:#}");
            TradeResult::Failed
        }
        Err(_elapsed) => {
            tracing::warn!(mint, ?timeout, "trade confirmation timed out");
            TradeResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::TradeRateLimiter;
    use crate::state_updater::StateUpdater;
    use async_trait::async_trait;
    use flywheel_core::CycleStateStore;
    use flywheel_data::MemoryStore;
    use nonzero_ext::nonzero;
    use std::sync::Arc;
    use uuid::Uuid;

    struct FixedExecutor(TradeOutcome);

    #[async_trait]
    impl TradeExecutor for FixedExecutor {
        async fn execute_trade(&self, _mint: &str, _phase: Phase) -> Result<TradeOutcome> {
            Ok(self.0.clone())
        }
    }

    struct StalledExecutor;

    #[async_trait]
    impl TradeExecutor for StalledExecutor {
        async fn execute_trade(&self, _mint: &str, _phase: Phase) -> Result<TradeOutcome> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(TradeOutcome::Filled)
        }
    }

    fn token(mint: &str) -> UserToken {
        UserToken {
            id: Uuid::new_v4(),
            mint: mint.to_string(),
            user_ref: Some("user-1".to_string()),
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc".to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn services(executor: Arc<dyn TradeExecutor>, cap: u32) -> EngineServices {
        let store = Arc::new(MemoryStore::new());
        EngineServices {
            store: store.clone(),
            limiter: Arc::new(TradeRateLimiter::from_config(cap)),
            updater: Arc::new(StateUpdater::new(store)),
            executor,
            claimer: None,
        }
    }

    // Tests drive `tick` directly, so the command channel is never used.
    fn actor_for_test(services: EngineServices) -> TokenActor {
        let token = token("MINT");
        let state = CycleState::new(token.id);
        let (_tx, rx) = mpsc::channel(8);
        let (status_tx, _) = watch::channel(TokenStatus::snapshot(&token, &state, false));
        TokenActor::new(token, TokenConfig::default(), state, rx, status_tx, services)
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_trade_maps_to_failed() {
        let executor = StalledExecutor;
        let result = run_trade(&executor, "MINT", Phase::Buy, Duration::from_secs(30)).await;
        assert_eq!(result, TradeResult::Failed);
    }

    #[tokio::test]
    async fn executor_outcomes_condense_as_expected() {
        let filled = FixedExecutor(TradeOutcome::Filled);
        let broke = FixedExecutor(TradeOutcome::InsufficientFunds);
        let chain = FixedExecutor(TradeOutcome::ChainError("congestion".to_string()));
        let timeout = Duration::from_secs(5);

        assert_eq!(
            run_trade(&filled, "M", Phase::Buy, timeout).await,
            TradeResult::Filled
        );
        assert_eq!(
            run_trade(&broke, "M", Phase::Sell, timeout).await,
            TradeResult::InsufficientFunds
        );
        assert_eq!(
            run_trade(&chain, "M", Phase::Buy, timeout).await,
            TradeResult::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_tick_leaves_counters_and_next_tick_trades() {
        let services = services(Arc::new(StalledExecutor), 100);
        let mut actor = actor_for_test(services);

        actor.tick(Utc::now()).await;
        assert_eq!(actor.state.buy_count, 0);
        assert_eq!(actor.state.last_check_result, Some(flywheel_core::CheckResult::Error));
        assert!(actor.state.last_trade_at.is_none());

        // Nothing crashed; the next tick plans a trade again.
        assert_eq!(
            plan_tick(&actor.state, &actor.config, Utc::now()),
            TickPlan::Trade(Phase::Buy)
        );
    }

    #[tokio::test]
    async fn successful_tick_advances_counter_and_persists() {
        let services = services(Arc::new(FixedExecutor(TradeOutcome::Filled)), 100);
        let store = services.store.clone();
        let mut actor = actor_for_test(services);
        let token_id = actor.token.id;

        actor.tick(Utc::now()).await;
        assert_eq!(actor.state.buy_count, 1);
        assert_eq!(actor.state.last_check_result, Some(flywheel_core::CheckResult::Traded));

        let persisted = store.get_state(token_id).await.unwrap().unwrap();
        assert_eq!(persisted.buy_count, 1);
    }

    #[tokio::test]
    async fn denied_capacity_records_rate_limited_without_executor_contact() {
        let services = services(Arc::new(FixedExecutor(TradeOutcome::Filled)), 1);
        assert!(services.limiter.try_acquire()); // drain the bucket
        let mut actor = actor_for_test(services);

        actor.tick(Utc::now()).await;
        assert_eq!(
            actor.state.last_check_result,
            Some(flywheel_core::CheckResult::RateLimited)
        );
        assert_eq!(actor.state.buy_count, 0);
    }

    #[tokio::test]
    async fn each_due_token_spends_one_unit_of_the_global_cap() {
        // Cap of 5, six due tokens, default non-trivial share: exactly five
        // trade and one reports rate_limited. The share never multiplies the
        // capacity a single attempt consumes.
        let services = services(Arc::new(FixedExecutor(TradeOutcome::Filled)), 5);
        let mut actors: Vec<TokenActor> =
            (0..6).map(|_| actor_for_test(services.clone())).collect();
        assert!(actors.iter().all(|a| a.config.rate_limit_share > 1));

        let mut traded = 0;
        let mut limited = 0;
        for actor in &mut actors {
            actor.tick(Utc::now()).await;
            match actor.state.last_check_result {
                Some(flywheel_core::CheckResult::Traded) => traded += 1,
                Some(flywheel_core::CheckResult::RateLimited) => limited += 1,
                other => panic!("unexpected check result {other:?}"),
            }
        }
        assert_eq!((traded, limited), (5, 1));
    }
}
