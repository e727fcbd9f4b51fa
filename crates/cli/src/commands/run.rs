use crate::executors::{SimulatedClaimer, SimulatedExecutor};
use anyhow::Result;
use chrono::Utc;
use flywheel_core::{ConfigLoader, CycleStateStore, LaunchStatus, PendingLaunch, Store};
use flywheel_data::{Database, MemoryStore, PostgresStore};
use flywheel_engine::{
    EngineServices, LaunchReconciler, StateUpdater, TokenRegistry, TradeRateLimiter,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Runs the cycle engine until Ctrl-C: restores active tokens into
/// schedulers, then keeps the flush, store-sync, and reconciliation tasks
/// running in the background.
pub async fn run_engine(config_path: &str, dry_run: bool) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;

    let (store, state_store): (Arc<dyn Store>, Arc<dyn CycleStateStore>) = if dry_run {
        tracing::info!("dry run: in-memory store, simulated trades");
        let store = Arc::new(seeded_memory_store().await);
        (store.clone(), store)
    } else {
        // No swap backend ships in this binary; trades stay simulated until
        // one is wired in place of SimulatedExecutor below.
        tracing::warn!("no swap backend wired, trades will be logged but not executed");
        let db = Database::connect(&config.database.url, config.database.max_connections).await?;
        let store = Arc::new(PostgresStore::new(db.pool().clone()));
        (store.clone(), store)
    };

    let updater = Arc::new(StateUpdater::new(state_store));
    let services = EngineServices {
        store: store.clone(),
        limiter: Arc::new(TradeRateLimiter::from_config(
            config.engine.global_rate_limit_per_min,
        )),
        updater: updater.clone(),
        executor: Arc::new(SimulatedExecutor),
        claimer: Some(Arc::new(SimulatedClaimer)),
    };

    // Repair orphaned launches first so their tokens restore with everyone
    // else instead of waiting for the next store sync.
    let reconciler = Arc::new(LaunchReconciler::new(store));
    let report = reconciler.reconcile().await?;
    tracing::info!(
        linked = report.linked,
        created = report.created,
        failed = report.failed,
        "startup reconciliation done"
    );

    let registry = Arc::new(TokenRegistry::new(services));
    let restored = registry.restore_from_store().await?;
    tracing::info!(tokens = restored.len(), "token schedulers restored");

    let flush_task = updater.spawn_flush_task(Duration::from_secs(config.engine.flush_interval_secs));
    let sync_task = registry.spawn_sync_task(Duration::from_secs(config.engine.sync_interval_secs));
    let sweep_task =
        reconciler.spawn_sweep_task(Duration::from_secs(config.engine.reconcile_interval_secs));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    sweep_task.abort();
    sync_task.abort();
    flush_task.abort();
    registry.shutdown_all().await?;
    let written = updater.flush().await;
    tracing::info!(written, "final state flush done");
    Ok(())
}

/// One completed, unlinked launch so a dry run exercises the whole pipeline:
/// reconcile, restore, schedule, simulated trades.
async fn seeded_memory_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .add_launch(PendingLaunch {
            id: Uuid::new_v4(),
            status: LaunchStatus::Completed,
            mint: Some("DemoMint1111111111111111111111111111111111".to_string()),
            user_ref: "demo-user".to_string(),
            dev_wallet_address: "DemoDevWallet".to_string(),
            dev_wallet_key_enc: "unused".to_string(),
            ops_wallet_address: "DemoOpsWallet".to_string(),
            ops_wallet_key_enc: "unused".to_string(),
            user_token_id: None,
            created_at: Utc::now(),
        })
        .await;
    store
}
