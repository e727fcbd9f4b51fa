use anyhow::Result;
use flywheel_core::ConfigLoader;
use flywheel_data::{Database, PostgresStore};
use flywheel_engine::LaunchReconciler;
use std::sync::Arc;

/// Runs a single reconciliation pass against the configured database and
/// prints the outcome counts.
pub async fn run_reconcile(config_path: &str) -> Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    let db = Database::connect(&config.database.url, config.database.max_connections).await?;
    let store = Arc::new(PostgresStore::new(db.pool().clone()));

    let report = LaunchReconciler::new(store).reconcile().await?;
    println!(
        "{}",
        serde_json::json!({
            "linked": report.linked,
            "created": report.created,
            "failed": report.failed,
        })
    );

    if report.failed > 0 {
        anyhow::bail!("{} launches failed to reconcile", report.failed);
    }
    Ok(())
}
