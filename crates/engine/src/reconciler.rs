//! Links completed launches to their canonical trading records.
//!
//! A launch pipeline can die between confirming a mint on chain and creating
//! the `UserToken` row, leaving a completed launch that no scheduler will ever
//! pick up. The reconciler sweeps those orphans: for each it creates (or
//! finds) the token record, seeds its default config and cycle state, and
//! writes the launch-side back-reference last. Because that link is the
//! terminal write, a crash mid-launch leaves the launch in the sweep set and
//! the next pass finishes the job; the mint-unique insert makes the token
//! creation itself collision-safe.

use anyhow::{Context, Result};
use chrono::Utc;
use flywheel_core::{
    AuditEvent, AuditKind, AuditSink, ConfigStore, CycleState, CycleStateStore, LaunchStore,
    PendingLaunch, Store, TokenConfig, TokenInsert, TokenStore, UserToken,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Outcome counts for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Launches whose back-reference was written this pass.
    pub linked: usize,
    /// Token records created this pass (a linked launch may reuse an
    /// existing token).
    pub created: usize,
    /// Launches skipped after an error; retried next pass.
    pub failed: usize,
}

pub struct LaunchReconciler {
    store: Arc<dyn Store>,
}

impl LaunchReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// One full pass over every launch that needs repair. A failure on one
    /// launch never blocks the rest.
    ///
    /// # Errors
    /// Returns an error only if the sweep query itself fails.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let launches = self
            .store
            .list_unlinked_completed()
            .await
            .context("failed to list launches needing reconciliation")?;
        if launches.is_empty() {
            return Ok(ReconcileReport::default());
        }
        tracing::info!(count = launches.len(), "reconciling completed launches");

        let mut report = ReconcileReport::default();
        for launch in launches {
            let launch_id = launch.id;
            match self.reconcile_one(launch).await {
                Ok(created) => {
                    report.linked += 1;
                    if created {
                        report.created += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(%launch_id, "launch reconciliation failed: {e:#}");
                }
            }
        }
        tracing::info!(
            linked = report.linked,
            created = report.created,
            failed = report.failed,
            "reconciliation pass finished"
        );
        Ok(report)
    }

    /// Repairs a single launch. Returns whether a new token row was created.
    async fn reconcile_one(&self, launch: PendingLaunch) -> Result<bool> {
        let mint = launch
            .mint
            .clone()
            .context("completed launch has no mint")?;

        // An earlier partial pass (or the live launch pipeline) may already
        // have created the token; adopt it instead of failing on the mint.
        if let Some(existing) = self.store.find_by_mint(&mint).await? {
            if existing.user_ref.is_none() {
                self.store
                    .set_user_ref_if_missing(existing.id, &launch.user_ref)
                    .await?;
            }
            self.link(&launch, existing.id).await?;
            return Ok(false);
        }

        let token = UserToken::from_launch(&launch, &mint, Utc::now());
        match self.store.insert_token(&token).await? {
            TokenInsert::Created => {
                self.audit(AuditEvent::new(AuditKind::TokenCreated)
                    .for_launch(launch.id)
                    .for_token(token.id)
                    .for_user(&launch.user_ref))
                    .await;
                self.seed_token(token.id, &mint).await;
                self.link(&launch, token.id).await?;
                Ok(true)
            }
            TokenInsert::AlreadyExists => {
                // Lost the insert race; the winner's row is canonical.
                let winner = self
                    .store
                    .find_by_mint(&mint)
                    .await?
                    .with_context(|| format!("token for mint {mint} vanished after insert race"))?;
                self.link(&launch, winner.id).await?;
                Ok(false)
            }
        }
    }

    /// Seeds the default config and a fresh cycle state for a new token.
    /// Failures are logged, not fatal: the scheduler recreates missing state
    /// and the config upsert is retried by the operator, while the launch
    /// link must still land so the launch leaves the sweep set.
    async fn seed_token(&self, token_id: Uuid, mint: &str) {
        match self.store.insert_config(token_id, &TokenConfig::default()).await {
            Ok(()) => {
                self.audit(AuditEvent::new(AuditKind::ConfigCreated).for_token(token_id))
                    .await;
            }
            Err(e) => tracing::error!(mint, "default config seed failed: {e:#}"),
        }
        match self.store.save_state(&CycleState::new(token_id)).await {
            Ok(()) => {
                self.audit(AuditEvent::new(AuditKind::StateCreated).for_token(token_id))
                    .await;
            }
            Err(e) => tracing::error!(mint, "initial cycle state seed failed: {e:#}"),
        }
    }

    /// The terminal write that removes the launch from the sweep set.
    async fn link(&self, launch: &PendingLaunch, token_id: Uuid) -> Result<()> {
        self.store
            .set_token_link(launch.id, token_id)
            .await
            .context("failed to write launch back-reference")?;
        self.audit(AuditEvent::new(AuditKind::LaunchLinked)
            .for_launch(launch.id)
            .for_token(token_id)
            .for_user(&launch.user_ref))
            .await;
        Ok(())
    }

    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.record(&event).await {
            tracing::debug!(kind = event.kind.as_str(), "audit write failed (ignored): {e:#}");
        }
    }

    /// Spawns the periodic reconciliation sweep.
    #[must_use]
    pub fn spawn_sweep_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = reconciler.reconcile().await {
                    tracing::error!("reconciliation sweep failed: {e:#}");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flywheel_core::{ConfigStore, CycleStateStore, LaunchStatus, Phase, TokenStore};
    use flywheel_data::MemoryStore;

    fn completed_launch(mint: &str, user_ref: &str) -> PendingLaunch {
        PendingLaunch {
            id: Uuid::new_v4(),
            status: LaunchStatus::Completed,
            mint: Some(mint.to_string()),
            user_ref: user_ref.to_string(),
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc-dev".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc-ops".to_string(),
            user_token_id: None,
            created_at: Utc::now(),
        }
    }

    fn reconciler_with_store() -> (Arc<MemoryStore>, LaunchReconciler) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), LaunchReconciler::new(store))
    }

    #[tokio::test]
    async fn each_orphaned_launch_gets_exactly_one_token() {
        let (store, reconciler) = reconciler_with_store();
        for i in 0..3 {
            store.add_launch(completed_launch(&format!("M{i}"), "user-1")).await;
        }

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report, ReconcileReport { linked: 3, created: 3, failed: 0 });
        assert_eq!(store.token_count().await, 3);
        assert_eq!(store.config_count().await, 3);
        assert_eq!(store.state_count().await, 3);
    }

    #[tokio::test]
    async fn second_pass_is_a_no_op() {
        let (store, reconciler) = reconciler_with_store();
        store.add_launch(completed_launch("M1", "user-1")).await;

        reconciler.reconcile().await.unwrap();
        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert_eq!(store.token_count().await, 1);
    }

    #[tokio::test]
    async fn new_token_starts_in_the_buy_phase_with_default_config() {
        let (store, reconciler) = reconciler_with_store();
        let launch = completed_launch("M1", "user-1");
        let launch_id = launch.id;
        store.add_launch(launch).await;

        reconciler.reconcile().await.unwrap();

        let token = store.find_by_mint("M1").await.unwrap().unwrap();
        assert!(token.active);
        assert_eq!(token.user_ref.as_deref(), Some("user-1"));
        assert_eq!(token.dev_wallet_key_enc, "enc-dev");

        let config = store.get_config(token.id).await.unwrap().unwrap();
        assert!(config.cycle_buys >= 1 && config.cycle_sells >= 1);

        let state = store.get_state(token.id).await.unwrap().unwrap();
        assert_eq!(state.phase, Phase::Buy);
        assert_eq!((state.buy_count, state.sell_count), (0, 0));

        let linked = store.get_launch(launch_id).await.unwrap();
        assert_eq!(linked.user_token_id, Some(token.id));
    }

    #[tokio::test]
    async fn existing_token_for_the_mint_is_adopted_not_duplicated() {
        let (store, reconciler) = reconciler_with_store();
        let launch = completed_launch("M1", "user-1");
        let launch_id = launch.id;

        // A row from a partial prior run: token exists but user_ref was
        // never backfilled and the launch link never landed.
        let mut existing = UserToken::from_launch(&launch, "M1", Utc::now());
        existing.user_ref = None;
        let existing_id = existing.id;
        store.add_token(existing).await;
        store.add_launch(launch).await;

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report, ReconcileReport { linked: 1, created: 0, failed: 0 });
        assert_eq!(store.token_count().await, 1);

        let repaired = store.find_by_mint("M1").await.unwrap().unwrap();
        assert_eq!(repaired.id, existing_id);
        assert_eq!(repaired.user_ref.as_deref(), Some("user-1"));
        assert_eq!(
            store.get_launch(launch_id).await.unwrap().user_token_id,
            Some(existing_id)
        );
    }

    #[tokio::test]
    async fn audit_failures_never_block_the_link() {
        let (store, reconciler) = reconciler_with_store();
        let launch = completed_launch("M1", "user-1");
        let launch_id = launch.id;
        store.add_launch(launch).await;
        store.set_fail_audit(true);

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report.linked, 1);
        assert!(store.get_launch(launch_id).await.unwrap().user_token_id.is_some());
        assert!(store.audit_kinds().await.is_empty());
    }

    #[tokio::test]
    async fn state_seed_failure_still_links_the_launch() {
        let (store, reconciler) = reconciler_with_store();
        let launch = completed_launch("M1", "user-1");
        let launch_id = launch.id;
        store.add_launch(launch).await;
        store.set_fail_state_saves(true);

        let report = reconciler.reconcile().await.unwrap();
        assert_eq!(report, ReconcileReport { linked: 1, created: 1, failed: 0 });
        assert!(store.get_launch(launch_id).await.unwrap().user_token_id.is_some());
        assert_eq!(store.state_count().await, 0);
    }

    #[tokio::test]
    async fn successful_pass_leaves_an_audit_trail() {
        let (store, reconciler) = reconciler_with_store();
        store.add_launch(completed_launch("M1", "user-1")).await;

        reconciler.reconcile().await.unwrap();
        let kinds = store.audit_kinds().await;
        assert!(kinds.contains(&AuditKind::TokenCreated));
        assert!(kinds.contains(&AuditKind::ConfigCreated));
        assert!(kinds.contains(&AuditKind::StateCreated));
        assert!(kinds.contains(&AuditKind::LaunchLinked));
    }
}
