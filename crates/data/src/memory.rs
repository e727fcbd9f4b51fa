//! In-memory store implementation.
//!
//! Backs engine unit tests and the CLI's dry-run mode with the same trait
//! surface as [`crate::PostgresStore`], without a database.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use flywheel_core::{
    AuditEvent, AuditSink, ConfigStore, CycleState, CycleStateStore, LaunchStore, PendingLaunch,
    TokenConfig, TokenInsert, TokenStore, UserToken,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    configs: HashMap<Uuid, TokenConfig>,
    states: HashMap<Uuid, CycleState>,
    launches: HashMap<Uuid, PendingLaunch>,
    tokens: Vec<UserToken>,
    audits: Vec<AuditEvent>,
}

/// Thread-safe in-memory implementation of all store traits.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_state_saves: AtomicBool,
    fail_audit: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `save_state` calls fail, to exercise the retry path.
    pub fn set_fail_state_saves(&self, fail: bool) {
        self.fail_state_saves.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent audit writes fail, to verify they stay best-effort.
    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    pub async fn add_launch(&self, launch: PendingLaunch) {
        self.inner.lock().await.launches.insert(launch.id, launch);
    }

    pub async fn add_token(&self, token: UserToken) {
        self.inner.lock().await.tokens.push(token);
    }

    pub async fn get_launch(&self, launch_id: Uuid) -> Option<PendingLaunch> {
        self.inner.lock().await.launches.get(&launch_id).cloned()
    }

    pub async fn token_count(&self) -> usize {
        self.inner.lock().await.tokens.len()
    }

    pub async fn config_count(&self) -> usize {
        self.inner.lock().await.configs.len()
    }

    pub async fn state_count(&self) -> usize {
        self.inner.lock().await.states.len()
    }

    pub async fn audit_kinds(&self) -> Vec<flywheel_core::AuditKind> {
        self.inner.lock().await.audits.iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_config(&self, token_id: Uuid) -> Result<Option<TokenConfig>> {
        Ok(self.inner.lock().await.configs.get(&token_id).cloned())
    }

    async fn insert_config(&self, token_id: Uuid, config: &TokenConfig) -> Result<()> {
        self.inner
            .lock()
            .await
            .configs
            .insert(token_id, config.clone());
        Ok(())
    }
}

#[async_trait]
impl CycleStateStore for MemoryStore {
    async fn get_state(&self, token_id: Uuid) -> Result<Option<CycleState>> {
        Ok(self.inner.lock().await.states.get(&token_id).cloned())
    }

    async fn save_state(&self, state: &CycleState) -> Result<()> {
        if self.fail_state_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("state save failure injected"));
        }
        self.inner
            .lock()
            .await
            .states
            .insert(state.token_id, state.clone());
        Ok(())
    }
}

#[async_trait]
impl LaunchStore for MemoryStore {
    async fn list_unlinked_completed(&self) -> Result<Vec<PendingLaunch>> {
        let inner = self.inner.lock().await;
        let mut launches: Vec<PendingLaunch> = inner
            .launches
            .values()
            .filter(|l| l.needs_reconciliation())
            .cloned()
            .collect();
        launches.sort_by_key(|l| l.created_at);
        Ok(launches)
    }

    async fn set_token_link(&self, launch_id: Uuid, token_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let launch = inner
            .launches
            .get_mut(&launch_id)
            .ok_or_else(|| anyhow!("unknown launch {launch_id}"))?;
        launch.user_token_id = Some(token_id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn find_by_mint(&self, mint: &str) -> Result<Option<UserToken>> {
        Ok(self
            .inner
            .lock()
            .await
            .tokens
            .iter()
            .find(|t| t.mint == mint)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<UserToken>> {
        Ok(self
            .inner
            .lock()
            .await
            .tokens
            .iter()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }

    async fn insert_token(&self, token: &UserToken) -> Result<TokenInsert> {
        let mut inner = self.inner.lock().await;
        if inner.tokens.iter().any(|t| t.mint == token.mint) {
            return Ok(TokenInsert::AlreadyExists);
        }
        inner.tokens.push(token.clone());
        Ok(TokenInsert::Created)
    }

    async fn set_user_ref_if_missing(&self, token_id: Uuid, user_ref: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(token) = inner.tokens.iter_mut().find(|t| t.id == token_id) {
            if token.user_ref.is_none() {
                token.user_ref = Some(user_ref.to_string());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(anyhow!("audit write failure injected"));
        }
        self.inner.lock().await.audits.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flywheel_core::LaunchStatus;

    fn completed_launch(mint: &str) -> PendingLaunch {
        PendingLaunch {
            id: Uuid::new_v4(),
            status: LaunchStatus::Completed,
            mint: Some(mint.to_string()),
            user_ref: "user-1".to_string(),
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc".to_string(),
            user_token_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_mint_insert_reports_already_exists() {
        let store = MemoryStore::new();
        let launch = completed_launch("M1");
        let token = UserToken::from_launch(&launch, "M1", Utc::now());
        assert_eq!(store.insert_token(&token).await.unwrap(), TokenInsert::Created);

        let rival = UserToken::from_launch(&launch, "M1", Utc::now());
        assert_eq!(
            store.insert_token(&rival).await.unwrap(),
            TokenInsert::AlreadyExists
        );
        assert_eq!(store.token_count().await, 1);
    }

    #[tokio::test]
    async fn unlinked_listing_excludes_linked_launches() {
        let store = MemoryStore::new();
        let launch = completed_launch("M1");
        let id = launch.id;
        store.add_launch(launch).await;
        assert_eq!(store.list_unlinked_completed().await.unwrap().len(), 1);

        store.set_token_link(id, Uuid::new_v4()).await.unwrap();
        assert!(store.list_unlinked_completed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_ref_backfill_leaves_existing_value() {
        let store = MemoryStore::new();
        let launch = completed_launch("M1");
        let token = UserToken::from_launch(&launch, "M1", Utc::now());
        let id = token.id;
        store.add_token(token).await;

        store.set_user_ref_if_missing(id, "someone-else").await.unwrap();
        let stored = store.find_by_mint("M1").await.unwrap().unwrap();
        assert_eq!(stored.user_ref.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn injected_save_failure_surfaces_as_error() {
        let store = MemoryStore::new();
        store.set_fail_state_saves(true);
        let state = CycleState::new(Uuid::new_v4());
        assert!(store.save_state(&state).await.is_err());

        store.set_fail_state_saves(false);
        assert!(store.save_state(&state).await.is_ok());
    }
}
