//! Postgres implementation of the engine's store traits, composed from the
//! per-table repositories.

use anyhow::Result;
use async_trait::async_trait;
use flywheel_core::{
    AuditEvent, AuditSink, ConfigStore, CycleState, CycleStateStore, LaunchStore, PendingLaunch,
    TokenConfig, TokenInsert, TokenStore, UserToken,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repositories::{
    AuditRepository, CycleStateRepository, LaunchRepository, TokenConfigRepository,
    UserTokenRepository,
};

#[derive(Clone)]
pub struct PostgresStore {
    configs: TokenConfigRepository,
    states: CycleStateRepository,
    launches: LaunchRepository,
    tokens: UserTokenRepository,
    audit: AuditRepository,
}

impl PostgresStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            configs: TokenConfigRepository::new(pool.clone()),
            states: CycleStateRepository::new(pool.clone()),
            launches: LaunchRepository::new(pool.clone()),
            tokens: UserTokenRepository::new(pool.clone()),
            audit: AuditRepository::new(pool),
        }
    }
}

#[async_trait]
impl ConfigStore for PostgresStore {
    async fn get_config(&self, token_id: Uuid) -> Result<Option<TokenConfig>> {
        self.configs.get(token_id).await
    }

    async fn insert_config(&self, token_id: Uuid, config: &TokenConfig) -> Result<()> {
        self.configs.upsert(token_id, config).await
    }
}

#[async_trait]
impl CycleStateStore for PostgresStore {
    async fn get_state(&self, token_id: Uuid) -> Result<Option<CycleState>> {
        self.states.get(token_id).await
    }

    async fn save_state(&self, state: &CycleState) -> Result<()> {
        self.states.upsert(state).await
    }
}

#[async_trait]
impl LaunchStore for PostgresStore {
    async fn list_unlinked_completed(&self) -> Result<Vec<PendingLaunch>> {
        self.launches.list_unlinked_completed().await
    }

    async fn set_token_link(&self, launch_id: Uuid, token_id: Uuid) -> Result<()> {
        self.launches.set_token_link(launch_id, token_id).await
    }
}

#[async_trait]
impl TokenStore for PostgresStore {
    async fn find_by_mint(&self, mint: &str) -> Result<Option<UserToken>> {
        self.tokens.find_by_mint(mint).await
    }

    async fn list_active(&self) -> Result<Vec<UserToken>> {
        self.tokens.list_active().await
    }

    async fn insert_token(&self, token: &UserToken) -> Result<TokenInsert> {
        self.tokens.insert(token).await
    }

    async fn set_user_ref_if_missing(&self, token_id: Uuid, user_ref: &str) -> Result<()> {
        self.tokens.set_user_ref_if_missing(token_id, user_ref).await
    }
}

#[async_trait]
impl AuditSink for PostgresStore {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        self.audit.insert(event).await
    }
}
