use crate::launch::{AuditEvent, PendingLaunch, UserToken};
use crate::token::{CycleState, Phase, TokenConfig};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Result of a single swap attempt as reported by the external executor.
/// The confirmation timeout is applied by the caller, not the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeOutcome {
    Filled,
    InsufficientFunds,
    ChainError(String),
}

/// External collaborator performing the actual DEX swap.
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    async fn execute_trade(&self, mint: &str, phase: Phase) -> Result<TradeOutcome>;
}

/// External collaborator settling accumulated fees. The engine only decides
/// *when* to invoke it.
#[async_trait]
pub trait FeeClaimer: Send + Sync {
    async fn ops_balance(&self, mint: &str) -> Result<Decimal>;
    async fn claim_fees(&self, mint: &str) -> Result<()>;
}

/// Read access to per-token trading parameters. The engine never mutates
/// configs except when the reconciler creates the initial row for a new token.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_config(&self, token_id: Uuid) -> Result<Option<TokenConfig>>;
    async fn insert_config(&self, token_id: Uuid, config: &TokenConfig) -> Result<()>;
}

/// Durable home of per-token cycle records. `save` upserts; in-memory actor
/// state is authoritative between saves.
#[async_trait]
pub trait CycleStateStore: Send + Sync {
    async fn get_state(&self, token_id: Uuid) -> Result<Option<CycleState>>;
    async fn save_state(&self, state: &CycleState) -> Result<()>;
}

#[async_trait]
pub trait LaunchStore: Send + Sync {
    /// Launches with status `completed`, a mint address, and no linked token.
    async fn list_unlinked_completed(&self) -> Result<Vec<PendingLaunch>>;
    async fn set_token_link(&self, launch_id: Uuid, token_id: Uuid) -> Result<()>;
}

/// Whether a token insert created a row or collided with an existing mint.
/// A collision is a success signal, not an error: a live launch pipeline may
/// race the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInsert {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_mint(&self, mint: &str) -> Result<Option<UserToken>>;
    async fn list_active(&self) -> Result<Vec<UserToken>>;
    /// Inserts the token, reporting a duplicate mint as `AlreadyExists`
    /// rather than an error.
    async fn insert_token(&self, token: &UserToken) -> Result<TokenInsert>;
    /// Backfills the owning-user reference on rows where it is unset.
    async fn set_user_ref_if_missing(&self, token_id: Uuid, user_ref: &str) -> Result<()>;
}

/// Append-only trace sink. Callers log and continue on failure.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// The full persistence surface the engine needs, as one object-safe bound.
pub trait Store:
    ConfigStore + CycleStateStore + LaunchStore + TokenStore + AuditSink + Send + Sync
{
}

impl<T> Store for T where
    T: ConfigStore + CycleStateStore + LaunchStore + TokenStore + AuditSink + Send + Sync
{
}
