use chrono::{DateTime, Utc};
use flywheel_core::{CheckResult, CycleState, Phase, TokenConfig, UserToken};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug)]
pub enum TokenCommand {
    Start,
    Stop,
    UpdateConfig(Box<TokenConfig>),
    GetStatus(oneshot::Sender<TokenStatus>),
    Shutdown,
}

/// Read-only snapshot of a token's scheduling state, consumed by the status
/// API. The engine writes these fields; nothing outside the engine mutates
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatus {
    pub token_id: Uuid,
    pub mint: String,
    pub running: bool,
    pub phase: Phase,
    pub buy_count: u32,
    pub sell_count: u32,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_check_result: Option<CheckResult>,
}

impl TokenStatus {
    #[must_use]
    pub fn snapshot(token: &UserToken, state: &CycleState, running: bool) -> Self {
        Self {
            token_id: token.id,
            mint: token.mint.clone(),
            running,
            phase: state.phase,
            buy_count: state.buy_count,
            sell_count: state.sell_count,
            last_trade_at: state.last_trade_at,
            last_check_at: state.last_check_at,
            last_check_result: state.last_check_result,
        }
    }
}
