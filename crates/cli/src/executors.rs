//! Stand-ins for the on-chain collaborators. The engine only sees the
//! [`TradeExecutor`] and [`FeeClaimer`] traits; wiring a real swap backend in
//! means replacing these two types at the call site in `commands::run_engine`.

use anyhow::Result;
use async_trait::async_trait;
use flywheel_core::{FeeClaimer, Phase, TradeExecutor, TradeOutcome};
use rust_decimal::Decimal;

/// Logs every trade attempt and reports it filled. No chain contact.
pub struct SimulatedExecutor;

#[async_trait]
impl TradeExecutor for SimulatedExecutor {
    async fn execute_trade(&self, mint: &str, phase: Phase) -> Result<TradeOutcome> {
        tracing::info!(mint, phase = phase.as_str(), "simulated trade filled");
        Ok(TradeOutcome::Filled)
    }
}

/// Reports an empty ops wallet, so the auto-claim trigger stays quiet.
pub struct SimulatedClaimer;

#[async_trait]
impl FeeClaimer for SimulatedClaimer {
    async fn ops_balance(&self, _mint: &str) -> Result<Decimal> {
        Ok(Decimal::ZERO)
    }

    async fn claim_fees(&self, mint: &str) -> Result<()> {
        tracing::info!(mint, "simulated fee claim");
        Ok(())
    }
}
