//! Cycle state repository.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flywheel_core::{CheckResult, CycleState, Phase};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for per-token cycle records.
#[derive(Debug, Clone)]
pub struct CycleStateRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct CycleStateRow {
    token_id: Uuid,
    phase: String,
    buy_count: i64,
    sell_count: i64,
    last_trade_at: Option<DateTime<Utc>>,
    last_check_at: Option<DateTime<Utc>>,
    last_check_result: Option<String>,
}

impl TryFrom<CycleStateRow> for CycleState {
    type Error = anyhow::Error;

    fn try_from(row: CycleStateRow) -> Result<Self> {
        Ok(Self {
            token_id: row.token_id,
            phase: row.phase.parse::<Phase>()?,
            buy_count: u32::try_from(row.buy_count).context("buy_count out of range")?,
            sell_count: u32::try_from(row.sell_count).context("sell_count out of range")?,
            last_trade_at: row.last_trade_at,
            last_check_at: row.last_check_at,
            last_check_result: row
                .last_check_result
                .map(|s| s.parse::<CheckResult>())
                .transpose()?,
        })
    }
}

impl CycleStateRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the cycle record for a token.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn upsert(&self, state: &CycleState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cycle_states
                (token_id, phase, buy_count, sell_count,
                 last_trade_at, last_check_at, last_check_result)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (token_id) DO UPDATE SET
                phase = excluded.phase,
                buy_count = excluded.buy_count,
                sell_count = excluded.sell_count,
                last_trade_at = excluded.last_trade_at,
                last_check_at = excluded.last_check_at,
                last_check_result = excluded.last_check_result
            "#,
        )
        .bind(state.token_id)
        .bind(state.phase.as_str())
        .bind(i64::from(state.buy_count))
        .bind(i64::from(state.sell_count))
        .bind(state.last_trade_at)
        .bind(state.last_check_at)
        .bind(state.last_check_result.map(CheckResult::as_str))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets the cycle record for a token.
    ///
    /// # Errors
    /// Returns an error if the database query fails or the row is malformed.
    pub async fn get(&self, token_id: Uuid) -> Result<Option<CycleState>> {
        let row = sqlx::query_as::<_, CycleStateRow>(
            r#"
            SELECT token_id, phase, buy_count, sell_count,
                   last_trade_at, last_check_at, last_check_result
            FROM cycle_states
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CycleState::try_from).transpose()
    }
}
