//! Token configuration repository.

use anyhow::{Context, Result};
use chrono::Utc;
use flywheel_core::{AlgorithmMode, TokenConfig};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for per-token trading parameters.
#[derive(Debug, Clone)]
pub struct TokenConfigRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TokenConfigRow {
    algorithm: String,
    cycle_buys: i64,
    cycle_sells: i64,
    interval_secs: i64,
    confirmation_timeout_secs: i64,
    rate_limit_share: i64,
    auto_claim: bool,
    auto_claim_threshold: Decimal,
    batch_state_updates: bool,
}

impl TryFrom<TokenConfigRow> for TokenConfig {
    type Error = anyhow::Error;

    fn try_from(row: TokenConfigRow) -> Result<Self> {
        Ok(Self {
            algorithm: row.algorithm.parse::<AlgorithmMode>()?,
            cycle_buys: u32::try_from(row.cycle_buys).context("cycle_buys out of range")?,
            cycle_sells: u32::try_from(row.cycle_sells).context("cycle_sells out of range")?,
            interval_secs: u64::try_from(row.interval_secs).context("interval out of range")?,
            confirmation_timeout_secs: u64::try_from(row.confirmation_timeout_secs)
                .context("timeout out of range")?,
            rate_limit_share: u32::try_from(row.rate_limit_share)
                .context("rate_limit_share out of range")?,
            auto_claim: row.auto_claim,
            auto_claim_threshold: row.auto_claim_threshold,
            batch_state_updates: row.batch_state_updates,
        })
    }
}

impl TokenConfigRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces the configuration for a token.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn upsert(&self, token_id: Uuid, config: &TokenConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO token_configs
                (token_id, algorithm, cycle_buys, cycle_sells, interval_secs,
                 confirmation_timeout_secs, rate_limit_share, auto_claim,
                 auto_claim_threshold, batch_state_updates, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (token_id) DO UPDATE SET
                algorithm = excluded.algorithm,
                cycle_buys = excluded.cycle_buys,
                cycle_sells = excluded.cycle_sells,
                interval_secs = excluded.interval_secs,
                confirmation_timeout_secs = excluded.confirmation_timeout_secs,
                rate_limit_share = excluded.rate_limit_share,
                auto_claim = excluded.auto_claim,
                auto_claim_threshold = excluded.auto_claim_threshold,
                batch_state_updates = excluded.batch_state_updates,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(token_id)
        .bind(config.algorithm.as_str())
        .bind(i64::from(config.cycle_buys))
        .bind(i64::from(config.cycle_sells))
        .bind(i64::try_from(config.interval_secs).context("interval out of range")?)
        .bind(
            i64::try_from(config.confirmation_timeout_secs).context("timeout out of range")?,
        )
        .bind(i64::from(config.rate_limit_share))
        .bind(config.auto_claim)
        .bind(config.auto_claim_threshold)
        .bind(config.batch_state_updates)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets the configuration for a token.
    ///
    /// # Errors
    /// Returns an error if the database query fails or the row is malformed.
    pub async fn get(&self, token_id: Uuid) -> Result<Option<TokenConfig>> {
        let row = sqlx::query_as::<_, TokenConfigRow>(
            r#"
            SELECT algorithm, cycle_buys, cycle_sells, interval_secs,
                   confirmation_timeout_secs, rate_limit_share, auto_claim,
                   auto_claim_threshold, batch_state_updates
            FROM token_configs
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenConfig::try_from).transpose()
    }
}
