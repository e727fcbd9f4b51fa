//! Pending launch repository.

use anyhow::Result;
use chrono::{DateTime, Utc};
use flywheel_core::{LaunchStatus, PendingLaunch};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for launch requests. Rows are written by the (external) launch
/// pipeline; the reconciler only reads them and sets the token link.
#[derive(Debug, Clone)]
pub struct LaunchRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct PendingLaunchRow {
    id: Uuid,
    status: String,
    mint: Option<String>,
    user_ref: String,
    dev_wallet_address: String,
    dev_wallet_key_enc: String,
    ops_wallet_address: String,
    ops_wallet_key_enc: String,
    user_token_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingLaunchRow> for PendingLaunch {
    type Error = anyhow::Error;

    fn try_from(row: PendingLaunchRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            status: row.status.parse::<LaunchStatus>()?,
            mint: row.mint,
            user_ref: row.user_ref,
            dev_wallet_address: row.dev_wallet_address,
            dev_wallet_key_enc: row.dev_wallet_key_enc,
            ops_wallet_address: row.ops_wallet_address,
            ops_wallet_key_enc: row.ops_wallet_key_enc,
            user_token_id: row.user_token_id,
            created_at: row.created_at,
        })
    }
}

impl LaunchRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a launch request. Used by the launch pipeline and by seed
    /// tooling; the engine itself never creates launches.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, launch: &PendingLaunch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_launches
                (id, status, mint, user_ref, dev_wallet_address, dev_wallet_key_enc,
                 ops_wallet_address, ops_wallet_key_enc, user_token_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(launch.id)
        .bind(launch.status.as_str())
        .bind(&launch.mint)
        .bind(&launch.user_ref)
        .bind(&launch.dev_wallet_address)
        .bind(&launch.dev_wallet_key_enc)
        .bind(&launch.ops_wallet_address)
        .bind(&launch.ops_wallet_key_enc)
        .bind(launch.user_token_id)
        .bind(launch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Completed launches with a mint address and no linked token, oldest
    /// first. These are the rows the reconciler repairs.
    ///
    /// # Errors
    /// Returns an error if the database query fails or a row is malformed.
    pub async fn list_unlinked_completed(&self) -> Result<Vec<PendingLaunch>> {
        let rows = sqlx::query_as::<_, PendingLaunchRow>(
            r#"
            SELECT id, status, mint, user_ref, dev_wallet_address, dev_wallet_key_enc,
                   ops_wallet_address, ops_wallet_key_enc, user_token_id, created_at
            FROM pending_launches
            WHERE status = 'completed'
              AND mint IS NOT NULL
              AND user_token_id IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingLaunch::try_from).collect()
    }

    /// Points a launch at its canonical token record.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn set_token_link(&self, launch_id: Uuid, token_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pending_launches
            SET user_token_id = $2
            WHERE id = $1
            "#,
        )
        .bind(launch_id)
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_launch() {
        let row = PendingLaunchRow {
            id: Uuid::new_v4(),
            status: "completed".to_string(),
            mint: Some("M1".to_string()),
            user_ref: "user-1".to_string(),
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc".to_string(),
            user_token_id: None,
            created_at: Utc::now(),
        };
        let launch = PendingLaunch::try_from(row).unwrap();
        assert_eq!(launch.status, LaunchStatus::Completed);
        assert!(launch.needs_reconciliation());
    }

    #[test]
    fn unknown_status_tag_is_an_error() {
        let row = PendingLaunchRow {
            id: Uuid::new_v4(),
            status: "queued".to_string(),
            mint: None,
            user_ref: "user-1".to_string(),
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc".to_string(),
            user_token_id: None,
            created_at: Utc::now(),
        };
        assert!(PendingLaunch::try_from(row).is_err());
    }
}
