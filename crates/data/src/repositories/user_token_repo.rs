//! User token repository.

use anyhow::Result;
use chrono::{DateTime, Utc};
use flywheel_core::{TokenInsert, UserToken};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for canonical token records.
#[derive(Debug, Clone)]
pub struct UserTokenRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserTokenRow {
    id: Uuid,
    mint: String,
    user_ref: Option<String>,
    dev_wallet_address: String,
    dev_wallet_key_enc: String,
    ops_wallet_address: String,
    ops_wallet_key_enc: String,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<UserTokenRow> for UserToken {
    fn from(row: UserTokenRow) -> Self {
        Self {
            id: row.id,
            mint: row.mint,
            user_ref: row.user_ref,
            dev_wallet_address: row.dev_wallet_address,
            dev_wallet_key_enc: row.dev_wallet_key_enc,
            ops_wallet_address: row.ops_wallet_address,
            ops_wallet_key_enc: row.ops_wallet_key_enc,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, mint, user_ref, dev_wallet_address, dev_wallet_key_enc,
           ops_wallet_address, ops_wallet_key_enc, active, created_at
    FROM user_tokens
"#;

impl UserTokenRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a token, treating a duplicate mint as "already exists" rather
    /// than an error. A live launch pipeline can race the reconciler here.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, token: &UserToken) -> Result<TokenInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_tokens
                (id, mint, user_ref, dev_wallet_address, dev_wallet_key_enc,
                 ops_wallet_address, ops_wallet_key_enc, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (mint) DO NOTHING
            "#,
        )
        .bind(token.id)
        .bind(&token.mint)
        .bind(&token.user_ref)
        .bind(&token.dev_wallet_address)
        .bind(&token.dev_wallet_key_enc)
        .bind(&token.ops_wallet_address)
        .bind(&token.ops_wallet_key_enc)
        .bind(token.active)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(TokenInsert::AlreadyExists)
        } else {
            Ok(TokenInsert::Created)
        }
    }

    /// Finds a token by its mint address.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn find_by_mint(&self, mint: &str) -> Result<Option<UserToken>> {
        let row = sqlx::query_as::<_, UserTokenRow>(&format!("{SELECT_COLUMNS} WHERE mint = $1"))
            .bind(mint)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserToken::from))
    }

    /// Lists all active tokens, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn list_active(&self) -> Result<Vec<UserToken>> {
        let rows = sqlx::query_as::<_, UserTokenRow>(&format!(
            "{SELECT_COLUMNS} WHERE active = TRUE ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserToken::from).collect())
    }

    /// Backfills the owning-user reference where it is currently unset.
    /// Repairs rows created by a partial prior reconciliation run.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn set_user_ref_if_missing(&self, token_id: Uuid, user_ref: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE user_tokens
            SET user_ref = $2
            WHERE id = $1 AND user_ref IS NULL
            "#,
        )
        .bind(token_id)
        .bind(user_ref)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_token() {
        let id = Uuid::new_v4();
        let row = UserTokenRow {
            id,
            mint: "M1".to_string(),
            user_ref: None,
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc-dev".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc-ops".to_string(),
            active: true,
            created_at: Utc::now(),
        };
        let token = UserToken::from(row);
        assert_eq!(token.id, id);
        assert_eq!(token.mint, "M1");
        assert!(token.user_ref.is_none());
    }
}
