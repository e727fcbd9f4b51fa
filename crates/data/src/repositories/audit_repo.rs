//! Audit event repository. Append-only.

use anyhow::Result;
use chrono::{DateTime, Utc};
use flywheel_core::{AuditEvent, AuditKind};
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for the append-only audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    kind: String,
    launch_id: Option<Uuid>,
    token_id: Option<Uuid>,
    user_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = anyhow::Error;

    fn try_from(row: AuditEventRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            kind: row.kind.parse::<AuditKind>()?,
            launch_id: row.launch_id,
            token_id: row.token_id,
            user_ref: row.user_ref,
            created_at: row.created_at,
        })
    }
}

impl AuditRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends an audit event.
    ///
    /// # Errors
    /// Returns an error if the database operation fails. Callers treat this
    /// as best-effort and log instead of propagating.
    pub async fn insert(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (id, kind, launch_id, token_id, user_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.kind.as_str())
        .bind(event.launch_id)
        .bind(event.token_id)
        .bind(&event.user_ref)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets the most recent audit events.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT id, kind, launch_id, token_id, user_ref, created_at
            FROM audit_events
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEvent::try_from).collect()
    }
}
