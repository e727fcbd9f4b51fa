use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::token::ParseTagError;

/// Lifecycle of a token creation request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    AwaitingDeposit,
    Processing,
    Completed,
    Expired,
    Failed,
}

impl LaunchStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingDeposit => "awaiting_deposit",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for LaunchStatus {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_deposit" => Ok(Self::AwaitingDeposit),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            other => Err(ParseTagError {
                kind: "launch status",
                value: other.to_string(),
            }),
        }
    }
}

/// A token creation request in flight. Retained indefinitely as an audit
/// trail; once `completed`, the mint must be set and `user_token_id` should
/// eventually point at the canonical [`UserToken`] (the condition the
/// reconciler repairs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingLaunch {
    pub id: Uuid,
    pub status: LaunchStatus,
    /// Null until chain-confirmed.
    pub mint: Option<String>,
    pub user_ref: String,
    pub dev_wallet_address: String,
    pub dev_wallet_key_enc: String,
    pub ops_wallet_address: String,
    pub ops_wallet_key_enc: String,
    /// Weak back-reference to the linked trading record, null until linked.
    pub user_token_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PendingLaunch {
    /// True when the launch finished but was never linked to a trading record.
    #[must_use]
    pub fn needs_reconciliation(&self) -> bool {
        self.status == LaunchStatus::Completed
            && self.mint.is_some()
            && self.user_token_id.is_none()
    }
}

/// Canonical record of a token under flywheel management. Exactly one per
/// mint address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserToken {
    pub id: Uuid,
    pub mint: String,
    /// Unset on rows created by a partial prior reconciliation run; repaired
    /// from the launch on the next pass.
    pub user_ref: Option<String>,
    pub dev_wallet_address: String,
    pub dev_wallet_key_enc: String,
    pub ops_wallet_address: String,
    pub ops_wallet_key_enc: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserToken {
    /// Builds the canonical token record for a completed launch, copying the
    /// wallet addresses and encrypted key material.
    ///
    /// Callers must have checked that `launch.mint` is set.
    #[must_use]
    pub fn from_launch(launch: &PendingLaunch, mint: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mint: mint.to_string(),
            user_ref: Some(launch.user_ref.clone()),
            dev_wallet_address: launch.dev_wallet_address.clone(),
            dev_wallet_key_enc: launch.dev_wallet_key_enc.clone(),
            ops_wallet_address: launch.ops_wallet_address.clone(),
            ops_wallet_key_enc: launch.ops_wallet_key_enc.clone(),
            active: true,
            created_at: now,
        }
    }
}

/// Reconciler and engine actions worth tracing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    TokenCreated,
    LaunchLinked,
    ConfigCreated,
    StateCreated,
    ClaimTriggered,
}

impl AuditKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TokenCreated => "token_created",
            Self::LaunchLinked => "launch_linked",
            Self::ConfigCreated => "config_created",
            Self::StateCreated => "state_created",
            Self::ClaimTriggered => "claim_triggered",
        }
    }
}

impl FromStr for AuditKind {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token_created" => Ok(Self::TokenCreated),
            "launch_linked" => Ok(Self::LaunchLinked),
            "config_created" => Ok(Self::ConfigCreated),
            "state_created" => Ok(Self::StateCreated),
            "claim_triggered" => Ok(Self::ClaimTriggered),
            other => Err(ParseTagError {
                kind: "audit kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Append-only trace entry. Never required for correctness; its absence must
/// never block or retry engine logic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditKind,
    pub launch_id: Option<Uuid>,
    pub token_id: Option<Uuid>,
    pub user_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(kind: AuditKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            launch_id: None,
            token_id: None,
            user_ref: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn for_launch(mut self, launch_id: Uuid) -> Self {
        self.launch_id = Some(launch_id);
        self
    }

    #[must_use]
    pub const fn for_token(mut self, token_id: Uuid) -> Self {
        self.token_id = Some(token_id);
        self
    }

    #[must_use]
    pub fn for_user(mut self, user_ref: &str) -> Self {
        self.user_ref = Some(user_ref.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(status: LaunchStatus, mint: Option<&str>, linked: bool) -> PendingLaunch {
        PendingLaunch {
            id: Uuid::new_v4(),
            status,
            mint: mint.map(ToString::to_string),
            user_ref: "user-1".to_string(),
            dev_wallet_address: "dev".to_string(),
            dev_wallet_key_enc: "enc-dev".to_string(),
            ops_wallet_address: "ops".to_string(),
            ops_wallet_key_enc: "enc-ops".to_string(),
            user_token_id: linked.then(Uuid::new_v4),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn only_completed_minted_unlinked_launches_need_reconciliation() {
        assert!(launch(LaunchStatus::Completed, Some("M1"), false).needs_reconciliation());
        assert!(!launch(LaunchStatus::Completed, Some("M1"), true).needs_reconciliation());
        assert!(!launch(LaunchStatus::Completed, None, false).needs_reconciliation());
        assert!(!launch(LaunchStatus::Processing, Some("M1"), false).needs_reconciliation());
    }

    #[test]
    fn token_from_launch_copies_wallet_material() {
        let source = launch(LaunchStatus::Completed, Some("M1"), false);
        let token = UserToken::from_launch(&source, "M1", Utc::now());
        assert_eq!(token.mint, "M1");
        assert_eq!(token.user_ref.as_deref(), Some("user-1"));
        assert_eq!(token.dev_wallet_key_enc, "enc-dev");
        assert_eq!(token.ops_wallet_key_enc, "enc-ops");
        assert!(token.active);
    }

    #[test]
    fn audit_event_builder_attaches_identifiers() {
        let launch_id = Uuid::new_v4();
        let event = AuditEvent::new(AuditKind::LaunchLinked)
            .for_launch(launch_id)
            .for_user("user-1");
        assert_eq!(event.kind.as_str(), "launch_linked");
        assert_eq!(event.launch_id, Some(launch_id));
        assert_eq!(event.user_ref.as_deref(), Some("user-1"));
    }
}
