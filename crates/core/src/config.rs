use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Process-wide engine settings. Per-token trading parameters live in
/// [`crate::TokenConfig`] and are owned by the user, not by this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Global ceiling on trade attempts across all tokens, per minute.
    #[serde(default = "default_global_rate_limit")]
    pub global_rate_limit_per_min: u32,
    /// Cadence for flushing batched cycle-state writes. Bounds the data-loss
    /// window on a crash before a flush.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    /// Cadence for the background launch reconciler.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
    /// Cadence for re-scanning the token stores so tokens created by the
    /// reconciler enter scheduling without a restart.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
}

const fn default_global_rate_limit() -> u32 {
    30
}

const fn default_flush_interval() -> u64 {
    15
}

const fn default_reconcile_interval() -> u64 {
    300
}

const fn default_sync_interval() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/flywheel".to_string(),
                max_connections: 10,
            },
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_rate_limit_per_min: default_global_rate_limit(),
            flush_interval_secs: default_flush_interval(),
            reconcile_interval_secs: default_reconcile_interval(),
            sync_interval_secs: default_sync_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_config_has_nonzero_intervals() {
        let config = EngineConfig::default();
        assert!(config.global_rate_limit_per_min > 0);
        assert!(config.flush_interval_secs > 0);
        assert!(config.reconcile_interval_secs > 0);
        assert!(config.sync_interval_secs > 0);
    }

    #[test]
    fn engine_config_fills_missing_fields_from_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.global_rate_limit_per_min, 30);
        assert_eq!(config.flush_interval_secs, 15);
    }
}
