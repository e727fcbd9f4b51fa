pub mod config;
pub mod config_loader;
pub mod launch;
pub mod token;
pub mod traits;

pub use config::{AppConfig, DatabaseConfig, EngineConfig};
pub use config_loader::ConfigLoader;
pub use launch::{AuditEvent, AuditKind, LaunchStatus, PendingLaunch, UserToken};
pub use token::{
    AlgorithmMode, CheckResult, ConfigError, ConfigWarning, CycleState, Phase, TokenConfig,
};
pub use traits::{
    AuditSink, ConfigStore, CycleStateStore, FeeClaimer, LaunchStore, Store, TokenInsert,
    TokenStore, TradeExecutor, TradeOutcome,
};
