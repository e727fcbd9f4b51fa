//! One repository per table, all backed by the shared `PgPool`.

pub mod audit_repo;
pub mod cycle_state_repo;
pub mod launch_repo;
pub mod token_config_repo;
pub mod user_token_repo;

pub use audit_repo::AuditRepository;
pub use cycle_state_repo::CycleStateRepository;
pub use launch_repo::LaunchRepository;
pub use token_config_repo::TokenConfigRepository;
pub use user_token_repo::UserTokenRepository;
