pub mod database;
pub mod memory;
pub mod postgres;
pub mod repositories;

pub use database::Database;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use repositories::{
    AuditRepository, CycleStateRepository, LaunchRepository, TokenConfigRepository,
    UserTokenRepository,
};
