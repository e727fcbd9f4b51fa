mod reconcile;
mod run;
mod validate_config;

pub use reconcile::run_reconcile;
pub use run::run_engine;
pub use validate_config::run_validate_config;
