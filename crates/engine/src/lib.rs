pub mod commands;
pub mod handle;
pub mod rate_limiter;
pub mod reconciler;
pub mod registry;
pub mod state_updater;
pub mod tick;
pub mod token_actor;

pub use commands::{TokenCommand, TokenStatus};
pub use handle::TokenHandle;
pub use rate_limiter::TradeRateLimiter;
pub use reconciler::{LaunchReconciler, ReconcileReport};
pub use registry::{EngineServices, TokenRegistry};
pub use state_updater::StateUpdater;
pub use token_actor::TokenActor;
