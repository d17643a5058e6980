pub mod clock;
pub mod credentials;
pub mod engine;
pub mod orchestrator;
pub mod retry;
pub mod waiter;

pub use engine::{MigrationEngine, ProvisionPath};
