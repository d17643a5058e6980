pub mod applier;
pub mod schedules;

pub use applier::ConfigApplier;
pub use schedules::{ScheduledTaskMigrator, TaskMigrationReport};
