pub mod dry_run;
pub mod formatter;
pub mod result;

pub use result::{MigrationReport, Outcome};
