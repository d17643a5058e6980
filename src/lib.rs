pub mod apply;
pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod mapping;
pub mod output;
pub mod provider;
pub mod state;

pub use error::{ErrorKind, MigrationError};
