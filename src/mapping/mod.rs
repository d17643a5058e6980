pub mod parameters;
pub mod target;
