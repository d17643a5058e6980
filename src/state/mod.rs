pub mod session;

pub use session::{MemorySessionStore, Session, SessionStore};
