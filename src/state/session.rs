use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::types::SourceResourceConfig;
use crate::executor::clock::Clock;

/// A caller's session: extracted configs cached by source identifier.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub last_used: Instant,
    pub configs: HashMap<String, SourceResourceConfig>,
}

/// Session storage passed into the engine's session-aware entry points.
///
/// Sessions are created on first use and evicted once idle for longer than
/// the store's timeout.
pub trait SessionStore: Send + Sync {
    /// Fetch or create a session, marking it as used.
    fn touch(&self, session_id: &str) -> Session;

    fn cached_config(&self, session_id: &str, source_id: &str) -> Option<SourceResourceConfig>;

    fn cache_config(&self, session_id: &str, config: SourceResourceConfig);

    fn remove(&self, session_id: &str) -> bool;

    /// Drop sessions idle past the timeout. Returns how many were evicted.
    fn evict_idle(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process session store.
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            clock,
        }
    }

    /// Fresh random session id.
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn is_idle(&self, session: &Session, now: Instant) -> bool {
        now.saturating_duration_since(session.last_used) > self.idle_timeout
    }
}

impl SessionStore for MemorySessionStore {
    fn touch(&self, session_id: &str) -> Session {
        self.evict_idle();
        let now = self.clock.now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session = session_id, "Creating session");
                Session {
                    id: session_id.to_string(),
                    last_used: now,
                    configs: HashMap::new(),
                }
            });
        entry.last_used = now;
        entry.clone()
    }

    fn cached_config(&self, session_id: &str, source_id: &str) -> Option<SourceResourceConfig> {
        self.touch(session_id).configs.get(source_id).cloned()
    }

    fn cache_config(&self, session_id: &str, config: SourceResourceConfig) {
        self.touch(session_id);
        if let Some(mut session) = self.sessions.get_mut(session_id) {
            session.configs.insert(config.identifier.clone(), config);
        }
    }

    fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let keep = !self.is_idle(session, now);
            if !keep {
                tracing::debug!(session = %id, "Evicting idle session");
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::NetworkConfig;
    use crate::executor::clock::ManualClock;

    fn store() -> (MemorySessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        (MemorySessionStore::new(Duration::from_secs(60), clock.clone()), clock)
    }

    #[test]
    fn created_on_first_use() {
        let (store, _) = store();
        assert!(store.is_empty());
        let s = store.touch("a");
        assert_eq!(s.id, "a");
        assert_eq!(store.len(), 1);
        store.touch("a");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn caches_configs_per_source() {
        let (store, _) = store();
        store.cache_config("a", SourceResourceConfig::new("c1", NetworkConfig::default()));
        assert!(store.cached_config("a", "c1").is_some());
        assert!(store.cached_config("a", "c2").is_none());
        assert!(store.cached_config("b", "c1").is_none());
    }

    #[test]
    fn idle_sessions_are_evicted() {
        let (store, clock) = store();
        store.touch("old");
        clock.advance(Duration::from_secs(45));
        store.touch("fresh");
        clock.advance(Duration::from_secs(30));

        assert_eq!(store.evict_idle(), 1);
        assert!(store.cached_config("fresh", "c1").is_none());
        assert_eq!(store.len(), 1);
        assert!(!store.remove("old"));
        assert!(store.remove("fresh"));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(MemorySessionStore::new_session_id(), MemorySessionStore::new_session_id());
    }
}
