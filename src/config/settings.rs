use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};
use crate::provider::models::ResourceKind;

/// Engine-wide settings: poll budgets, retry policy and provisioning defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub region: Option<String>,
    pub max_capacity: i32,
    /// Price/performance target level, 1-100. 50 is "balanced".
    pub price_performance_level: i32,
    pub admin_username: String,
    pub db_name: String,
    pub execution_role_name: String,
    pub session_idle_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub snapshot_poll: PollPolicy,
    pub namespace_poll: PollPolicy,
    pub workgroup_poll: PollPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: None,
            max_capacity: 512,
            price_performance_level: 50,
            admin_username: "admin".to_string(),
            db_name: "dev".to_string(),
            execution_role_name: "RedshiftServerlessSchedulerRole".to_string(),
            session_idle_timeout_secs: 1800,
            retry: RetryPolicy::default(),
            snapshot_poll: PollPolicy::new(3600, 30),
            namespace_poll: PollPolicy::new(1800, 15),
            workgroup_poll: PollPolicy::new(1800, 15),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            MigrationError::Validation(format!(
                "invalid settings file {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn poll_policy(&self, kind: ResourceKind) -> PollPolicy {
        match kind {
            ResourceKind::Snapshot => self.snapshot_poll,
            ResourceKind::Namespace => self.namespace_poll,
            ResourceKind::Workgroup => self.workgroup_poll,
        }
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

/// Bounded fixed-interval polling budget for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub timeout_secs: u64,
    pub interval_secs: u64,
}

impl PollPolicy {
    pub const fn new(timeout_secs: u64, interval_secs: u64) -> Self {
        Self {
            timeout_secs,
            interval_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Backoff policy for throttled control-plane calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_budgets() {
        let s = Settings::default();
        assert_eq!(s.poll_policy(ResourceKind::Snapshot), PollPolicy::new(3600, 30));
        assert_eq!(s.poll_policy(ResourceKind::Namespace), PollPolicy::new(1800, 15));
        assert_eq!(s.poll_policy(ResourceKind::Workgroup).interval(), Duration::from_secs(15));
        assert_eq!(s.retry.max_retries, 5);
        assert_eq!(s.retry.base_delay_ms, 500);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "region: eu-west-1\nmax_capacity: 128\nsnapshot_poll:\n  timeout_secs: 60\n  interval_secs: 5"
        )
        .unwrap();

        let s = Settings::load(file.path()).unwrap();
        assert_eq!(s.region.as_deref(), Some("eu-west-1"));
        assert_eq!(s.max_capacity, 128);
        assert_eq!(s.snapshot_poll, PollPolicy::new(60, 5));
        assert_eq!(s.namespace_poll, PollPolicy::new(1800, 15));
        assert_eq!(s.admin_username, "admin");
    }

    #[test]
    fn malformed_yaml_is_a_validation_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_capacity: [not, a, number]").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)));
    }
}
