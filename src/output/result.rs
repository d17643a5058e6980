use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use crate::error::ErrorKind;

/// Outcome of one component of a migration.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { message: String, detail: Value },
    Skipped { reason: String },
    Error {
        kind: ErrorKind,
        message: String,
        detail: Option<Value>,
    },
    DryRun { message: String, detail: Value },
}

impl Outcome {
    pub fn success(message: impl Into<String>, detail: Value) -> Self {
        Outcome::Success {
            message: message.into(),
            detail,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn dry_run(message: impl Into<String>, detail: Value) -> Self {
        Outcome::DryRun {
            message: message.into(),
            detail,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, detail: Option<Value>) -> Self {
        Outcome::Error {
            kind,
            message: message.into(),
            detail,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Skipped { .. } => "skipped",
            Outcome::Error { .. } => "error",
            Outcome::DryRun { .. } => "dry_run",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Success { message, .. }
            | Outcome::Error { message, .. }
            | Outcome::DryRun { message, .. } => message,
            Outcome::Skipped { reason } => reason,
        }
    }

    pub fn detail(&self) -> Option<&Value> {
        match self {
            Outcome::Success { detail, .. } | Outcome::DryRun { detail, .. } => Some(detail),
            Outcome::Error { detail, .. } => detail.as_ref(),
            Outcome::Skipped { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error { .. })
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", self.status())?;
        map.serialize_entry("message", self.message())?;
        match self {
            Outcome::Success { detail, .. } | Outcome::DryRun { detail, .. } => {
                map.serialize_entry("detail", detail)?;
            }
            Outcome::Skipped { reason } => {
                map.serialize_entry("reason", reason)?;
            }
            Outcome::Error { kind, detail, .. } => {
                map.serialize_entry("error", kind)?;
                if let Some(detail) = detail {
                    map.serialize_entry("detail", detail)?;
                }
            }
        }
        map.end()
    }
}

/// Per-component outcomes of one `apply` or `migrate` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    #[serde(flatten)]
    pub components: BTreeMap<String, Outcome>,
}

impl MigrationReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            components: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, component: &str, outcome: Outcome) {
        tracing::debug!(component = component, status = outcome.status(), "Component finished");
        self.components.insert(component.to_string(), outcome);
    }

    pub fn get(&self, component: &str) -> Option<&Outcome> {
        self.components.get(component)
    }

    /// Whether any component failed. Callers decide if that fails the whole run.
    pub fn has_errors(&self) -> bool {
        self.components.values().any(Outcome::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.components.values().filter(|o| o.is_error()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use serde_json::json;

    #[test]
    fn outcome_shapes() {
        let ok = serde_json::to_value(Outcome::success("done", json!({"a": 1}))).unwrap();
        assert_eq!(ok, json!({"status": "success", "message": "done", "detail": {"a": 1}}));

        let skipped = serde_json::to_value(Outcome::skipped("No IAM roles to apply")).unwrap();
        assert_eq!(skipped["status"], "skipped");
        assert_eq!(skipped["reason"], "No IAM roles to apply");

        let err = MigrationError::Validation("bad".into());
        let value = serde_json::to_value(Outcome::error(err.kind(), err.to_string(), None)).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "validation");
        assert!(value.get("detail").is_none());
    }

    #[test]
    fn report_flattens_components() {
        let mut report = MigrationReport::new(true);
        report.insert("network", Outcome::dry_run("would update", json!({})));
        report.insert("identity", Outcome::skipped("none"));

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["dry_run"], true);
        assert_eq!(value["network"]["status"], "dry_run");
        assert!(!report.has_errors());
    }
}
