use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::provider::models::{LifecycleState, ResourceKind};
use crate::provider::CloudError;

/// Failures surfaced by the migration core.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("{0} already exists")]
    Conflict(String),

    #[error("timed out after {}s waiting for {kind} '{name}' (last state: {last_state})", waited.as_secs())]
    Timeout {
        kind: ResourceKind,
        name: String,
        waited: Duration,
        last_state: LifecycleState,
    },

    #[error("{resource} failed: {reason}")]
    OperationFailed { resource: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{operation} on '{resource}' failed: {source}")]
    Remote {
        operation: String,
        resource: String,
        #[source]
        source: CloudError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrationError {
    /// Wrap a control-plane error with the operation and resource it came from.
    pub fn remote(operation: &str, resource: &str, source: CloudError) -> Self {
        MigrationError::Remote {
            operation: operation.to_string(),
            resource: resource.to_string(),
            source,
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        MigrationError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Validation(_) => ErrorKind::Validation,
            MigrationError::NotFound { .. } => ErrorKind::NotFound,
            MigrationError::Conflict(_) => ErrorKind::Conflict,
            MigrationError::Timeout { .. } => ErrorKind::Timeout,
            MigrationError::OperationFailed { .. } => ErrorKind::OperationFailed,
            MigrationError::Cancelled => ErrorKind::Cancelled,
            MigrationError::Remote { source, .. } => match source {
                CloudError::NotFound(_) => ErrorKind::NotFound,
                CloudError::Conflict(_) => ErrorKind::Conflict,
                _ => ErrorKind::Remote,
            },
            MigrationError::Io(_) => ErrorKind::Io,
            MigrationError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Stable tag used in serialized results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Timeout,
    OperationFailed,
    Cancelled,
    Remote,
    Io,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::OperationFailed => "operation_failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Remote => "remote",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
