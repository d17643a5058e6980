use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::types::SnapshotCopyConfig;

// ─── Resource Lifecycle ─────────────────────────────────────────────────────

/// The kinds of remote resource the orchestrator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Snapshot,
    Namespace,
    Workgroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Snapshot => write!(f, "snapshot"),
            ResourceKind::Namespace => write!(f, "namespace"),
            ResourceKind::Workgroup => write!(f, "workgroup"),
        }
    }
}

/// Lifecycle state as last observed on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Absent,
    Creating,
    Available,
    Restoring,
    Failed,
    Deleting,
}

impl LifecycleState {
    /// Map a status string reported by the control plane onto a lifecycle state.
    ///
    /// Unknown statuses are treated as in-progress so the poller keeps waiting
    /// instead of guessing a terminal outcome.
    pub fn from_remote(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "available" => LifecycleState::Available,
            "creating" | "pending" | "final snapshot" => LifecycleState::Creating,
            "modifying" | "restoring" => LifecycleState::Restoring,
            "failed" => LifecycleState::Failed,
            "deleting" | "deleted" => LifecycleState::Deleting,
            other => {
                tracing::debug!(status = other, "Unrecognised remote status, treating as in-progress");
                LifecycleState::Creating
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Available | LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Absent => "ABSENT",
            LifecycleState::Creating => "CREATING",
            LifecycleState::Available => "AVAILABLE",
            LifecycleState::Restoring => "RESTORING",
            LifecycleState::Failed => "FAILED",
            LifecycleState::Deleting => "DELETING",
        };
        write!(f, "{}", s)
    }
}

/// A remote resource as observed by the most recent read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub identifier: String,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, identifier: &str, state: LifecycleState) -> Self {
        Self {
            kind,
            identifier: identifier.to_string(),
            state,
            arn: None,
        }
    }

    pub fn with_arn(mut self, arn: Option<String>) -> Self {
        self.arn = arn;
        self
    }
}

// ─── Source Warehouse ───────────────────────────────────────────────────────

/// Cluster-level settings read in a single describe call.
#[derive(Debug, Clone, Default)]
pub struct ClusterDescription {
    pub identifier: String,
    pub vpc_id: String,
    pub subnet_group_name: Option<String>,
    pub security_group_ids: Vec<String>,
    pub publicly_accessible: bool,
    pub iam_role_arns: Vec<String>,
    pub default_iam_role_arn: Option<String>,
    pub parameter_group_name: Option<String>,
    pub maintenance_window: Option<String>,
    pub maintenance_track: Option<String>,
    pub snapshot_copy: Option<SnapshotCopyConfig>,
    pub tags: BTreeMap<String, String>,
}

/// Parameter group metadata.
#[derive(Debug, Clone, Default)]
pub struct ParameterGroupDescription {
    pub name: String,
    pub family: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// A single parameter as listed on a parameter group.
#[derive(Debug, Clone, Default)]
pub struct ClusterParameter {
    pub name: String,
    pub value: Option<String>,
    pub data_type: Option<String>,
    pub source: Option<String>,
    pub is_modifiable: bool,
    pub description: Option<String>,
}

/// Snapshot metadata used for polling and restore.
#[derive(Debug, Clone)]
pub struct SnapshotDescription {
    pub identifier: String,
    pub cluster_identifier: Option<String>,
    pub arn: Option<String>,
    pub status: LifecycleState,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SnapshotDescription {
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle::new(ResourceKind::Snapshot, &self.identifier, self.status)
            .with_arn(self.arn.clone())
    }
}

// ─── Serverless Target ──────────────────────────────────────────────────────

/// Request to create a namespace.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceSpec {
    pub name: String,
    pub admin_username: String,
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    pub db_name: String,
    pub iam_roles: Vec<String>,
    pub default_iam_role: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// Request to create a workgroup.
#[derive(Debug, Clone, Serialize)]
pub struct WorkgroupSpec {
    pub name: String,
    pub namespace_name: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub publicly_accessible: bool,
    pub max_capacity: i32,
    pub price_performance_level: i32,
    pub config_parameters: Vec<ConfigParameter>,
    pub tags: BTreeMap<String, String>,
}

/// A target-format key/value setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParameter {
    pub key: String,
    pub value: String,
}

/// In-place workgroup update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkgroupUpdate {
    pub name: String,
    pub subnet_ids: Option<Vec<String>>,
    pub security_group_ids: Option<Vec<String>>,
    pub publicly_accessible: Option<bool>,
    pub config_parameters: Option<Vec<ConfigParameter>>,
}

/// In-place namespace update of identity roles.
#[derive(Debug, Clone)]
pub struct NamespaceUpdate {
    pub name: String,
    pub iam_roles: Vec<String>,
    pub default_iam_role: Option<String>,
}

/// Restore a snapshot into a namespace/workgroup pair.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub namespace_name: String,
    pub workgroup_name: String,
    pub snapshot_arn: String,
}

/// Handles reported back by a restore call. Both are typically still in progress.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub namespace: ResourceHandle,
    pub workgroup: ResourceHandle,
}

/// Cross-region snapshot copy for a namespace.
#[derive(Debug, Clone)]
pub struct SnapshotCopySpec {
    pub namespace_name: String,
    pub destination_region: String,
    pub retention_period: Option<i32>,
}

// ─── Scheduling ─────────────────────────────────────────────────────────────

/// A rule from the rule-based scheduling backend.
#[derive(Debug, Clone)]
pub struct RuleSummary {
    pub name: String,
    pub schedule_expression: Option<String>,
    pub enabled: bool,
}

/// The invocation target of a rule or schedule.
#[derive(Debug, Clone)]
pub struct InvocationTarget {
    pub arn: String,
    pub input: Option<String>,
}

/// A schedule from the dedicated scheduler service.
#[derive(Debug, Clone)]
pub struct ScheduleDescription {
    pub name: String,
    pub group: String,
    pub schedule_expression: String,
    pub enabled: bool,
    pub target: Option<InvocationTarget>,
}

/// Create/update request for a scheduler entry in the default group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleSpec {
    pub name: String,
    pub schedule_expression: String,
    pub enabled: bool,
    pub target_arn: String,
    pub role_arn: String,
    /// JSON-encoded `DataApiInput`.
    pub input: String,
    pub description: String,
}

/// Universal scheduler target that runs a statement through the data API.
pub const DATA_API_TARGET_ARN: &str = "arn:aws:scheduler:::aws-sdk:redshiftdata:executeStatement";

/// Whether an invocation target runs statements through the data API.
pub fn is_data_api_target(arn: &str) -> bool {
    arn.contains("redshift-data") || arn.contains("redshiftdata")
}

/// JSON payload of a data-API invocation target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataApiInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workgroup_name: Option<String>,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub sql: String,
}

// ─── Identity ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
    pub arn: String,
}
