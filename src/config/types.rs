use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider::models::ConfigParameter;

// ─── Source Configuration ───────────────────────────────────────────────────

/// Canonical snapshot of a provisioned cluster's settings.
/// This is the extract → apply hand-off artifact; field names are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResourceConfig {
    pub identifier: String,
    #[serde(default)]
    pub iam_roles: Vec<IamRoleRef>,
    pub network: NetworkConfig,
    #[serde(default)]
    pub parameter_group: Option<ParameterGroup>,
    #[serde(default)]
    pub scheduled_tasks: Vec<ScheduledTaskDefinition>,
    #[serde(default)]
    pub usage_limits: Vec<UsageLimit>,
    #[serde(default)]
    pub snapshot_schedules: Vec<SnapshotSchedule>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_copy: Option<SnapshotCopyConfig>,
}

impl SourceResourceConfig {
    /// An otherwise empty config for a cluster, used as the base for extraction.
    pub fn new(identifier: &str, network: NetworkConfig) -> Self {
        Self {
            identifier: identifier.to_string(),
            iam_roles: Vec::new(),
            network,
            parameter_group: None,
            scheduled_tasks: Vec::new(),
            usage_limits: Vec::new(),
            snapshot_schedules: Vec::new(),
            tags: BTreeMap::new(),
            maintenance_window: None,
            maintenance_track: None,
            snapshot_copy: None,
        }
    }

    pub fn default_role(&self) -> Option<&str> {
        self.iam_roles
            .iter()
            .find(|r| r.is_default)
            .map(|r| r.role_arn.as_str())
    }
}

/// An identity role attached to the source cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRoleRef {
    pub role_arn: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Network placement, shared by source and target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub publicly_accessible: bool,
}

/// Parameter group attached to the source cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSetting>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A single parameter value. Values are kept as text regardless of `data_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSetting {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "default_true")]
    pub is_modifiable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSetting {
    pub fn user(value: &str) -> Self {
        Self {
            value: value.to_string(),
            data_type: None,
            source: Some("user".to_string()),
            is_modifiable: true,
            description: None,
        }
    }

    pub fn is_engine_default(&self) -> bool {
        self.source.as_deref() == Some(ENGINE_DEFAULT_SOURCE)
    }
}

/// Source marker for parameters left at the engine default.
pub const ENGINE_DEFAULT_SOURCE: &str = "engine-default";

fn default_true() -> bool {
    true
}

/// Where a scheduled task was discovered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    #[default]
    Rule,
    Scheduler,
}

/// A recurring query bound to the source cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTaskDefinition {
    pub name: String,
    pub schedule_expression: String,
    pub sql: String,
    pub database: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub origin: TaskOrigin,
}

impl ScheduledTaskDefinition {
    /// Target schedule name; also the conflict key on the target scheduler.
    pub fn target_name(&self, workgroup: &str) -> String {
        format!("{}-{}", workgroup, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimit {
    pub limit_id: String,
    pub feature_type: String,
    pub limit_type: String,
    pub amount: i64,
    pub period: String,
    pub breach_action: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSchedule {
    pub schedule_identifier: String,
    #[serde(default)]
    pub schedule_definitions: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Cross-region snapshot copy settings of the source cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCopyConfig {
    pub destination_region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_period: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_snapshot_retention_period: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_copy_grant_name: Option<String>,
}

// ─── Target Configuration ───────────────────────────────────────────────────

/// Settings to push onto the serverless namespace/workgroup pair.
/// Built by `mapping::target::derive`; re-derive rather than mutate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResourceConfig {
    pub workgroup_name: String,
    pub namespace_name: String,
    /// Role ARNs, default role first.
    pub iam_roles: Vec<String>,
    pub network: NetworkConfig,
    pub parameters: Vec<ConfigParameter>,
    pub tags: BTreeMap<String, String>,
}

impl TargetResourceConfig {
    pub fn default_role(&self) -> Option<&str> {
        self.iam_roles.first().map(String::as_str)
    }
}

// ─── Apply Options ──────────────────────────────────────────────────────────

/// Options accepted by the `apply` and `migrate` workflows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOptions {
    #[serde(default)]
    pub workgroup_name: Option<String>,
    #[serde(default)]
    pub namespace_name: Option<String>,
    #[serde(default)]
    pub create_if_missing: bool,
    #[serde(default)]
    pub create_snapshot: bool,
    #[serde(default)]
    pub snapshot_name: Option<String>,
    #[serde(default)]
    pub use_latest_snapshot: bool,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default, skip_serializing)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub max_capacity: Option<i32>,
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplyOptions {
    /// Workgroup name, defaulting to the source identifier.
    pub fn resolved_workgroup(&self, source_id: &str) -> String {
        self.workgroup_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| source_id.to_string())
    }

    /// Namespace name, defaulting to the workgroup name.
    pub fn resolved_namespace(&self, source_id: &str) -> String {
        self.namespace_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.resolved_workgroup(source_id))
    }
}
