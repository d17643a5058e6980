//! Pure renderers for the `detail` of each mutating component.
//!
//! Live and dry-run paths call the same functions, so both produce the same
//! shape for the same inputs. Nothing here touches the control plane.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::apply::schedules::{TaskEntry, TaskMigrationReport};
use crate::config::types::{ScheduledTaskDefinition, SnapshotCopyConfig, TargetResourceConfig};
use crate::executor::orchestrator::ProvisionRequest;

/// `{dry_run: true, action, ...inputs}` returned by orchestrator operations in dry-run mode.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunEnvelope {
    pub action: String,
    pub inputs: Map<String, Value>,
}

impl DryRunEnvelope {
    pub fn new(action: &str, inputs: Map<String, Value>) -> Self {
        Self {
            action: action.to_string(),
            inputs,
        }
    }
}

impl Serialize for DryRunEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.inputs.len() + 2))?;
        map.serialize_entry("dry_run", &true)?;
        map.serialize_entry("action", &self.action)?;
        for (key, value) in &self.inputs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ─── Provisioning ───────────────────────────────────────────────────────────

pub fn provision_inputs(request: &ProvisionRequest, snapshot: Option<&str>) -> Map<String, Value> {
    let mut inputs = object(json!({
        "cluster_identifier": request.source_id,
        "namespace_name": request.namespace_name,
        "workgroup_name": request.workgroup_name,
        "max_capacity": request.max_capacity,
        "subnet_ids": request.network.subnet_ids,
        "security_group_ids": request.network.security_group_ids,
        "publicly_accessible": request.network.publicly_accessible,
        "iam_roles": request.iam_roles,
        "tags": request.tags,
    }));
    if let Some(snapshot) = snapshot {
        inputs.insert("snapshot_identifier".to_string(), json!(snapshot));
    }
    inputs
}

pub fn namespace_inputs(request: &ProvisionRequest) -> Map<String, Value> {
    object(json!({
        "namespace_name": request.namespace_name,
        "admin_username": request.admin_username,
        "iam_roles": request.iam_roles,
        "default_iam_role": request.iam_roles.first(),
        "tags": request.tags,
    }))
}

pub fn workgroup_inputs(request: &ProvisionRequest, price_performance_level: i32) -> Map<String, Value> {
    object(json!({
        "workgroup_name": request.workgroup_name,
        "namespace_name": request.namespace_name,
        "subnet_ids": request.network.subnet_ids,
        "security_group_ids": request.network.security_group_ids,
        "publicly_accessible": request.network.publicly_accessible,
        "max_capacity": request.max_capacity,
        "price_performance_level": price_performance_level,
        "tags": request.tags,
    }))
}

/// Detail of the `provision` component.
pub fn provision_detail(action: &str, request: &ProvisionRequest, snapshot: Option<&str>) -> Value {
    let mut detail = Map::new();
    detail.insert("action".to_string(), json!(action));
    detail.extend(provision_inputs(request, snapshot));
    Value::Object(detail)
}

// ─── Settings Pass ──────────────────────────────────────────────────────────

pub fn network_detail(target: &TargetResourceConfig) -> Value {
    json!({
        "workgroup_name": target.workgroup_name,
        "subnet_ids": target.network.subnet_ids,
        "security_group_ids": target.network.security_group_ids,
        "publicly_accessible": target.network.publicly_accessible,
    })
}

pub fn identity_detail(target: &TargetResourceConfig) -> Value {
    json!({
        "namespace_name": target.namespace_name,
        "iam_roles": target.iam_roles,
        "default_iam_role": target.default_role(),
    })
}

pub fn parameters_detail(target: &TargetResourceConfig) -> Value {
    json!({
        "workgroup_name": target.workgroup_name,
        "parameters": target.parameters,
    })
}

pub fn tags_detail(target: &TargetResourceConfig) -> Value {
    json!({
        "namespace_name": target.namespace_name,
        "workgroup_name": target.workgroup_name,
        "tags": target.tags,
    })
}

pub fn snapshot_copy_detail(namespace_name: &str, copy: &SnapshotCopyConfig) -> Value {
    json!({
        "namespace_name": namespace_name,
        "destination_region": copy.destination_region,
        "retention_period": copy.retention_period,
    })
}

// ─── Scheduled Tasks ────────────────────────────────────────────────────────

/// What a task migration would do: every valid task would be created.
pub fn scheduled_tasks_plan(tasks: &[ScheduledTaskDefinition], workgroup: &str) -> TaskMigrationReport {
    let mut report = TaskMigrationReport::default();
    for task in tasks {
        match TaskEntry::skip_reason(task) {
            Some(reason) => report.skipped.push(TaskEntry::skipped(task, workgroup, reason)),
            None => report.created.push(TaskEntry::planned(task, workgroup, "would-create")),
        }
    }
    report
}
