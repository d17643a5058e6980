pub mod memory;
pub mod models;

#[cfg(feature = "aws")]
pub mod aws;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::types::{SnapshotSchedule, UsageLimit};
use models::{
    ClusterDescription, ClusterParameter, InvocationTarget, NamespaceSpec, NamespaceUpdate,
    ParameterGroupDescription, ResourceHandle, RestoreOutcome, RestoreRequest, RoleInfo,
    RuleSummary, ScheduleDescription, ScheduleSpec, SnapshotCopySpec, SnapshotDescription,
    WorkgroupSpec, WorkgroupUpdate,
};

/// Errors reported by a control-plane client, classified so the orchestration
/// layer can decide between retrying, tolerating and propagating.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    Conflict(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("service error ({code}): {message}")]
    Service { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudError::Conflict(_))
    }

    /// Throttling-class errors are retried with backoff; nothing else is.
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Throttled(_))
    }
}

pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// The provisioned warehouse being migrated from.
#[async_trait]
pub trait SourceWarehouse: Send + Sync {
    async fn describe_cluster(&self, identifier: &str) -> CloudResult<ClusterDescription>;

    /// Subnet ids of a cluster subnet group.
    async fn describe_subnet_group(&self, name: &str) -> CloudResult<Vec<String>>;

    async fn describe_parameter_group(&self, name: &str)
        -> CloudResult<ParameterGroupDescription>;

    async fn describe_parameters(&self, group_name: &str) -> CloudResult<Vec<ClusterParameter>>;

    async fn describe_usage_limits(&self, cluster: &str) -> CloudResult<Vec<UsageLimit>>;

    async fn describe_snapshot_schedules(&self, cluster: &str)
        -> CloudResult<Vec<SnapshotSchedule>>;

    async fn create_snapshot(
        &self,
        cluster: &str,
        snapshot_identifier: &str,
    ) -> CloudResult<SnapshotDescription>;

    async fn describe_snapshot(&self, snapshot_identifier: &str)
        -> CloudResult<SnapshotDescription>;

    /// Manual snapshots taken of a cluster, in no particular order.
    async fn list_manual_snapshots(&self, cluster: &str) -> CloudResult<Vec<SnapshotDescription>>;
}

/// The serverless service being migrated to.
#[async_trait]
pub trait ServerlessTarget: Send + Sync {
    async fn get_namespace(&self, name: &str) -> CloudResult<ResourceHandle>;

    async fn create_namespace(&self, spec: &NamespaceSpec) -> CloudResult<ResourceHandle>;

    async fn update_namespace(&self, update: &NamespaceUpdate) -> CloudResult<ResourceHandle>;

    async fn get_workgroup(&self, name: &str) -> CloudResult<ResourceHandle>;

    async fn create_workgroup(&self, spec: &WorkgroupSpec) -> CloudResult<ResourceHandle>;

    async fn update_workgroup(&self, update: &WorkgroupUpdate) -> CloudResult<ResourceHandle>;

    async fn restore_from_snapshot(&self, request: &RestoreRequest) -> CloudResult<RestoreOutcome>;

    async fn tag_resource(
        &self,
        arn: &str,
        tags: &std::collections::BTreeMap<String, String>,
    ) -> CloudResult<()>;

    async fn create_snapshot_copy_configuration(&self, spec: &SnapshotCopySpec)
        -> CloudResult<()>;
}

/// Both scheduling backends: the rule-based event bus and the dedicated scheduler.
#[async_trait]
pub trait ScheduleService: Send + Sync {
    async fn list_rules(&self) -> CloudResult<Vec<RuleSummary>>;

    async fn list_rule_targets(&self, rule: &str) -> CloudResult<Vec<InvocationTarget>>;

    async fn list_schedule_groups(&self) -> CloudResult<Vec<String>>;

    async fn list_schedules(&self, group: &str) -> CloudResult<Vec<String>>;

    async fn get_schedule(&self, group: &str, name: &str) -> CloudResult<ScheduleDescription>;

    /// Returns the schedule ARN.
    async fn create_schedule(&self, spec: &ScheduleSpec) -> CloudResult<String>;

    /// Returns the schedule ARN.
    async fn update_schedule(&self, spec: &ScheduleSpec) -> CloudResult<String>;
}

/// Role management for the scheduler's execution identity.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn get_role(&self, name: &str) -> CloudResult<RoleInfo>;

    async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> CloudResult<RoleInfo>;

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> CloudResult<()>;
}

/// Everything the migration engine needs from the cloud.
pub trait ControlPlane: SourceWarehouse + ServerlessTarget + ScheduleService + IdentityService {}

impl<T> ControlPlane for T where T: SourceWarehouse + ServerlessTarget + ScheduleService + IdentityService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttling_is_transient() {
        assert!(CloudError::Throttled("slow down".into()).is_transient());
        assert!(!CloudError::NotFound("ns".into()).is_transient());
        assert!(!CloudError::Transport("reset".into()).is_transient());
        assert!(!CloudError::Service {
            code: "InternalFailure".into(),
            message: "boom".into()
        }
        .is_transient());
    }
}
