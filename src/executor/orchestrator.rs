use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::settings::Settings;
use crate::config::types::NetworkConfig;
use crate::error::{MigrationError, Result};
use crate::output::dry_run::{self, DryRunEnvelope};
use crate::provider::models::{
    LifecycleState, NamespaceSpec, ResourceHandle, ResourceKind, RestoreRequest,
    SnapshotDescription, WorkgroupSpec,
};
use crate::provider::{CloudError, CloudResult, ServerlessTarget, SourceWarehouse};

use super::clock::Clock;
use super::credentials::generate_admin_password;
use super::retry::with_backoff;
use super::waiter::Waiter;

// ─── Requests & Results ─────────────────────────────────────────────────────

/// Everything needed to provision a namespace/workgroup pair.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionRequest {
    pub source_id: String,
    pub namespace_name: String,
    pub workgroup_name: String,
    pub network: NetworkConfig,
    pub max_capacity: i32,
    /// Default role first.
    pub iam_roles: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub admin_username: String,
    #[serde(skip)]
    pub admin_password: Option<String>,
}

/// Which existing snapshot to restore from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRef {
    Named(String),
    /// Most recent manual snapshot of the source cluster.
    Latest,
}

impl SnapshotRef {
    pub fn describe(&self) -> String {
        match self {
            SnapshotRef::Named(name) => name.clone(),
            SnapshotRef::Latest => "latest".to_string(),
        }
    }
}

/// A live result, or what would have been done.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Provisioned<T> {
    Live(T),
    DryRun(DryRunEnvelope),
}

impl<T> Provisioned<T> {
    pub fn into_live(self) -> Option<T> {
        match self {
            Provisioned::Live(value) => Some(value),
            Provisioned::DryRun(_) => None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Provisioned::DryRun(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub snapshot_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
}

/// Result of snapshot → namespace → workgroup → restore.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRestoreOutcome {
    pub status: &'static str,
    pub snapshot: SnapshotInfo,
    pub namespace: ResourceHandle,
    pub workgroup: ResourceHandle,
    pub message: String,
}

/// Result of a restore from an existing snapshot. Handles are still pending;
/// roles and tags are applied later by a settings pass.
#[derive(Debug, Clone, Serialize)]
pub struct ExistingSnapshotOutcome {
    pub status: &'static str,
    pub snapshot: SnapshotInfo,
    pub namespace: ResourceHandle,
    pub workgroup: ResourceHandle,
    pub iam_roles_pending: Vec<String>,
    pub tags_pending: BTreeMap<String, String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureStatus {
    Created,
    Exists,
}

/// Result of an idempotent get-or-create.
#[derive(Debug, Clone, Serialize)]
pub struct EnsureOutcome {
    pub status: EnsureStatus,
    pub handle: ResourceHandle,
    pub message: String,
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

/// Drives target resources through their lifecycle, one stage at a time.
///
/// Every stage blocks until its poll resolves before the next begins. Nothing
/// already created is rolled back when a later stage fails.
pub struct Orchestrator {
    source: Arc<dyn SourceWarehouse>,
    target: Arc<dyn ServerlessTarget>,
    settings: Settings,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    dry_run: bool,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn SourceWarehouse>,
        target: Arc<dyn ServerlessTarget>,
        settings: Settings,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            settings,
            clock,
            cancel,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn waiter(&self) -> Waiter {
        Waiter::new(self.clock.clone(), self.cancel.clone(), self.settings.retry)
    }

    /// Run a control-plane call with throttling backoff, wrapping failures with context.
    async fn call<F, Fut, T>(&self, operation: &str, resource: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        with_backoff(&self.settings.retry, self.clock.as_ref(), operation, f)
            .await
            .map_err(|e| MigrationError::remote(operation, resource, e))
    }

    /// Deterministic per-invocation snapshot name: `{source}-migration-{UTC timestamp}`.
    pub fn snapshot_name(&self, source_id: &str) -> String {
        format!(
            "{}-migration-{}",
            source_id,
            self.clock.utc_now().format("%Y%m%d-%H%M%S")
        )
    }

    /// Block until the named resource is AVAILABLE.
    pub async fn wait_for(&self, kind: ResourceKind, name: &str) -> Result<ResourceHandle> {
        let policy = self.settings.poll_policy(kind);
        let waiter = self.waiter();
        match kind {
            ResourceKind::Snapshot => {
                let source = self.source.clone();
                waiter
                    .wait_until_available(kind, name, policy, || {
                        let source = source.clone();
                        let name = name.to_string();
                        async move { source.describe_snapshot(&name).await.map(|s| s.handle()) }
                    })
                    .await
            }
            ResourceKind::Namespace => {
                let target = self.target.clone();
                waiter
                    .wait_until_available(kind, name, policy, || {
                        let target = target.clone();
                        let name = name.to_string();
                        async move { target.get_namespace(&name).await }
                    })
                    .await
            }
            ResourceKind::Workgroup => {
                let target = self.target.clone();
                waiter
                    .wait_until_available(kind, name, policy, || {
                        let target = target.clone();
                        let name = name.to_string();
                        async move { target.get_workgroup(&name).await }
                    })
                    .await
            }
        }
    }

    /// Identifier of the most recent manual snapshot of a cluster, if any.
    pub async fn latest_snapshot(&self, source_id: &str) -> Result<Option<String>> {
        let snapshots = self
            .call("list_manual_snapshots", source_id, || {
                self.source.list_manual_snapshots(source_id)
            })
            .await?;

        Ok(snapshots
            .into_iter()
            .max_by_key(|s| s.created_at)
            .map(|s| s.identifier))
    }

    // ─── A. Snapshot and Restore ────────────────────────────────────────────

    /// Snapshot the source, create an empty namespace and workgroup, then
    /// restore the snapshot into them.
    ///
    /// Any failure aborts the remaining stages.
    pub async fn create_snapshot_and_restore(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Provisioned<SnapshotRestoreOutcome>> {
        let snapshot_name = self.snapshot_name(&request.source_id);

        if self.dry_run {
            return Ok(Provisioned::DryRun(DryRunEnvelope::new(
                "create_snapshot_and_restore",
                dry_run::provision_inputs(request, Some(&snapshot_name)),
            )));
        }

        tracing::info!(cluster = %request.source_id, snapshot = %snapshot_name, "Creating snapshot");
        self.call("create_snapshot", &snapshot_name, || {
            self.source.create_snapshot(&request.source_id, &snapshot_name)
        })
        .await?;
        let snapshot = self.wait_for(ResourceKind::Snapshot, &snapshot_name).await?;

        self.create_namespace(request).await?;
        self.wait_for(ResourceKind::Namespace, &request.namespace_name).await?;

        self.create_workgroup(request).await?;
        let workgroup = self.wait_for(ResourceKind::Workgroup, &request.workgroup_name).await?;

        let snapshot_arn = snapshot.arn.clone().ok_or_else(|| MigrationError::OperationFailed {
            resource: format!("snapshot '{}'", snapshot_name),
            reason: "no ARN reported for available snapshot".to_string(),
        })?;

        tracing::info!(namespace = %request.namespace_name, snapshot_arn = %snapshot_arn, "Restoring snapshot into namespace");
        let restore = RestoreRequest {
            namespace_name: request.namespace_name.clone(),
            workgroup_name: request.workgroup_name.clone(),
            snapshot_arn: snapshot_arn.clone(),
        };
        self.call("restore_from_snapshot", &request.namespace_name, || {
            self.target.restore_from_snapshot(&restore)
        })
        .await?;
        let namespace = self.wait_for(ResourceKind::Namespace, &request.namespace_name).await?;

        Ok(Provisioned::Live(SnapshotRestoreOutcome {
            status: "success",
            snapshot: SnapshotInfo {
                snapshot_identifier: snapshot_name,
                arn: Some(snapshot_arn),
            },
            namespace,
            workgroup,
            message: format!(
                "Successfully created and restored to {}",
                request.namespace_name
            ),
        }))
    }

    // ─── B. Restore From Existing Snapshot ──────────────────────────────────

    /// Restore an existing snapshot; the service provisions the namespace and
    /// workgroup together. Returns without waiting for them.
    pub async fn create_from_existing_snapshot(
        &self,
        request: &ProvisionRequest,
        snapshot: &SnapshotRef,
    ) -> Result<Provisioned<ExistingSnapshotOutcome>> {
        if self.dry_run {
            return Ok(Provisioned::DryRun(DryRunEnvelope::new(
                "create_from_snapshot",
                dry_run::provision_inputs(request, Some(&snapshot.describe())),
            )));
        }

        let snapshot = self.resolve_snapshot(&request.source_id, snapshot).await?;
        let snapshot_arn = snapshot
            .arn
            .clone()
            .ok_or_else(|| MigrationError::not_found("snapshot ARN", &snapshot.identifier))?;

        if snapshot.cluster_identifier.as_deref() == Some(request.namespace_name.as_str()) {
            tracing::warn!(
                namespace = %request.namespace_name,
                "Namespace name matches the snapshot's source cluster; the restore may conflict"
            );
        }

        let restore = RestoreRequest {
            namespace_name: request.namespace_name.clone(),
            workgroup_name: request.workgroup_name.clone(),
            snapshot_arn: snapshot_arn.clone(),
        };
        let restored = self
            .call("restore_from_snapshot", &request.namespace_name, || {
                self.target.restore_from_snapshot(&restore)
            })
            .await?;

        tracing::info!(
            namespace = %restored.namespace.identifier,
            namespace_state = %restored.namespace.state,
            workgroup_state = %restored.workgroup.state,
            "Restore initiated"
        );

        Ok(Provisioned::Live(ExistingSnapshotOutcome {
            status: "created",
            snapshot: SnapshotInfo {
                snapshot_identifier: snapshot.identifier.clone(),
                arn: Some(snapshot_arn),
            },
            namespace: restored.namespace,
            workgroup: restored.workgroup,
            iam_roles_pending: request.iam_roles.clone(),
            tags_pending: request.tags.clone(),
            message: format!("Created from snapshot {}", snapshot.identifier),
        }))
    }

    async fn resolve_snapshot(
        &self,
        source_id: &str,
        snapshot: &SnapshotRef,
    ) -> Result<SnapshotDescription> {
        let identifier = match snapshot {
            SnapshotRef::Named(name) => name.clone(),
            SnapshotRef::Latest => self
                .latest_snapshot(source_id)
                .await?
                .ok_or_else(|| MigrationError::not_found("manual snapshot of cluster", source_id))?,
        };

        match with_backoff(&self.settings.retry, self.clock.as_ref(), "describe_snapshot", || {
            self.source.describe_snapshot(&identifier)
        })
        .await
        {
            Ok(description) => Ok(description),
            Err(CloudError::NotFound(_)) => Err(MigrationError::not_found("snapshot", &identifier)),
            Err(e) => Err(MigrationError::remote("describe_snapshot", &identifier, e)),
        }
    }

    // ─── C. Ensure Exists ───────────────────────────────────────────────────

    /// Get-or-create the namespace. An existing namespace in any state is left alone.
    pub async fn ensure_namespace_exists(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Provisioned<EnsureOutcome>> {
        if self.dry_run {
            return Ok(Provisioned::DryRun(DryRunEnvelope::new(
                "create_namespace",
                dry_run::namespace_inputs(request),
            )));
        }

        let name = &request.namespace_name;
        if let Some(existing) = self
            .lookup(ResourceKind::Namespace, name, || self.target.get_namespace(name))
            .await?
        {
            return Ok(Provisioned::Live(EnsureOutcome {
                status: EnsureStatus::Exists,
                handle: existing,
                message: format!("Namespace {} already exists", name),
            }));
        }

        let (status, handle) = self.create_namespace(request).await?;
        Ok(Provisioned::Live(EnsureOutcome {
            status,
            message: match status {
                EnsureStatus::Created => format!("Namespace {} created successfully", name),
                EnsureStatus::Exists => format!("Namespace {} already exists", name),
            },
            handle,
        }))
    }

    /// Get-or-create the workgroup. An existing workgroup in any state is left alone.
    pub async fn ensure_workgroup_exists(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Provisioned<EnsureOutcome>> {
        if self.dry_run {
            return Ok(Provisioned::DryRun(DryRunEnvelope::new(
                "create_workgroup",
                dry_run::workgroup_inputs(request, self.settings.price_performance_level),
            )));
        }

        let name = &request.workgroup_name;
        if let Some(existing) = self
            .lookup(ResourceKind::Workgroup, name, || self.target.get_workgroup(name))
            .await?
        {
            return Ok(Provisioned::Live(EnsureOutcome {
                status: EnsureStatus::Exists,
                handle: existing,
                message: format!("Workgroup {} already exists", name),
            }));
        }

        let (status, handle) = self.create_workgroup(request).await?;
        Ok(Provisioned::Live(EnsureOutcome {
            status,
            message: match status {
                EnsureStatus::Created => format!(
                    "Workgroup {} created with price-performance target {}",
                    name, self.settings.price_performance_level
                ),
                EnsureStatus::Exists => format!("Workgroup {} already exists", name),
            },
            handle,
        }))
    }

    /// Fresh read of a resource; `None` when it does not exist.
    async fn lookup<F, Fut>(&self, kind: ResourceKind, name: &str, f: F) -> Result<Option<ResourceHandle>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<ResourceHandle>>,
    {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        let operation = format!("get_{}", kind);
        match with_backoff(&self.settings.retry, self.clock.as_ref(), &operation, f).await {
            Ok(handle) if handle.state != LifecycleState::Absent => Ok(Some(handle)),
            Ok(_) => Ok(None),
            Err(CloudError::NotFound(_)) => Ok(None),
            Err(e) => Err(MigrationError::remote(&operation, name, e)),
        }
    }

    async fn create_namespace(&self, request: &ProvisionRequest) -> Result<(EnsureStatus, ResourceHandle)> {
        let spec = NamespaceSpec {
            name: request.namespace_name.clone(),
            admin_username: request.admin_username.clone(),
            admin_password: Some(
                request
                    .admin_password
                    .clone()
                    .unwrap_or_else(generate_admin_password),
            ),
            db_name: self.settings.db_name.clone(),
            iam_roles: request.iam_roles.clone(),
            default_iam_role: request.iam_roles.first().cloned(),
            tags: request.tags.clone(),
        };

        tracing::info!(namespace = %spec.name, "Creating namespace");
        let created = with_backoff(&self.settings.retry, self.clock.as_ref(), "create_namespace", || {
            self.target.create_namespace(&spec)
        })
        .await;
        self.adopt_on_conflict(ResourceKind::Namespace, &spec.name, created)
    }

    async fn create_workgroup(&self, request: &ProvisionRequest) -> Result<(EnsureStatus, ResourceHandle)> {
        let spec = WorkgroupSpec {
            name: request.workgroup_name.clone(),
            namespace_name: request.namespace_name.clone(),
            subnet_ids: request.network.subnet_ids.clone(),
            security_group_ids: request.network.security_group_ids.clone(),
            publicly_accessible: request.network.publicly_accessible,
            max_capacity: request.max_capacity,
            price_performance_level: self.settings.price_performance_level,
            config_parameters: Vec::new(),
            tags: request.tags.clone(),
        };

        tracing::info!(workgroup = %spec.name, namespace = %spec.namespace_name, max_capacity = spec.max_capacity, "Creating workgroup");
        let created = with_backoff(&self.settings.retry, self.clock.as_ref(), "create_workgroup", || {
            self.target.create_workgroup(&spec)
        })
        .await;
        self.adopt_on_conflict(ResourceKind::Workgroup, &spec.name, created)
    }

    /// A create that lost a race to an existing resource is an idempotent no-op.
    fn adopt_on_conflict(
        &self,
        kind: ResourceKind,
        name: &str,
        created: CloudResult<ResourceHandle>,
    ) -> Result<(EnsureStatus, ResourceHandle)> {
        match created {
            Ok(handle) => Ok((EnsureStatus::Created, handle)),
            Err(CloudError::Conflict(_)) => {
                tracing::warn!(kind = %kind, name = name, "Resource already exists, continuing with it");
                Ok((
                    EnsureStatus::Exists,
                    ResourceHandle::new(kind, name, LifecycleState::Creating),
                ))
            }
            Err(e) => Err(MigrationError::remote(&format!("create_{}", kind), name, e)),
        }
    }
}
