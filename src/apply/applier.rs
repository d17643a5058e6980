use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::config::settings::Settings;
use crate::config::types::{ScheduledTaskDefinition, SnapshotCopyConfig, TargetResourceConfig};
use crate::error::{ErrorKind, MigrationError, Result};
use crate::executor::clock::Clock;
use crate::executor::orchestrator::Orchestrator;
use crate::executor::retry::with_backoff;
use crate::output::dry_run;
use crate::output::result::{MigrationReport, Outcome};
use crate::provider::models::{NamespaceUpdate, ResourceKind, SnapshotCopySpec, WorkgroupUpdate};
use crate::provider::{CloudError, CloudResult, ServerlessTarget};

use super::schedules::ScheduledTaskMigrator;

/// Pushes mapped settings onto an existing namespace/workgroup pair.
///
/// Each component runs regardless of whether the others failed.
pub struct ConfigApplier {
    target: Arc<dyn ServerlessTarget>,
    orchestrator: Orchestrator,
    tasks: ScheduledTaskMigrator,
    settings: Settings,
    clock: Arc<dyn Clock>,
    dry_run: bool,
}

impl ConfigApplier {
    pub fn new(
        target: Arc<dyn ServerlessTarget>,
        orchestrator: Orchestrator,
        tasks: ScheduledTaskMigrator,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            target,
            orchestrator,
            tasks,
            settings,
            clock,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self.orchestrator = self.orchestrator.with_dry_run(dry_run);
        self.tasks = self.tasks.with_dry_run(dry_run);
        self
    }

    async fn call<F, Fut, T>(&self, operation: &str, resource: &str, f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        with_backoff(&self.settings.retry, self.clock.as_ref(), operation, f)
            .await
            .map_err(|e| MigrationError::remote(operation, resource, e))
    }

    /// Apply every component and collect their outcomes.
    ///
    /// `scheduled_tasks` adds a `scheduled_tasks` entry; `snapshot_copy` adds a
    /// `snapshot_copy` entry. Both are omitted when `None`.
    pub async fn apply(
        &self,
        target: &TargetResourceConfig,
        scheduled_tasks: Option<&[ScheduledTaskDefinition]>,
        snapshot_copy: Option<&SnapshotCopyConfig>,
    ) -> MigrationReport {
        let mut report = MigrationReport::new(self.dry_run);

        report.insert("network", self.apply_network(target).await);
        report.insert("identity", self.apply_identity(target).await);
        report.insert("parameters", self.apply_parameters(target).await);
        report.insert("tags", self.apply_tags(target).await);

        if let Some(tasks) = scheduled_tasks {
            report.insert("scheduled_tasks", self.apply_scheduled_tasks(target, tasks).await);
        }
        if let Some(copy) = snapshot_copy {
            report.insert("snapshot_copy", self.apply_snapshot_copy(target, copy).await);
        }

        report
    }

    /// Turn a component's result into an outcome, attaching the shared detail.
    fn outcome(&self, live: &str, planned: &str, detail: Value, result: Result<()>) -> Outcome {
        if self.dry_run {
            return Outcome::dry_run(planned, detail);
        }
        match result {
            Ok(()) => Outcome::success(live, detail),
            Err(e) => {
                tracing::error!(error = %e, "Settings update failed");
                Outcome::error(e.kind(), e.to_string(), Some(detail))
            }
        }
    }

    async fn apply_network(&self, target: &TargetResourceConfig) -> Outcome {
        let detail = dry_run::network_detail(target);
        let name = &target.workgroup_name;
        let result = if self.dry_run {
            Ok(())
        } else {
            let update = WorkgroupUpdate {
                name: name.clone(),
                subnet_ids: Some(target.network.subnet_ids.clone()),
                security_group_ids: Some(target.network.security_group_ids.clone()),
                publicly_accessible: Some(target.network.publicly_accessible),
                config_parameters: None,
            };
            self.update_workgroup_and_settle(&update).await
        };
        self.outcome(
            &format!("Updated network settings on workgroup {}", name),
            &format!("Would update network settings on workgroup {}", name),
            detail,
            result,
        )
    }

    async fn apply_identity(&self, target: &TargetResourceConfig) -> Outcome {
        if target.iam_roles.is_empty() {
            return Outcome::skipped("No IAM roles to apply");
        }
        let detail = dry_run::identity_detail(target);
        let name = &target.namespace_name;
        let result = if self.dry_run {
            Ok(())
        } else {
            let update = NamespaceUpdate {
                name: name.clone(),
                iam_roles: target.iam_roles.clone(),
                default_iam_role: target.default_role().map(str::to_string),
            };
            self.call("update_namespace", name, || self.target.update_namespace(&update))
                .await
                .map(|_| ())
        };
        self.outcome(
            &format!("Attached {} IAM role(s) to namespace {}", target.iam_roles.len(), name),
            &format!("Would attach {} IAM role(s) to namespace {}", target.iam_roles.len(), name),
            detail,
            result,
        )
    }

    async fn apply_parameters(&self, target: &TargetResourceConfig) -> Outcome {
        if target.parameters.is_empty() {
            return Outcome::skipped("No compatible parameters to apply");
        }
        let detail = dry_run::parameters_detail(target);
        let name = &target.workgroup_name;
        let result = if self.dry_run {
            Ok(())
        } else {
            let update = WorkgroupUpdate {
                name: name.clone(),
                config_parameters: Some(target.parameters.clone()),
                ..Default::default()
            };
            self.update_workgroup_and_settle(&update).await
        };
        self.outcome(
            &format!("Applied {} parameter(s) to workgroup {}", target.parameters.len(), name),
            &format!("Would apply {} parameter(s) to workgroup {}", target.parameters.len(), name),
            detail,
            result,
        )
    }

    async fn apply_tags(&self, target: &TargetResourceConfig) -> Outcome {
        if target.tags.is_empty() {
            return Outcome::skipped("No tags to apply");
        }
        let detail = dry_run::tags_detail(target);
        let result = if self.dry_run {
            Ok(())
        } else {
            self.tag_pair(target).await
        };
        self.outcome(
            &format!("Tagged namespace {} and workgroup {}", target.namespace_name, target.workgroup_name),
            &format!("Would tag namespace {} and workgroup {}", target.namespace_name, target.workgroup_name),
            detail,
            result,
        )
    }

    async fn tag_pair(&self, target: &TargetResourceConfig) -> Result<()> {
        let namespace = self
            .call("get_namespace", &target.namespace_name, || {
                self.target.get_namespace(&target.namespace_name)
            })
            .await?;
        let workgroup = self
            .call("get_workgroup", &target.workgroup_name, || {
                self.target.get_workgroup(&target.workgroup_name)
            })
            .await?;

        for handle in [namespace, workgroup] {
            let arn = handle.arn.clone().ok_or_else(|| MigrationError::OperationFailed {
                resource: format!("{} '{}'", handle.kind, handle.identifier),
                reason: "no ARN reported, cannot tag".to_string(),
            })?;
            self.call("tag_resource", &handle.identifier, || {
                self.target.tag_resource(&arn, &target.tags)
            })
            .await?;
        }
        Ok(())
    }

    async fn apply_scheduled_tasks(
        &self,
        target: &TargetResourceConfig,
        tasks: &[ScheduledTaskDefinition],
    ) -> Outcome {
        if tasks.is_empty() {
            return Outcome::skipped("No scheduled tasks found on source");
        }

        let report = self
            .tasks
            .migrate(tasks, &target.workgroup_name, &self.settings.db_name, None)
            .await;
        let detail = serde_json::to_value(&report).unwrap_or(Value::Null);

        if self.dry_run {
            return Outcome::dry_run(
                format!("Would migrate {} scheduled task(s)", report.created.len()),
                detail,
            );
        }

        if report.failed.is_empty() {
            Outcome::success(
                format!(
                    "Migrated scheduled tasks: {} created, {} updated, {} skipped",
                    report.created.len(),
                    report.updated.len(),
                    report.skipped.len()
                ),
                detail,
            )
        } else {
            Outcome::error(
                ErrorKind::OperationFailed,
                format!("{} of {} scheduled task(s) failed", report.failed.len(), report.total()),
                Some(detail),
            )
        }
    }

    async fn apply_snapshot_copy(&self, target: &TargetResourceConfig, copy: &SnapshotCopyConfig) -> Outcome {
        let detail = dry_run::snapshot_copy_detail(&target.namespace_name, copy);
        let name = &target.namespace_name;

        if self.dry_run {
            return Outcome::dry_run(
                format!("Would configure snapshot copy to {}", copy.destination_region),
                detail,
            );
        }

        let spec = SnapshotCopySpec {
            namespace_name: name.clone(),
            destination_region: copy.destination_region.clone(),
            retention_period: copy.retention_period.and_then(|d| i32::try_from(d).ok()),
        };
        let created = with_backoff(
            &self.settings.retry,
            self.clock.as_ref(),
            "create_snapshot_copy_configuration",
            || self.target.create_snapshot_copy_configuration(&spec),
        )
        .await;

        match created {
            Ok(()) => Outcome::success(
                format!("Configured snapshot copy to {}", copy.destination_region),
                detail,
            ),
            Err(CloudError::Conflict(_)) => Outcome::success(
                format!("Snapshot copy to {} already configured", copy.destination_region),
                detail,
            ),
            Err(e) => {
                let err = MigrationError::remote("create_snapshot_copy_configuration", name, e);
                Outcome::error(err.kind(), err.to_string(), Some(detail))
            }
        }
    }

    /// Workgroup updates are asynchronous; wait for the workgroup to settle
    /// before the next update is issued.
    async fn update_workgroup_and_settle(&self, update: &WorkgroupUpdate) -> Result<()> {
        self.call("update_workgroup", &update.name, || self.target.update_workgroup(update))
            .await?;
        self.orchestrator
            .wait_for(ResourceKind::Workgroup, &update.name)
            .await?;
        Ok(())
    }
}
