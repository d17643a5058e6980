use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::config::settings::Settings;
use crate::config::types::ScheduledTaskDefinition;
use crate::error::{MigrationError, Result};
use crate::executor::clock::Clock;
use crate::executor::retry::with_backoff;
use crate::output::dry_run;
use crate::provider::models::{DataApiInput, ScheduleSpec, DATA_API_TARGET_ARN};
use crate::provider::{CloudError, CloudResult, IdentityService, ScheduleService};

const SCHEDULER_PRINCIPAL: &str = "scheduler.amazonaws.com";
const EXECUTION_POLICY_NAME: &str = "RedshiftDataAPIAccess";

// ─── Report ─────────────────────────────────────────────────────────────────

/// One task's line in a migration report. Unset fields serialize as null so
/// planned and live entries share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEntry {
    pub name: String,
    pub target_name: String,
    pub schedule_expression: String,
    pub database: String,
    pub enabled: bool,
    pub action: Option<String>,
    pub schedule_arn: Option<String>,
    pub error: Option<String>,
    pub reason: Option<String>,
}

impl TaskEntry {
    fn base(task: &ScheduledTaskDefinition, workgroup: &str) -> Self {
        Self {
            name: task.name.clone(),
            target_name: task.target_name(workgroup),
            schedule_expression: task.schedule_expression.clone(),
            database: task.database.clone(),
            enabled: task.enabled,
            action: None,
            schedule_arn: None,
            error: None,
            reason: None,
        }
    }

    pub fn planned(task: &ScheduledTaskDefinition, workgroup: &str, action: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            ..Self::base(task, workgroup)
        }
    }

    pub fn skipped(task: &ScheduledTaskDefinition, workgroup: &str, reason: String) -> Self {
        Self {
            reason: Some(reason),
            ..Self::base(task, workgroup)
        }
    }

    fn failed(task: &ScheduledTaskDefinition, workgroup: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::base(task, workgroup)
        }
    }

    /// Why a task cannot be migrated, if it cannot.
    pub fn skip_reason(task: &ScheduledTaskDefinition) -> Option<String> {
        if task.sql.trim().is_empty() {
            Some("task has no SQL text".to_string())
        } else if task.schedule_expression.trim().is_empty() {
            Some("task has no schedule expression".to_string())
        } else {
            None
        }
    }
}

/// Per-bucket results of a task migration. A task never appears in two buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskMigrationReport {
    pub created: Vec<TaskEntry>,
    pub updated: Vec<TaskEntry>,
    pub failed: Vec<TaskEntry>,
    pub skipped: Vec<TaskEntry>,
}

impl TaskMigrationReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len() + self.failed.len() + self.skipped.len()
    }
}

// ─── Migrator ───────────────────────────────────────────────────────────────

/// Replicates scheduled queries onto a workgroup through the scheduler service.
pub struct ScheduledTaskMigrator {
    schedules: Arc<dyn ScheduleService>,
    identity: Arc<dyn IdentityService>,
    settings: Settings,
    clock: Arc<dyn Clock>,
    dry_run: bool,
}

impl ScheduledTaskMigrator {
    pub fn new(
        schedules: Arc<dyn ScheduleService>,
        identity: Arc<dyn IdentityService>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            schedules,
            identity,
            settings,
            clock,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn call<F, Fut, T>(&self, operation: &str, f: F) -> CloudResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        with_backoff(&self.settings.retry, self.clock.as_ref(), operation, f).await
    }

    /// Create or update a schedule for each task on `workgroup`.
    ///
    /// `catalog` is used as the database for tasks that do not name one. When
    /// `execution_role` is `None` the scheduler role is looked up or created on
    /// first need.
    pub async fn migrate(
        &self,
        tasks: &[ScheduledTaskDefinition],
        workgroup: &str,
        catalog: &str,
        execution_role: Option<&str>,
    ) -> TaskMigrationReport {
        if self.dry_run {
            return dry_run::scheduled_tasks_plan(tasks, workgroup);
        }

        let mut report = TaskMigrationReport::default();
        let mut role: Option<std::result::Result<String, String>> =
            execution_role.map(|arn| Ok(arn.to_string()));

        for task in tasks {
            if let Some(reason) = TaskEntry::skip_reason(task) {
                tracing::warn!(task = %task.name, reason = %reason, "Skipping scheduled task");
                report.skipped.push(TaskEntry::skipped(task, workgroup, reason));
                continue;
            }

            if role.is_none() {
                role = Some(self.ensure_execution_role().await.map_err(|e| e.to_string()));
            }
            let role_arn = match &role {
                Some(Ok(arn)) => arn.clone(),
                Some(Err(e)) => {
                    report.failed.push(TaskEntry::failed(
                        task,
                        workgroup,
                        format!("execution role unavailable: {}", e),
                    ));
                    continue;
                }
                None => continue,
            };

            let spec = match self.schedule_spec(task, workgroup, catalog, &role_arn) {
                Ok(spec) => spec,
                Err(e) => {
                    report.failed.push(TaskEntry::failed(task, workgroup, e.to_string()));
                    continue;
                }
            };

            match self.create_or_update(&spec).await {
                Ok((action, arn)) => {
                    let entry = TaskEntry {
                        schedule_arn: Some(arn),
                        ..TaskEntry::planned(task, workgroup, action)
                    };
                    tracing::info!(task = %task.name, schedule = %spec.name, action = action, "Migrated scheduled task");
                    if action == "updated" {
                        report.updated.push(entry);
                    } else {
                        report.created.push(entry);
                    }
                }
                Err(e) => {
                    tracing::error!(task = %task.name, schedule = %spec.name, error = %e, "Failed to migrate scheduled task");
                    report.failed.push(TaskEntry::failed(task, workgroup, e.to_string()));
                }
            }
        }

        report
    }

    /// A name conflict means the schedule already exists; update it with the same definition.
    async fn create_or_update(&self, spec: &ScheduleSpec) -> Result<(&'static str, String)> {
        match self.call("create_schedule", || self.schedules.create_schedule(spec)).await {
            Ok(arn) => Ok(("created", arn)),
            Err(CloudError::Conflict(_)) => {
                tracing::debug!(schedule = %spec.name, "Schedule exists, updating");
                let arn = self
                    .call("update_schedule", || self.schedules.update_schedule(spec))
                    .await
                    .map_err(|e| MigrationError::remote("update_schedule", &spec.name, e))?;
                Ok(("updated", arn))
            }
            Err(e) => Err(MigrationError::remote("create_schedule", &spec.name, e)),
        }
    }

    fn schedule_spec(
        &self,
        task: &ScheduledTaskDefinition,
        workgroup: &str,
        catalog: &str,
        role_arn: &str,
    ) -> Result<ScheduleSpec> {
        let database = if task.database.is_empty() {
            catalog.to_string()
        } else {
            task.database.clone()
        };
        let input = serde_json::to_string(&DataApiInput {
            cluster_identifier: None,
            workgroup_name: Some(workgroup.to_string()),
            database,
            sql: task.sql.clone(),
        })?;

        Ok(ScheduleSpec {
            name: task.target_name(workgroup),
            schedule_expression: task.schedule_expression.clone(),
            enabled: task.enabled,
            target_arn: DATA_API_TARGET_ARN.to_string(),
            role_arn: role_arn.to_string(),
            input,
            description: format!("Migrated from provisioned cluster - {}", task.name),
        })
    }

    /// Get-or-create the role the scheduler assumes to run statements.
    pub async fn ensure_execution_role(&self) -> Result<String> {
        let name = self.settings.execution_role_name.as_str();

        match self.call("get_role", || self.identity.get_role(name)).await {
            Ok(role) => return Ok(role.arn),
            Err(CloudError::NotFound(_)) => {}
            Err(e) => return Err(MigrationError::remote("get_role", name, e)),
        }

        tracing::info!(role = name, "Creating scheduler execution role");
        let trust_policy = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"Service": SCHEDULER_PRINCIPAL},
                "Action": "sts:AssumeRole",
            }],
        })
        .to_string();

        let role = match self
            .call("create_role", || {
                self.identity.create_role(
                    name,
                    &trust_policy,
                    "Role for EventBridge Scheduler to execute Redshift queries",
                )
            })
            .await
        {
            Ok(role) => role,
            Err(CloudError::Conflict(_)) => self
                .call("get_role", || self.identity.get_role(name))
                .await
                .map_err(|e| MigrationError::remote("get_role", name, e))?,
            Err(e) => return Err(MigrationError::remote("create_role", name, e)),
        };

        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": [
                    "redshift-data:ExecuteStatement",
                    "redshift-data:DescribeStatement",
                    "redshift-data:GetStatementResult",
                ],
                "Resource": "*",
            }],
        })
        .to_string();

        self.call("put_role_policy", || {
            self.identity.put_role_policy(name, EXECUTION_POLICY_NAME, &policy)
        })
        .await
        .map_err(|e| MigrationError::remote("put_role_policy", name, e))?;

        Ok(role.arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, sql: &str, schedule: &str) -> ScheduledTaskDefinition {
        ScheduledTaskDefinition {
            name: name.into(),
            schedule_expression: schedule.into(),
            sql: sql.into(),
            database: "dev".into(),
            enabled: true,
            origin: Default::default(),
        }
    }

    #[test]
    fn skip_reasons() {
        assert!(TaskEntry::skip_reason(&task("a", "select 1", "rate(1 day)")).is_none());
        assert!(TaskEntry::skip_reason(&task("a", "  ", "rate(1 day)")).is_some());
        assert!(TaskEntry::skip_reason(&task("a", "select 1", "")).is_some());
    }

    #[test]
    fn dry_run_plan_marks_would_create() {
        let tasks = vec![task("nightly", "vacuum", "cron(0 3 * * ? *)"), task("empty", "", "rate(1 hour)")];
        let plan = dry_run::scheduled_tasks_plan(&tasks, "wg");
        assert_eq!(plan.created.len(), 1);
        assert_eq!(plan.created[0].action.as_deref(), Some("would-create"));
        assert_eq!(plan.created[0].target_name, "wg-nightly");
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.total(), 2);
    }
}
