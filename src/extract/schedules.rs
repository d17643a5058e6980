use std::collections::HashSet;

use crate::config::types::{ScheduledTaskDefinition, TaskOrigin};
use crate::provider::models::{is_data_api_target, DataApiInput, InvocationTarget};

use super::{ConfigExtractor, ExtractionWarning};

/// Decode a data-API target's input if it runs against `cluster`.
fn input_for_cluster(target: &InvocationTarget, cluster: &str) -> Option<DataApiInput> {
    if !is_data_api_target(&target.arn) {
        return None;
    }
    let raw = target.input.as_deref().unwrap_or("{}");
    match serde_json::from_str::<DataApiInput>(raw) {
        Ok(input) if input.cluster_identifier.as_deref() == Some(cluster) => Some(input),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(target_arn = %target.arn, error = %e, "Unparseable target input");
            None
        }
    }
}

impl ConfigExtractor {
    /// Tasks defined as rules on the event bus.
    pub(super) async fn rule_tasks(
        &self,
        cluster: &str,
    ) -> Result<Vec<ScheduledTaskDefinition>, ExtractionWarning> {
        let rules = self
            .call("list_rules", || self.schedules.list_rules())
            .await
            .map_err(|e| ExtractionWarning::new("scheduled_tasks", format!("could not list rules: {}", e)))?;

        let mut tasks = Vec::new();
        for rule in rules {
            let targets = match self
                .call("list_rule_targets", || self.schedules.list_rule_targets(&rule.name))
                .await
            {
                Ok(targets) => targets,
                Err(e) => {
                    tracing::debug!(rule = %rule.name, error = %e, "Could not list rule targets");
                    continue;
                }
            };

            if let Some(input) = targets.iter().find_map(|t| input_for_cluster(t, cluster)) {
                tasks.push(ScheduledTaskDefinition {
                    name: rule.name.clone(),
                    schedule_expression: rule.schedule_expression.clone().unwrap_or_default(),
                    sql: input.sql,
                    database: input.database,
                    enabled: rule.enabled,
                    origin: TaskOrigin::Rule,
                });
            }
        }
        Ok(tasks)
    }

    /// Tasks defined in the dedicated scheduler, across all schedule groups.
    pub(super) async fn scheduler_tasks(
        &self,
        cluster: &str,
    ) -> Result<Vec<ScheduledTaskDefinition>, ExtractionWarning> {
        let warn = |what: &str, e: crate::provider::CloudError| {
            ExtractionWarning::new("scheduled_tasks", format!("could not {}: {}", what, e))
        };

        let groups = self
            .call("list_schedule_groups", || self.schedules.list_schedule_groups())
            .await
            .map_err(|e| warn("list schedule groups", e))?;

        let mut tasks = Vec::new();
        for group in groups {
            let names = self
                .call("list_schedules", || self.schedules.list_schedules(&group))
                .await
                .map_err(|e| warn("list schedules", e))?;

            for name in names {
                let schedule = match self
                    .call("get_schedule", || self.schedules.get_schedule(&group, &name))
                    .await
                {
                    Ok(schedule) => schedule,
                    Err(e) => {
                        tracing::debug!(group = %group, schedule = %name, error = %e, "Could not read schedule");
                        continue;
                    }
                };

                let input = schedule
                    .target
                    .as_ref()
                    .and_then(|t| input_for_cluster(t, cluster));
                if let Some(input) = input {
                    tasks.push(ScheduledTaskDefinition {
                        name: schedule.name,
                        schedule_expression: schedule.schedule_expression,
                        sql: input.sql,
                        database: input.database,
                        enabled: schedule.enabled,
                        origin: TaskOrigin::Scheduler,
                    });
                }
            }
        }
        Ok(tasks)
    }
}

/// Merge tasks from both backends, keeping the first definition of each name.
pub fn merge_tasks(
    rules: Vec<ScheduledTaskDefinition>,
    scheduler: Vec<ScheduledTaskDefinition>,
) -> Vec<ScheduledTaskDefinition> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .chain(scheduler)
        .filter(|task| seen.insert(task.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, origin: TaskOrigin) -> ScheduledTaskDefinition {
        ScheduledTaskDefinition {
            name: name.into(),
            schedule_expression: "rate(1 day)".into(),
            sql: "select 1".into(),
            database: "dev".into(),
            enabled: true,
            origin,
        }
    }

    #[test]
    fn rule_entries_win_on_duplicate_names() {
        let merged = merge_tasks(
            vec![task("a", TaskOrigin::Rule)],
            vec![task("a", TaskOrigin::Scheduler), task("b", TaskOrigin::Scheduler)],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].origin, TaskOrigin::Rule);
        assert_eq!(merged[1].name, "b");
    }

    #[test]
    fn matches_only_data_api_targets_for_cluster() {
        let target = InvocationTarget {
            arn: "arn:aws:redshift-data:us-east-1:123:cluster:c1".into(),
            input: Some(r#"{"ClusterIdentifier":"c1","Database":"dev","Sql":"select 1"}"#.into()),
        };
        assert!(input_for_cluster(&target, "c1").is_some());
        assert!(input_for_cluster(&target, "c2").is_none());

        let lambda = InvocationTarget {
            arn: "arn:aws:lambda:us-east-1:123:function:f".into(),
            input: target.input.clone(),
        };
        assert!(input_for_cluster(&lambda, "c1").is_none());

        let garbage = InvocationTarget {
            arn: "arn:aws:scheduler:::aws-sdk:redshiftdata:executeStatement".into(),
            input: Some("not json".into()),
        };
        assert!(input_for_cluster(&garbage, "c1").is_none());
    }
}
