pub mod schedules;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::settings::Settings;
use crate::config::types::{
    IamRoleRef, NetworkConfig, ParameterGroup, ParameterSetting, SnapshotSchedule,
    SourceResourceConfig, UsageLimit, ENGINE_DEFAULT_SOURCE,
};
use crate::error::{MigrationError, Result};
use crate::executor::clock::Clock;
use crate::executor::retry::with_backoff;
use crate::mapping::parameters::classify;
use crate::provider::models::ClusterDescription;
use crate::provider::{CloudError, CloudResult, ScheduleService, SourceWarehouse};

/// A sub-extraction that failed and was degraded to an empty value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{component}: {message}")]
pub struct ExtractionWarning {
    pub component: &'static str,
    pub message: String,
}

impl ExtractionWarning {
    pub fn new(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
        }
    }
}

/// An extracted config together with whatever could not be read.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub config: SourceResourceConfig,
    pub warnings: Vec<ExtractionWarning>,
}

/// Reads a provisioned cluster's settings into a `SourceResourceConfig`.
pub struct ConfigExtractor {
    source: Arc<dyn SourceWarehouse>,
    schedules: Arc<dyn ScheduleService>,
    settings: Settings,
    clock: Arc<dyn Clock>,
}

impl ConfigExtractor {
    pub fn new(
        source: Arc<dyn SourceWarehouse>,
        schedules: Arc<dyn ScheduleService>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            schedules,
            settings,
            clock,
        }
    }

    async fn call<F, Fut, T>(&self, operation: &str, f: F) -> CloudResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        with_backoff(&self.settings.retry, self.clock.as_ref(), operation, f).await
    }

    pub async fn extract(&self, cluster_id: &str) -> Result<SourceResourceConfig> {
        Ok(self.extract_with_warnings(cluster_id).await?.config)
    }

    /// Extract everything readable. Only a missing cluster is fatal; any other
    /// failed sub-extraction leaves its field empty and adds a warning.
    pub async fn extract_with_warnings(&self, cluster_id: &str) -> Result<Extraction> {
        let cluster = match self
            .call("describe_cluster", || self.source.describe_cluster(cluster_id))
            .await
        {
            Ok(cluster) => cluster,
            Err(CloudError::NotFound(_)) => return Err(MigrationError::not_found("cluster", cluster_id)),
            Err(e) => return Err(MigrationError::remote("describe_cluster", cluster_id, e)),
        };

        let mut warnings = Vec::new();
        let mut degrade = |w: ExtractionWarning| {
            tracing::warn!(cluster = cluster_id, component = w.component, warning = %w.message, "Partial extraction");
            warnings.push(w);
        };

        let network = match self.network(&cluster).await {
            Ok(network) => network,
            Err(w) => {
                degrade(w);
                NetworkConfig {
                    vpc_id: cluster.vpc_id.clone(),
                    subnet_ids: Vec::new(),
                    security_group_ids: cluster.security_group_ids.clone(),
                    publicly_accessible: cluster.publicly_accessible,
                }
            }
        };

        let mut config = SourceResourceConfig::new(cluster_id, network);
        config.iam_roles = iam_roles(&cluster);
        config.tags = cluster.tags.clone();
        config.maintenance_window = cluster.maintenance_window.clone();
        config.maintenance_track = cluster.maintenance_track.clone();
        config.snapshot_copy = cluster.snapshot_copy.clone();

        if let Some(group) = cluster.parameter_group_name.as_deref() {
            match self.parameter_group(group).await {
                Ok(pg) => config.parameter_group = Some(pg),
                Err(w) => degrade(w),
            }
        }

        let rule_tasks = self.rule_tasks(cluster_id).await.unwrap_or_else(|w| {
            degrade(w);
            Vec::new()
        });
        let scheduler_tasks = self.scheduler_tasks(cluster_id).await.unwrap_or_else(|w| {
            degrade(w);
            Vec::new()
        });
        config.scheduled_tasks = schedules::merge_tasks(rule_tasks, scheduler_tasks);

        match self.usage_limits(cluster_id).await {
            Ok(limits) => config.usage_limits = limits,
            Err(w) => degrade(w),
        }
        match self.snapshot_schedules(cluster_id).await {
            Ok(schedules) => config.snapshot_schedules = schedules,
            Err(w) => degrade(w),
        }

        if let Some(pg) = &config.parameter_group {
            for warning in classify(&pg.parameters).warnings {
                tracing::info!(cluster = cluster_id, "{}", warning);
            }
        }

        tracing::info!(
            cluster = cluster_id,
            roles = config.iam_roles.len(),
            scheduled_tasks = config.scheduled_tasks.len(),
            warnings = warnings.len(),
            "Extracted source configuration"
        );

        Ok(Extraction { config, warnings })
    }

    async fn network(&self, cluster: &ClusterDescription) -> std::result::Result<NetworkConfig, ExtractionWarning> {
        let subnet_ids = match cluster.subnet_group_name.as_deref() {
            Some(group) => self
                .call("describe_subnet_group", || self.source.describe_subnet_group(group))
                .await
                .map_err(|e| ExtractionWarning::new("network", format!("subnet group {}: {}", group, e)))?,
            None => Vec::new(),
        };

        Ok(NetworkConfig {
            vpc_id: cluster.vpc_id.clone(),
            subnet_ids,
            security_group_ids: cluster.security_group_ids.clone(),
            publicly_accessible: cluster.publicly_accessible,
        })
    }

    /// Group metadata plus its user-set parameters. Engine defaults and
    /// valueless parameters are dropped.
    async fn parameter_group(&self, name: &str) -> std::result::Result<ParameterGroup, ExtractionWarning> {
        let warn = |e: CloudError| ExtractionWarning::new("parameter_group", format!("{}: {}", name, e));

        let group = self
            .call("describe_parameter_group", || self.source.describe_parameter_group(name))
            .await
            .map_err(warn)?;
        let listed = self
            .call("describe_parameters", || self.source.describe_parameters(name))
            .await
            .map_err(warn)?;

        let parameters: BTreeMap<String, ParameterSetting> = listed
            .into_iter()
            .filter(|p| p.source.as_deref() != Some(ENGINE_DEFAULT_SOURCE))
            .filter_map(|p| {
                let value = p.value.filter(|v| !v.is_empty())?;
                Some((
                    p.name,
                    ParameterSetting {
                        value,
                        data_type: p.data_type,
                        source: p.source,
                        is_modifiable: p.is_modifiable,
                        description: p.description,
                    },
                ))
            })
            .collect();

        Ok(ParameterGroup {
            name: group.name,
            family: group.family,
            description: group.description,
            parameters,
            tags: group.tags,
        })
    }

    async fn usage_limits(&self, cluster: &str) -> std::result::Result<Vec<UsageLimit>, ExtractionWarning> {
        self.call("describe_usage_limits", || self.source.describe_usage_limits(cluster))
            .await
            .map_err(|e| ExtractionWarning::new("usage_limits", e.to_string()))
    }

    async fn snapshot_schedules(&self, cluster: &str) -> std::result::Result<Vec<SnapshotSchedule>, ExtractionWarning> {
        self.call("describe_snapshot_schedules", || self.source.describe_snapshot_schedules(cluster))
            .await
            .map_err(|e| ExtractionWarning::new("snapshot_schedules", e.to_string()))
    }
}

fn iam_roles(cluster: &ClusterDescription) -> Vec<IamRoleRef> {
    cluster
        .iam_role_arns
        .iter()
        .map(|arn| IamRoleRef {
            role_arn: arn.clone(),
            is_default: cluster.default_iam_role_arn.as_deref() == Some(arn.as_str()),
        })
        .collect()
}
