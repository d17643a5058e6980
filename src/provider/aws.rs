//! Control-plane adapter backed by the AWS SDK.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_redshift::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use tracing::debug;

use crate::config::types::{SnapshotCopyConfig, SnapshotSchedule, UsageLimit};

use super::models::{
    ClusterDescription, ClusterParameter, InvocationTarget, LifecycleState, NamespaceSpec,
    NamespaceUpdate, ParameterGroupDescription, ResourceHandle, ResourceKind, RestoreOutcome,
    RestoreRequest, RoleInfo, RuleSummary, ScheduleDescription, ScheduleSpec, SnapshotCopySpec,
    SnapshotDescription, WorkgroupSpec, WorkgroupUpdate,
};
use super::{
    CloudError, CloudResult, IdentityService, ScheduleService, ServerlessTarget, SourceWarehouse,
};

/// One client per service, sharing a single loaded SDK config.
pub struct AwsControlPlane {
    region: String,
    redshift: aws_sdk_redshift::Client,
    serverless: aws_sdk_redshiftserverless::Client,
    events: aws_sdk_eventbridge::Client,
    scheduler: aws_sdk_scheduler::Client,
    iam: aws_sdk_iam::Client,
}

impl AwsControlPlane {
    /// Load credentials and region from the environment; `region` overrides it.
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let config = loader.load().await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        debug!(region = %region, "Loaded AWS configuration");

        Self {
            region,
            redshift: aws_sdk_redshift::Client::new(&config),
            serverless: aws_sdk_redshiftserverless::Client::new(&config),
            events: aws_sdk_eventbridge::Client::new(&config),
            scheduler: aws_sdk_scheduler::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

// ─── Error Classification ───────────────────────────────────────────────────

/// Map an SDK error onto the control-plane error taxonomy by its error code.
fn classify<E, R>(err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug,
{
    if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
        return CloudError::Transport(DisplayErrorContext(&err).to_string());
    }

    let code = err.code().unwrap_or_default().to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    if code.contains("NotFound") || code == "NoSuchEntity" {
        CloudError::NotFound(message)
    } else if code.contains("AlreadyExists") || code == "ConflictException" {
        CloudError::Conflict(message)
    } else if code.contains("Throttl") || code == "TooManyRequestsException" || code == "RequestLimitExceeded" {
        CloudError::Throttled(message)
    } else if code.contains("AccessDenied") || code == "UnauthorizedOperation" {
        CloudError::AccessDenied(message)
    } else {
        CloudError::Service { code, message }
    }
}

fn invalid_request(err: impl std::fmt::Display) -> CloudError {
    CloudError::Service {
        code: "InvalidRequest".to_string(),
        message: err.to_string(),
    }
}

// ─── Field Access ───────────────────────────────────────────────────────────

/// Uniform access to SDK string fields, whether modelled as required or optional.
trait FieldText {
    fn text(self) -> String;
}

impl FieldText for &str {
    fn text(self) -> String {
        self.to_string()
    }
}

impl FieldText for Option<&str> {
    fn text(self) -> String {
        self.unwrap_or_default().to_string()
    }
}

/// Uniform access to SDK nested structures, whether modelled as required or optional.
trait FieldRef<'a, T> {
    fn present(self) -> Option<&'a T>;
}

impl<'a, T> FieldRef<'a, T> for &'a T {
    fn present(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T> FieldRef<'a, T> for Option<&'a T> {
    fn present(self) -> Option<&'a T> {
        self
    }
}

fn to_utc(ts: &aws_sdk_redshift::primitives::DateTime) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

fn serverless_tags(
    tags: &BTreeMap<String, String>,
) -> CloudResult<Vec<aws_sdk_redshiftserverless::types::Tag>> {
    tags.iter()
        .map(|(k, v)| {
            aws_sdk_redshiftserverless::types::Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(invalid_request)
        })
        .collect()
}

fn namespace_handle(ns: &aws_sdk_redshiftserverless::types::Namespace) -> ResourceHandle {
    let state = ns
        .status()
        .map(|s| LifecycleState::from_remote(s.as_str()))
        .unwrap_or(LifecycleState::Creating);
    ResourceHandle::new(ResourceKind::Namespace, &ns.namespace_name().text(), state)
        .with_arn(Some(ns.namespace_arn().text()).filter(|a| !a.is_empty()))
}

fn workgroup_handle(wg: &aws_sdk_redshiftserverless::types::Workgroup) -> ResourceHandle {
    let state = wg
        .status()
        .map(|s| LifecycleState::from_remote(s.as_str()))
        .unwrap_or(LifecycleState::Creating);
    ResourceHandle::new(ResourceKind::Workgroup, &wg.workgroup_name().text(), state)
        .with_arn(Some(wg.workgroup_arn().text()).filter(|a| !a.is_empty()))
}

impl AwsControlPlane {
    fn snapshot_description(&self, s: &aws_sdk_redshift::types::Snapshot) -> SnapshotDescription {
        let identifier = s.snapshot_identifier().text();
        let cluster = s.cluster_identifier().map(str::to_string);
        let arn = s.snapshot_arn().map(str::to_string).or_else(|| {
            let owner = s.owner_account()?;
            let cluster = cluster.as_deref()?;
            Some(format!(
                "arn:aws:redshift:{}:{}:snapshot:{}/{}",
                self.region, owner, cluster, identifier
            ))
        });
        SnapshotDescription {
            identifier,
            cluster_identifier: cluster,
            arn,
            status: s
                .status()
                .map(LifecycleState::from_remote)
                .unwrap_or(LifecycleState::Creating),
            created_at: s.snapshot_create_time().and_then(to_utc),
        }
    }
}

// ─── Source Warehouse ───────────────────────────────────────────────────────

#[async_trait]
impl SourceWarehouse for AwsControlPlane {
    async fn describe_cluster(&self, identifier: &str) -> CloudResult<ClusterDescription> {
        let out = self
            .redshift
            .describe_clusters()
            .cluster_identifier(identifier)
            .send()
            .await
            .map_err(classify)?;
        let c = out
            .clusters()
            .first()
            .ok_or_else(|| CloudError::NotFound(format!("cluster {}", identifier)))?;

        let snapshot_copy = c.cluster_snapshot_copy_status().map(|s| SnapshotCopyConfig {
            destination_region: s.destination_region().text(),
            retention_period: s.retention_period(),
            manual_snapshot_retention_period: s.manual_snapshot_retention_period().map(i64::from),
            snapshot_copy_grant_name: s.snapshot_copy_grant_name().map(str::to_string),
        });

        Ok(ClusterDescription {
            identifier: identifier.to_string(),
            vpc_id: c.vpc_id().text(),
            subnet_group_name: c.cluster_subnet_group_name().map(str::to_string),
            security_group_ids: c
                .vpc_security_groups()
                .iter()
                .filter_map(|g| g.vpc_security_group_id().map(str::to_string))
                .collect(),
            publicly_accessible: c.publicly_accessible().unwrap_or(false),
            iam_role_arns: c
                .iam_roles()
                .iter()
                .filter_map(|r| r.iam_role_arn().map(str::to_string))
                .collect(),
            default_iam_role_arn: c.default_iam_role_arn().map(str::to_string),
            parameter_group_name: c
                .cluster_parameter_groups()
                .first()
                .and_then(|g| g.parameter_group_name().map(str::to_string)),
            maintenance_window: c.preferred_maintenance_window().map(str::to_string),
            maintenance_track: c.maintenance_track_name().map(str::to_string),
            snapshot_copy,
            tags: c
                .tags()
                .iter()
                .map(|t| (t.key().text(), t.value().text()))
                .collect(),
        })
    }

    async fn describe_subnet_group(&self, name: &str) -> CloudResult<Vec<String>> {
        let out = self
            .redshift
            .describe_cluster_subnet_groups()
            .cluster_subnet_group_name(name)
            .send()
            .await
            .map_err(classify)?;
        let group = out
            .cluster_subnet_groups()
            .first()
            .ok_or_else(|| CloudError::NotFound(format!("subnet group {}", name)))?;
        Ok(group
            .subnets()
            .iter()
            .filter_map(|s| s.subnet_identifier().map(str::to_string))
            .collect())
    }

    async fn describe_parameter_group(&self, name: &str) -> CloudResult<ParameterGroupDescription> {
        let out = self
            .redshift
            .describe_cluster_parameter_groups()
            .parameter_group_name(name)
            .send()
            .await
            .map_err(classify)?;
        let group = out
            .parameter_groups()
            .first()
            .ok_or_else(|| CloudError::NotFound(format!("parameter group {}", name)))?;
        Ok(ParameterGroupDescription {
            name: name.to_string(),
            family: group.parameter_group_family().map(str::to_string),
            description: group.description().map(str::to_string),
            tags: group
                .tags()
                .iter()
                .map(|t| (t.key().text(), t.value().text()))
                .collect(),
        })
    }

    async fn describe_parameters(&self, group_name: &str) -> CloudResult<Vec<ClusterParameter>> {
        let mut parameters = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let out = self
                .redshift
                .describe_cluster_parameters()
                .parameter_group_name(group_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(classify)?;
            parameters.extend(out.parameters().iter().map(|p| ClusterParameter {
                name: p.parameter_name().text(),
                value: p.parameter_value().map(str::to_string),
                data_type: p.data_type().map(str::to_string),
                source: p.source().map(str::to_string),
                is_modifiable: p.is_modifiable().unwrap_or(true),
                description: p.description().map(str::to_string),
            }));
            match out.marker().filter(|m| !m.is_empty()) {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }
        Ok(parameters)
    }

    async fn describe_usage_limits(&self, cluster: &str) -> CloudResult<Vec<UsageLimit>> {
        let out = self
            .redshift
            .describe_usage_limits()
            .cluster_identifier(cluster)
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .usage_limits()
            .iter()
            .map(|u| UsageLimit {
                limit_id: u.usage_limit_id().text(),
                feature_type: u.feature_type().map(|f| f.as_str().to_string()).unwrap_or_default(),
                limit_type: u.limit_type().map(|l| l.as_str().to_string()).unwrap_or_default(),
                amount: u.amount().unwrap_or_default(),
                period: u.period().map(|p| p.as_str().to_string()).unwrap_or_default(),
                breach_action: u.breach_action().map(|b| b.as_str().to_string()).unwrap_or_default(),
                tags: u
                    .tags()
                    .iter()
                    .map(|t| (t.key().text(), t.value().text()))
                    .collect(),
            })
            .collect())
    }

    async fn describe_snapshot_schedules(&self, cluster: &str) -> CloudResult<Vec<SnapshotSchedule>> {
        let out = self
            .redshift
            .describe_snapshot_schedules()
            .cluster_identifier(cluster)
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .snapshot_schedules()
            .iter()
            .map(|s| SnapshotSchedule {
                schedule_identifier: s.schedule_identifier().text(),
                schedule_definitions: s.schedule_definitions().to_vec(),
                tags: s
                    .tags()
                    .iter()
                    .map(|t| (t.key().text(), t.value().text()))
                    .collect(),
            })
            .collect())
    }

    async fn create_snapshot(
        &self,
        cluster: &str,
        snapshot_identifier: &str,
    ) -> CloudResult<SnapshotDescription> {
        let out = self
            .redshift
            .create_cluster_snapshot()
            .cluster_identifier(cluster)
            .snapshot_identifier(snapshot_identifier)
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .snapshot()
            .map(|s| self.snapshot_description(s))
            .unwrap_or_else(|| SnapshotDescription {
                identifier: snapshot_identifier.to_string(),
                cluster_identifier: Some(cluster.to_string()),
                arn: None,
                status: LifecycleState::Creating,
                created_at: None,
            }))
    }

    async fn describe_snapshot(&self, snapshot_identifier: &str) -> CloudResult<SnapshotDescription> {
        let out = self
            .redshift
            .describe_cluster_snapshots()
            .snapshot_identifier(snapshot_identifier)
            .send()
            .await
            .map_err(classify)?;
        out.snapshots()
            .first()
            .map(|s| self.snapshot_description(s))
            .ok_or_else(|| CloudError::NotFound(format!("snapshot {}", snapshot_identifier)))
    }

    async fn list_manual_snapshots(&self, cluster: &str) -> CloudResult<Vec<SnapshotDescription>> {
        let mut snapshots = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let out = self
                .redshift
                .describe_cluster_snapshots()
                .cluster_identifier(cluster)
                .snapshot_type("manual")
                .set_marker(marker.take())
                .send()
                .await
                .map_err(classify)?;
            snapshots.extend(out.snapshots().iter().map(|s| self.snapshot_description(s)));
            match out.marker().filter(|m| !m.is_empty()) {
                Some(next) => marker = Some(next.to_string()),
                None => break,
            }
        }
        Ok(snapshots)
    }
}

// ─── Serverless Target ──────────────────────────────────────────────────────

#[async_trait]
impl ServerlessTarget for AwsControlPlane {
    async fn get_namespace(&self, name: &str) -> CloudResult<ResourceHandle> {
        let out = self
            .serverless
            .get_namespace()
            .namespace_name(name)
            .send()
            .await
            .map_err(classify)?;
        out.namespace()
            .present()
            .map(namespace_handle)
            .ok_or_else(|| CloudError::NotFound(format!("namespace {}", name)))
    }

    async fn create_namespace(&self, spec: &NamespaceSpec) -> CloudResult<ResourceHandle> {
        let out = self
            .serverless
            .create_namespace()
            .namespace_name(&spec.name)
            .admin_username(&spec.admin_username)
            .set_admin_user_password(spec.admin_password.clone())
            .db_name(&spec.db_name)
            .set_iam_roles(Some(spec.iam_roles.clone()).filter(|r| !r.is_empty()))
            .set_default_iam_role_arn(spec.default_iam_role.clone())
            .set_tags(Some(serverless_tags(&spec.tags)?).filter(|t| !t.is_empty()))
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .namespace()
            .present()
            .map(namespace_handle)
            .unwrap_or_else(|| ResourceHandle::new(ResourceKind::Namespace, &spec.name, LifecycleState::Creating)))
    }

    async fn update_namespace(&self, update: &NamespaceUpdate) -> CloudResult<ResourceHandle> {
        let out = self
            .serverless
            .update_namespace()
            .namespace_name(&update.name)
            .set_iam_roles(Some(update.iam_roles.clone()))
            .set_default_iam_role_arn(update.default_iam_role.clone())
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .namespace()
            .present()
            .map(namespace_handle)
            .unwrap_or_else(|| ResourceHandle::new(ResourceKind::Namespace, &update.name, LifecycleState::Restoring)))
    }

    async fn get_workgroup(&self, name: &str) -> CloudResult<ResourceHandle> {
        let out = self
            .serverless
            .get_workgroup()
            .workgroup_name(name)
            .send()
            .await
            .map_err(classify)?;
        out.workgroup()
            .present()
            .map(workgroup_handle)
            .ok_or_else(|| CloudError::NotFound(format!("workgroup {}", name)))
    }

    async fn create_workgroup(&self, spec: &WorkgroupSpec) -> CloudResult<ResourceHandle> {
        use aws_sdk_redshiftserverless::types::{ConfigParameter, PerformanceTarget, PerformanceTargetStatus};

        let params: Vec<ConfigParameter> = spec
            .config_parameters
            .iter()
            .map(|p| {
                ConfigParameter::builder()
                    .parameter_key(&p.key)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect();
        let target = PerformanceTarget::builder()
            .status(PerformanceTargetStatus::Enabled)
            .level(spec.price_performance_level)
            .build();

        let out = self
            .serverless
            .create_workgroup()
            .workgroup_name(&spec.name)
            .namespace_name(&spec.namespace_name)
            .set_subnet_ids(Some(spec.subnet_ids.clone()).filter(|s| !s.is_empty()))
            .set_security_group_ids(Some(spec.security_group_ids.clone()).filter(|s| !s.is_empty()))
            .publicly_accessible(spec.publicly_accessible)
            .max_capacity(spec.max_capacity)
            .price_performance_target(target)
            .set_config_parameters(Some(params).filter(|p| !p.is_empty()))
            .set_tags(Some(serverless_tags(&spec.tags)?).filter(|t| !t.is_empty()))
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .workgroup()
            .present()
            .map(workgroup_handle)
            .unwrap_or_else(|| ResourceHandle::new(ResourceKind::Workgroup, &spec.name, LifecycleState::Creating)))
    }

    async fn update_workgroup(&self, update: &WorkgroupUpdate) -> CloudResult<ResourceHandle> {
        use aws_sdk_redshiftserverless::types::ConfigParameter;

        let params = update.config_parameters.as_ref().map(|params| {
            params
                .iter()
                .map(|p| {
                    ConfigParameter::builder()
                        .parameter_key(&p.key)
                        .parameter_value(&p.value)
                        .build()
                })
                .collect::<Vec<_>>()
        });

        let out = self
            .serverless
            .update_workgroup()
            .workgroup_name(&update.name)
            .set_subnet_ids(update.subnet_ids.clone())
            .set_security_group_ids(update.security_group_ids.clone())
            .set_publicly_accessible(update.publicly_accessible)
            .set_config_parameters(params)
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .workgroup()
            .present()
            .map(workgroup_handle)
            .unwrap_or_else(|| ResourceHandle::new(ResourceKind::Workgroup, &update.name, LifecycleState::Restoring)))
    }

    async fn restore_from_snapshot(&self, request: &RestoreRequest) -> CloudResult<RestoreOutcome> {
        let out = self
            .serverless
            .restore_from_snapshot()
            .namespace_name(&request.namespace_name)
            .workgroup_name(&request.workgroup_name)
            .snapshot_arn(&request.snapshot_arn)
            .send()
            .await
            .map_err(classify)?;

        let namespace = out
            .namespace()
            .present()
            .map(namespace_handle)
            .unwrap_or_else(|| {
                ResourceHandle::new(ResourceKind::Namespace, &request.namespace_name, LifecycleState::Restoring)
            });
        let workgroup = match self.get_workgroup(&request.workgroup_name).await {
            Ok(handle) => handle,
            Err(CloudError::NotFound(_)) => {
                ResourceHandle::new(ResourceKind::Workgroup, &request.workgroup_name, LifecycleState::Creating)
            }
            Err(e) => return Err(e),
        };
        Ok(RestoreOutcome { namespace, workgroup })
    }

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> CloudResult<()> {
        self.serverless
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(serverless_tags(tags)?))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn create_snapshot_copy_configuration(&self, spec: &SnapshotCopySpec) -> CloudResult<()> {
        self.serverless
            .create_snapshot_copy_configuration()
            .namespace_name(&spec.namespace_name)
            .destination_region(&spec.destination_region)
            .set_snapshot_retention_period(spec.retention_period)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

// ─── Scheduling ─────────────────────────────────────────────────────────────

#[async_trait]
impl ScheduleService for AwsControlPlane {
    async fn list_rules(&self) -> CloudResult<Vec<RuleSummary>> {
        use aws_sdk_eventbridge::types::RuleState;

        let mut rules = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .events
                .list_rules()
                .set_next_token(token.take())
                .send()
                .await
                .map_err(classify)?;
            rules.extend(out.rules().iter().map(|r| RuleSummary {
                name: r.name().text(),
                schedule_expression: r.schedule_expression().map(str::to_string),
                enabled: r.state() == Some(&RuleState::Enabled),
            }));
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(rules)
    }

    async fn list_rule_targets(&self, rule: &str) -> CloudResult<Vec<InvocationTarget>> {
        let out = self
            .events
            .list_targets_by_rule()
            .rule(rule)
            .send()
            .await
            .map_err(classify)?;
        Ok(out
            .targets()
            .iter()
            .map(|t| InvocationTarget {
                arn: t.arn().text(),
                input: t.input().map(str::to_string),
            })
            .collect())
    }

    async fn list_schedule_groups(&self) -> CloudResult<Vec<String>> {
        let mut groups = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .scheduler
                .list_schedule_groups()
                .set_next_token(token.take())
                .send()
                .await
                .map_err(classify)?;
            groups.extend(out.schedule_groups().iter().map(|g| g.name().text()));
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(groups)
    }

    async fn list_schedules(&self, group: &str) -> CloudResult<Vec<String>> {
        let mut names = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .scheduler
                .list_schedules()
                .group_name(group)
                .set_next_token(token.take())
                .send()
                .await
                .map_err(classify)?;
            names.extend(out.schedules().iter().map(|s| s.name().text()));
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    async fn get_schedule(&self, group: &str, name: &str) -> CloudResult<ScheduleDescription> {
        use aws_sdk_scheduler::types::ScheduleState;

        let out = self
            .scheduler
            .get_schedule()
            .group_name(group)
            .name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(ScheduleDescription {
            name: name.to_string(),
            group: group.to_string(),
            schedule_expression: out.schedule_expression().text(),
            enabled: out.state() != Some(&ScheduleState::Disabled),
            target: out.target().present().map(|t| InvocationTarget {
                arn: t.arn().text(),
                input: t.input().map(str::to_string),
            }),
        })
    }

    async fn create_schedule(&self, spec: &ScheduleSpec) -> CloudResult<String> {
        let (window, target, state) = scheduler_parts(spec)?;
        let out = self
            .scheduler
            .create_schedule()
            .name(&spec.name)
            .group_name("default")
            .schedule_expression(&spec.schedule_expression)
            .state(state)
            .flexible_time_window(window)
            .target(target)
            .description(&spec.description)
            .send()
            .await
            .map_err(classify)?;
        Ok(out.schedule_arn().text())
    }

    async fn update_schedule(&self, spec: &ScheduleSpec) -> CloudResult<String> {
        let (window, target, state) = scheduler_parts(spec)?;
        let out = self
            .scheduler
            .update_schedule()
            .name(&spec.name)
            .group_name("default")
            .schedule_expression(&spec.schedule_expression)
            .state(state)
            .flexible_time_window(window)
            .target(target)
            .description(&spec.description)
            .send()
            .await
            .map_err(classify)?;
        Ok(out.schedule_arn().text())
    }
}

fn scheduler_parts(
    spec: &ScheduleSpec,
) -> CloudResult<(
    aws_sdk_scheduler::types::FlexibleTimeWindow,
    aws_sdk_scheduler::types::Target,
    aws_sdk_scheduler::types::ScheduleState,
)> {
    use aws_sdk_scheduler::types::{FlexibleTimeWindow, FlexibleTimeWindowMode, ScheduleState, Target};

    let window = FlexibleTimeWindow::builder()
        .mode(FlexibleTimeWindowMode::Off)
        .build()
        .map_err(invalid_request)?;
    let target = Target::builder()
        .arn(&spec.target_arn)
        .role_arn(&spec.role_arn)
        .input(&spec.input)
        .build()
        .map_err(invalid_request)?;
    let state = if spec.enabled {
        ScheduleState::Enabled
    } else {
        ScheduleState::Disabled
    };
    Ok((window, target, state))
}

// ─── Identity ───────────────────────────────────────────────────────────────

#[async_trait]
impl IdentityService for AwsControlPlane {
    async fn get_role(&self, name: &str) -> CloudResult<RoleInfo> {
        let out = self
            .iam
            .get_role()
            .role_name(name)
            .send()
            .await
            .map_err(classify)?;
        let role = out
            .role()
            .present()
            .ok_or_else(|| CloudError::NotFound(format!("role {}", name)))?;
        Ok(RoleInfo {
            name: name.to_string(),
            arn: role.arn().text(),
        })
    }

    async fn create_role(&self, name: &str, trust_policy: &str, description: &str) -> CloudResult<RoleInfo> {
        let out = self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description(description)
            .send()
            .await
            .map_err(classify)?;
        let role = out
            .role()
            .present()
            .ok_or_else(|| CloudError::NotFound(format!("role {}", name)))?;
        Ok(RoleInfo {
            name: name.to_string(),
            arn: role.arn().text(),
        })
    }

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, policy_document: &str) -> CloudResult<()> {
        self.iam
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(policy_document)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
