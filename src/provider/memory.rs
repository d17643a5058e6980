//! A simulated control plane held entirely in process memory.
//!
//! Resources move through their lifecycle on reads: a freshly created
//! resource reports `CREATING` until it has been read
//! `polls_until_available` times. Every call is counted per operation name,
//! and failures can be queued per operation.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::types::{SnapshotSchedule, UsageLimit};

use super::models::{
    ClusterDescription, ClusterParameter, ConfigParameter, InvocationTarget, LifecycleState,
    NamespaceSpec, NamespaceUpdate, ParameterGroupDescription, ResourceHandle, ResourceKind,
    RestoreOutcome, RestoreRequest, RoleInfo, RuleSummary, ScheduleDescription, ScheduleSpec,
    SnapshotCopySpec, SnapshotDescription, WorkgroupSpec, WorkgroupUpdate,
};
use super::{
    CloudError, CloudResult, IdentityService, ScheduleService, ServerlessTarget, SourceWarehouse,
};

const DEFAULT_SCHEDULE_GROUP: &str = "default";

/// Operation names that change remote state.
const MUTATING_OPERATIONS: &[&str] = &[
    "create_snapshot",
    "create_namespace",
    "update_namespace",
    "create_workgroup",
    "update_workgroup",
    "restore_from_snapshot",
    "tag_resource",
    "create_snapshot_copy_configuration",
    "create_schedule",
    "update_schedule",
    "create_role",
    "put_role_policy",
];

#[derive(Debug, Clone)]
struct SimResource {
    handle: ResourceHandle,
    polls_remaining: u32,
}

#[derive(Debug, Clone)]
struct SimSnapshot {
    description: SnapshotDescription,
    polls_remaining: u32,
}

#[derive(Default)]
struct PlaneState {
    clusters: HashMap<String, ClusterDescription>,
    subnet_groups: HashMap<String, Vec<String>>,
    parameter_groups: HashMap<String, (ParameterGroupDescription, Vec<ClusterParameter>)>,
    usage_limits: HashMap<String, Vec<UsageLimit>>,
    snapshot_schedules: HashMap<String, Vec<SnapshotSchedule>>,

    snapshots: BTreeMap<String, SimSnapshot>,
    namespaces: BTreeMap<String, SimResource>,
    workgroups: BTreeMap<String, SimResource>,
    namespace_specs: BTreeMap<String, NamespaceSpec>,
    namespace_roles: BTreeMap<String, Vec<String>>,
    workgroup_parameters: BTreeMap<String, Vec<ConfigParameter>>,
    tags: BTreeMap<String, BTreeMap<String, String>>,
    snapshot_copies: BTreeMap<String, SnapshotCopySpec>,

    rules: Vec<(RuleSummary, Vec<InvocationTarget>)>,
    schedules: BTreeMap<(String, String), ScheduleDescription>,
    roles: BTreeMap<String, RoleInfo>,
    role_policies: BTreeMap<(String, String), String>,

    polls_until_available: u32,
    pinned: HashMap<(ResourceKind, String), LifecycleState>,
    calls: BTreeMap<String, usize>,
    failures: HashMap<String, VecDeque<CloudError>>,
}

/// In-memory implementation of every control-plane trait.
pub struct InMemoryControlPlane {
    region: String,
    account: String,
    state: Mutex<PlaneState>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account: "123456789012".to_string(),
            state: Mutex::new(PlaneState {
                polls_until_available: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlaneState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state_mut(&mut self) -> &mut PlaneState {
        self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call and pop any failure queued for it.
    fn enter(&self, operation: &str) -> CloudResult<MutexGuard<'_, PlaneState>> {
        let mut state = self.lock();
        *state.calls.entry(operation.to_string()).or_insert(0) += 1;
        if let Some(err) = state.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            tracing::debug!(operation, error = %err, "Injected failure");
            return Err(err);
        }
        Ok(state)
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{}:{}:{}:{}", service, self.region, self.account, resource)
    }

    // ─── Fixtures ───────────────────────────────────────────────────────────

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_cluster(mut self, cluster: ClusterDescription) -> Self {
        self.state_mut().clusters.insert(cluster.identifier.clone(), cluster);
        self
    }

    pub fn with_subnet_group(mut self, name: &str, subnet_ids: &[&str]) -> Self {
        let ids = subnet_ids.iter().map(|s| s.to_string()).collect();
        self.state_mut().subnet_groups.insert(name.to_string(), ids);
        self
    }

    pub fn with_parameter_group(
        mut self,
        group: ParameterGroupDescription,
        parameters: Vec<ClusterParameter>,
    ) -> Self {
        self.state_mut()
            .parameter_groups
            .insert(group.name.clone(), (group, parameters));
        self
    }

    pub fn with_usage_limits(mut self, cluster: &str, limits: Vec<UsageLimit>) -> Self {
        self.state_mut().usage_limits.insert(cluster.to_string(), limits);
        self
    }

    pub fn with_snapshot_schedules(mut self, cluster: &str, schedules: Vec<SnapshotSchedule>) -> Self {
        self.state_mut()
            .snapshot_schedules
            .insert(cluster.to_string(), schedules);
        self
    }

    /// An available manual snapshot of `cluster`.
    pub fn with_snapshot(mut self, identifier: &str, cluster: &str, created_at: DateTime<Utc>) -> Self {
        let arn = self.arn("redshift", &format!("snapshot:{}/{}", cluster, identifier));
        self.state_mut().snapshots.insert(
            identifier.to_string(),
            SimSnapshot {
                description: SnapshotDescription {
                    identifier: identifier.to_string(),
                    cluster_identifier: Some(cluster.to_string()),
                    arn: Some(arn),
                    status: LifecycleState::Available,
                    created_at: Some(created_at),
                },
                polls_remaining: 0,
            },
        );
        self
    }

    pub fn with_namespace(mut self, name: &str, state: LifecycleState) -> Self {
        let arn = self.arn("redshift-serverless", &format!("namespace/{}", name));
        self.state_mut().namespaces.insert(
            name.to_string(),
            SimResource {
                handle: ResourceHandle::new(ResourceKind::Namespace, name, state).with_arn(Some(arn)),
                polls_remaining: 0,
            },
        );
        self
    }

    pub fn with_workgroup(mut self, name: &str, state: LifecycleState) -> Self {
        let arn = self.arn("redshift-serverless", &format!("workgroup/{}", name));
        self.state_mut().workgroups.insert(
            name.to_string(),
            SimResource {
                handle: ResourceHandle::new(ResourceKind::Workgroup, name, state).with_arn(Some(arn)),
                polls_remaining: 0,
            },
        );
        self
    }

    pub fn with_rule(mut self, rule: RuleSummary, targets: Vec<InvocationTarget>) -> Self {
        self.state_mut().rules.push((rule, targets));
        self
    }

    pub fn with_schedule(mut self, schedule: ScheduleDescription) -> Self {
        self.state_mut()
            .schedules
            .insert((schedule.group.clone(), schedule.name.clone()), schedule);
        self
    }

    pub fn with_role(mut self, name: &str) -> Self {
        let arn = format!("arn:aws:iam::{}:role/{}", self.account, name);
        self.state_mut().roles.insert(
            name.to_string(),
            RoleInfo {
                name: name.to_string(),
                arn,
            },
        );
        self
    }

    /// Number of reads a new or modified resource reports in progress before
    /// turning AVAILABLE. `1` means the first read already sees it available.
    pub fn with_polls_until_available(mut self, polls: u32) -> Self {
        self.state_mut().polls_until_available = polls.max(1);
        self
    }

    // ─── Test Controls ──────────────────────────────────────────────────────

    /// Queue a failure for the next call of `operation`.
    pub fn fail_next(&self, operation: &str, error: CloudError) {
        self.lock()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Make every read of a resource report `state`, whatever happens to it.
    pub fn pin_state(&self, kind: ResourceKind, name: &str, state: LifecycleState) {
        self.lock().pinned.insert((kind, name.to_string()), state);
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn mutating_calls(&self) -> usize {
        let state = self.lock();
        MUTATING_OPERATIONS
            .iter()
            .filter_map(|op| state.calls.get(*op))
            .sum()
    }

    // ─── Inspection (not counted) ───────────────────────────────────────────

    pub fn namespace(&self, name: &str) -> Option<ResourceHandle> {
        self.lock().namespaces.get(name).map(|r| r.handle.clone())
    }

    pub fn workgroup(&self, name: &str) -> Option<ResourceHandle> {
        self.lock().workgroups.get(name).map(|r| r.handle.clone())
    }

    pub fn created_namespace(&self, name: &str) -> Option<NamespaceSpec> {
        self.lock().namespace_specs.get(name).cloned()
    }

    pub fn namespace_roles(&self, name: &str) -> Vec<String> {
        self.lock().namespace_roles.get(name).cloned().unwrap_or_default()
    }

    pub fn workgroup_parameters(&self, name: &str) -> Vec<ConfigParameter> {
        self.lock()
            .workgroup_parameters
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tags_for(&self, arn: &str) -> BTreeMap<String, String> {
        self.lock().tags.get(arn).cloned().unwrap_or_default()
    }

    pub fn schedule(&self, name: &str) -> Option<ScheduleDescription> {
        self.lock()
            .schedules
            .get(&(DEFAULT_SCHEDULE_GROUP.to_string(), name.to_string()))
            .cloned()
    }

    pub fn role_policy(&self, role: &str, policy: &str) -> Option<String> {
        self.lock()
            .role_policies
            .get(&(role.to_string(), policy.to_string()))
            .cloned()
    }

    pub fn snapshot_copy(&self, namespace: &str) -> Option<SnapshotCopySpec> {
        self.lock().snapshot_copies.get(namespace).cloned()
    }
}

// ─── Lifecycle Simulation ───────────────────────────────────────────────────

impl PlaneState {
    fn pinned_state(&self, kind: ResourceKind, name: &str) -> Option<LifecycleState> {
        self.pinned.get(&(kind, name.to_string())).copied()
    }

    /// Advance a resource by one read and return what the read observes.
    fn observe(&mut self, kind: ResourceKind, name: &str) -> CloudResult<ResourceHandle> {
        let pinned = self.pinned_state(kind, name);
        let resources = match kind {
            ResourceKind::Namespace => &mut self.namespaces,
            ResourceKind::Workgroup => &mut self.workgroups,
            ResourceKind::Snapshot => {
                return self.observe_snapshot(name).map(|s| s.handle());
            }
        };
        let resource = resources
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(format!("{} {}", kind, name)))?;
        advance(&mut resource.handle.state, &mut resource.polls_remaining);
        if let Some(state) = pinned {
            resource.handle.state = state;
        }
        Ok(resource.handle.clone())
    }

    fn observe_snapshot(&mut self, name: &str) -> CloudResult<SnapshotDescription> {
        let pinned = self.pinned_state(ResourceKind::Snapshot, name);
        let snapshot = self
            .snapshots
            .get_mut(name)
            .ok_or_else(|| CloudError::NotFound(format!("snapshot {}", name)))?;
        advance(&mut snapshot.description.status, &mut snapshot.polls_remaining);
        if let Some(state) = pinned {
            snapshot.description.status = state;
        }
        Ok(snapshot.description.clone())
    }

    /// Put a resource back in progress, as an asynchronous modification would.
    fn start_transition(&mut self, kind: ResourceKind, name: &str, state: LifecycleState) {
        let polls = self.polls_until_available;
        let resources = match kind {
            ResourceKind::Namespace => &mut self.namespaces,
            ResourceKind::Workgroup => &mut self.workgroups,
            ResourceKind::Snapshot => return,
        };
        if let Some(resource) = resources.get_mut(name) {
            resource.handle.state = state;
            resource.polls_remaining = polls;
        }
    }
}

fn advance(state: &mut LifecycleState, polls_remaining: &mut u32) {
    if *polls_remaining == 0 {
        return;
    }
    *polls_remaining -= 1;
    if *polls_remaining == 0 && !matches!(state, LifecycleState::Failed | LifecycleState::Deleting) {
        *state = LifecycleState::Available;
    }
}

// ─── Source Warehouse ───────────────────────────────────────────────────────

#[async_trait]
impl SourceWarehouse for InMemoryControlPlane {
    async fn describe_cluster(&self, identifier: &str) -> CloudResult<ClusterDescription> {
        let state = self.enter("describe_cluster")?;
        state
            .clusters
            .get(identifier)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("cluster {}", identifier)))
    }

    async fn describe_subnet_group(&self, name: &str) -> CloudResult<Vec<String>> {
        let state = self.enter("describe_subnet_group")?;
        state
            .subnet_groups
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("subnet group {}", name)))
    }

    async fn describe_parameter_group(&self, name: &str) -> CloudResult<ParameterGroupDescription> {
        let state = self.enter("describe_parameter_group")?;
        state
            .parameter_groups
            .get(name)
            .map(|(group, _)| group.clone())
            .ok_or_else(|| CloudError::NotFound(format!("parameter group {}", name)))
    }

    async fn describe_parameters(&self, group_name: &str) -> CloudResult<Vec<ClusterParameter>> {
        let state = self.enter("describe_parameters")?;
        state
            .parameter_groups
            .get(group_name)
            .map(|(_, params)| params.clone())
            .ok_or_else(|| CloudError::NotFound(format!("parameter group {}", group_name)))
    }

    async fn describe_usage_limits(&self, cluster: &str) -> CloudResult<Vec<UsageLimit>> {
        let state = self.enter("describe_usage_limits")?;
        Ok(state.usage_limits.get(cluster).cloned().unwrap_or_default())
    }

    async fn describe_snapshot_schedules(&self, cluster: &str) -> CloudResult<Vec<SnapshotSchedule>> {
        let state = self.enter("describe_snapshot_schedules")?;
        Ok(state.snapshot_schedules.get(cluster).cloned().unwrap_or_default())
    }

    async fn create_snapshot(
        &self,
        cluster: &str,
        snapshot_identifier: &str,
    ) -> CloudResult<SnapshotDescription> {
        let mut state = self.enter("create_snapshot")?;
        if !state.clusters.contains_key(cluster) {
            return Err(CloudError::NotFound(format!("cluster {}", cluster)));
        }
        if state.snapshots.contains_key(snapshot_identifier) {
            return Err(CloudError::Conflict(format!("snapshot {}", snapshot_identifier)));
        }
        let description = SnapshotDescription {
            identifier: snapshot_identifier.to_string(),
            cluster_identifier: Some(cluster.to_string()),
            arn: Some(self.arn("redshift", &format!("snapshot:{}/{}", cluster, snapshot_identifier))),
            status: LifecycleState::Creating,
            created_at: Some(Utc::now()),
        };
        let polls = state.polls_until_available;
        state.snapshots.insert(
            snapshot_identifier.to_string(),
            SimSnapshot {
                description: description.clone(),
                polls_remaining: polls,
            },
        );
        Ok(description)
    }

    async fn describe_snapshot(&self, snapshot_identifier: &str) -> CloudResult<SnapshotDescription> {
        let mut state = self.enter("describe_snapshot")?;
        state.observe_snapshot(snapshot_identifier)
    }

    async fn list_manual_snapshots(&self, cluster: &str) -> CloudResult<Vec<SnapshotDescription>> {
        let state = self.enter("list_manual_snapshots")?;
        Ok(state
            .snapshots
            .values()
            .filter(|s| s.description.cluster_identifier.as_deref() == Some(cluster))
            .map(|s| s.description.clone())
            .collect())
    }
}

// ─── Serverless Target ──────────────────────────────────────────────────────

#[async_trait]
impl ServerlessTarget for InMemoryControlPlane {
    async fn get_namespace(&self, name: &str) -> CloudResult<ResourceHandle> {
        let mut state = self.enter("get_namespace")?;
        state.observe(ResourceKind::Namespace, name)
    }

    async fn create_namespace(&self, spec: &NamespaceSpec) -> CloudResult<ResourceHandle> {
        let mut state = self.enter("create_namespace")?;
        if state.namespaces.contains_key(&spec.name) {
            return Err(CloudError::Conflict(format!("namespace {}", spec.name)));
        }
        let handle = ResourceHandle::new(ResourceKind::Namespace, &spec.name, LifecycleState::Creating)
            .with_arn(Some(self.arn("redshift-serverless", &format!("namespace/{}", spec.name))));
        let polls = state.polls_until_available;
        state.namespaces.insert(
            spec.name.clone(),
            SimResource {
                handle: handle.clone(),
                polls_remaining: polls,
            },
        );
        state.namespace_roles.insert(spec.name.clone(), spec.iam_roles.clone());
        state.namespace_specs.insert(spec.name.clone(), spec.clone());
        Ok(handle)
    }

    async fn update_namespace(&self, update: &NamespaceUpdate) -> CloudResult<ResourceHandle> {
        let mut state = self.enter("update_namespace")?;
        let handle = state
            .namespaces
            .get(&update.name)
            .map(|r| r.handle.clone())
            .ok_or_else(|| CloudError::NotFound(format!("namespace {}", update.name)))?;
        state.namespace_roles.insert(update.name.clone(), update.iam_roles.clone());
        Ok(handle)
    }

    async fn get_workgroup(&self, name: &str) -> CloudResult<ResourceHandle> {
        let mut state = self.enter("get_workgroup")?;
        state.observe(ResourceKind::Workgroup, name)
    }

    async fn create_workgroup(&self, spec: &WorkgroupSpec) -> CloudResult<ResourceHandle> {
        let mut state = self.enter("create_workgroup")?;
        if state.workgroups.contains_key(&spec.name) {
            return Err(CloudError::Conflict(format!("workgroup {}", spec.name)));
        }
        if !state.namespaces.contains_key(&spec.namespace_name) {
            return Err(CloudError::NotFound(format!("namespace {}", spec.namespace_name)));
        }
        let handle = ResourceHandle::new(ResourceKind::Workgroup, &spec.name, LifecycleState::Creating)
            .with_arn(Some(self.arn("redshift-serverless", &format!("workgroup/{}", spec.name))));
        let polls = state.polls_until_available;
        state.workgroups.insert(
            spec.name.clone(),
            SimResource {
                handle: handle.clone(),
                polls_remaining: polls,
            },
        );
        state
            .workgroup_parameters
            .insert(spec.name.clone(), spec.config_parameters.clone());
        Ok(handle)
    }

    async fn update_workgroup(&self, update: &WorkgroupUpdate) -> CloudResult<ResourceHandle> {
        let mut state = self.enter("update_workgroup")?;
        if !state.workgroups.contains_key(&update.name) {
            return Err(CloudError::NotFound(format!("workgroup {}", update.name)));
        }
        if let Some(params) = &update.config_parameters {
            state.workgroup_parameters.insert(update.name.clone(), params.clone());
        }
        state.start_transition(ResourceKind::Workgroup, &update.name, LifecycleState::Restoring);
        state
            .workgroups
            .get(&update.name)
            .map(|r| r.handle.clone())
            .ok_or_else(|| CloudError::NotFound(format!("workgroup {}", update.name)))
    }

    async fn restore_from_snapshot(&self, request: &RestoreRequest) -> CloudResult<RestoreOutcome> {
        let mut state = self.enter("restore_from_snapshot")?;
        let known = state
            .snapshots
            .values()
            .any(|s| s.description.arn.as_deref() == Some(request.snapshot_arn.as_str()));
        if !known {
            return Err(CloudError::NotFound(format!("snapshot {}", request.snapshot_arn)));
        }

        let polls = state.polls_until_available;
        if state.namespaces.contains_key(&request.namespace_name) {
            state.start_transition(ResourceKind::Namespace, &request.namespace_name, LifecycleState::Restoring);
        } else {
            let arn = self.arn("redshift-serverless", &format!("namespace/{}", request.namespace_name));
            state.namespaces.insert(
                request.namespace_name.clone(),
                SimResource {
                    handle: ResourceHandle::new(ResourceKind::Namespace, &request.namespace_name, LifecycleState::Restoring)
                        .with_arn(Some(arn)),
                    polls_remaining: polls,
                },
            );
        }
        if !state.workgroups.contains_key(&request.workgroup_name) {
            let arn = self.arn("redshift-serverless", &format!("workgroup/{}", request.workgroup_name));
            state.workgroups.insert(
                request.workgroup_name.clone(),
                SimResource {
                    handle: ResourceHandle::new(ResourceKind::Workgroup, &request.workgroup_name, LifecycleState::Creating)
                        .with_arn(Some(arn)),
                    polls_remaining: polls,
                },
            );
        }

        let namespace = state
            .namespaces
            .get(&request.namespace_name)
            .map(|r| r.handle.clone())
            .ok_or_else(|| CloudError::NotFound(format!("namespace {}", request.namespace_name)))?;
        let workgroup = state
            .workgroups
            .get(&request.workgroup_name)
            .map(|r| r.handle.clone())
            .ok_or_else(|| CloudError::NotFound(format!("workgroup {}", request.workgroup_name)))?;
        Ok(RestoreOutcome { namespace, workgroup })
    }

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> CloudResult<()> {
        let mut state = self.enter("tag_resource")?;
        let known = state
            .namespaces
            .values()
            .chain(state.workgroups.values())
            .any(|r| r.handle.arn.as_deref() == Some(arn));
        if !known {
            return Err(CloudError::NotFound(format!("resource {}", arn)));
        }
        state
            .tags
            .entry(arn.to_string())
            .or_default()
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn create_snapshot_copy_configuration(&self, spec: &SnapshotCopySpec) -> CloudResult<()> {
        let mut state = self.enter("create_snapshot_copy_configuration")?;
        if !state.namespaces.contains_key(&spec.namespace_name) {
            return Err(CloudError::NotFound(format!("namespace {}", spec.namespace_name)));
        }
        if let Some(existing) = state.snapshot_copies.get(&spec.namespace_name) {
            if existing.destination_region == spec.destination_region {
                return Err(CloudError::Conflict(format!(
                    "snapshot copy {} -> {}",
                    spec.namespace_name, spec.destination_region
                )));
            }
        }
        state.snapshot_copies.insert(spec.namespace_name.clone(), spec.clone());
        Ok(())
    }
}

// ─── Scheduling ─────────────────────────────────────────────────────────────

#[async_trait]
impl ScheduleService for InMemoryControlPlane {
    async fn list_rules(&self) -> CloudResult<Vec<RuleSummary>> {
        let state = self.enter("list_rules")?;
        Ok(state.rules.iter().map(|(rule, _)| rule.clone()).collect())
    }

    async fn list_rule_targets(&self, rule: &str) -> CloudResult<Vec<InvocationTarget>> {
        let state = self.enter("list_rule_targets")?;
        state
            .rules
            .iter()
            .find(|(r, _)| r.name == rule)
            .map(|(_, targets)| targets.clone())
            .ok_or_else(|| CloudError::NotFound(format!("rule {}", rule)))
    }

    async fn list_schedule_groups(&self) -> CloudResult<Vec<String>> {
        let state = self.enter("list_schedule_groups")?;
        let mut groups: BTreeSet<String> = state.schedules.keys().map(|(g, _)| g.clone()).collect();
        groups.insert(DEFAULT_SCHEDULE_GROUP.to_string());
        Ok(groups.into_iter().collect())
    }

    async fn list_schedules(&self, group: &str) -> CloudResult<Vec<String>> {
        let state = self.enter("list_schedules")?;
        Ok(state
            .schedules
            .keys()
            .filter(|(g, _)| g == group)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn get_schedule(&self, group: &str, name: &str) -> CloudResult<ScheduleDescription> {
        let state = self.enter("get_schedule")?;
        state
            .schedules
            .get(&(group.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("schedule {}/{}", group, name)))
    }

    async fn create_schedule(&self, spec: &ScheduleSpec) -> CloudResult<String> {
        let mut state = self.enter("create_schedule")?;
        let key = (DEFAULT_SCHEDULE_GROUP.to_string(), spec.name.clone());
        if state.schedules.contains_key(&key) {
            return Err(CloudError::Conflict(format!("schedule {}", spec.name)));
        }
        state.schedules.insert(key, schedule_from_spec(spec));
        Ok(self.arn("scheduler", &format!("schedule/{}/{}", DEFAULT_SCHEDULE_GROUP, spec.name)))
    }

    async fn update_schedule(&self, spec: &ScheduleSpec) -> CloudResult<String> {
        let mut state = self.enter("update_schedule")?;
        let key = (DEFAULT_SCHEDULE_GROUP.to_string(), spec.name.clone());
        if !state.schedules.contains_key(&key) {
            return Err(CloudError::NotFound(format!("schedule {}", spec.name)));
        }
        state.schedules.insert(key, schedule_from_spec(spec));
        Ok(self.arn("scheduler", &format!("schedule/{}/{}", DEFAULT_SCHEDULE_GROUP, spec.name)))
    }
}

fn schedule_from_spec(spec: &ScheduleSpec) -> ScheduleDescription {
    ScheduleDescription {
        name: spec.name.clone(),
        group: DEFAULT_SCHEDULE_GROUP.to_string(),
        schedule_expression: spec.schedule_expression.clone(),
        enabled: spec.enabled,
        target: Some(InvocationTarget {
            arn: spec.target_arn.clone(),
            input: Some(spec.input.clone()),
        }),
    }
}

// ─── Identity ───────────────────────────────────────────────────────────────

#[async_trait]
impl IdentityService for InMemoryControlPlane {
    async fn get_role(&self, name: &str) -> CloudResult<RoleInfo> {
        let state = self.enter("get_role")?;
        state
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("role {}", name)))
    }

    async fn create_role(&self, name: &str, _trust_policy: &str, _description: &str) -> CloudResult<RoleInfo> {
        let mut state = self.enter("create_role")?;
        if state.roles.contains_key(name) {
            return Err(CloudError::Conflict(format!("role {}", name)));
        }
        let role = RoleInfo {
            name: name.to_string(),
            arn: format!("arn:aws:iam::{}:role/{}", self.account, name),
        };
        state.roles.insert(name.to_string(), role.clone());
        Ok(role)
    }

    async fn put_role_policy(&self, role_name: &str, policy_name: &str, policy_document: &str) -> CloudResult<()> {
        let mut state = self.enter("put_role_policy")?;
        if !state.roles.contains_key(role_name) {
            return Err(CloudError::NotFound(format!("role {}", role_name)));
        }
        state.role_policies.insert(
            (role_name.to_string(), policy_name.to_string()),
            policy_document.to_string(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn namespace_spec(name: &str) -> NamespaceSpec {
        NamespaceSpec {
            name: name.into(),
            admin_username: "admin".into(),
            admin_password: None,
            db_name: "dev".into(),
            iam_roles: vec![],
            default_iam_role: None,
            tags: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn resources_become_available_after_configured_reads() {
        let plane = InMemoryControlPlane::new().with_polls_until_available(3);
        plane.create_namespace(&namespace_spec("ns")).await.unwrap();

        let states: Vec<LifecycleState> = [
            plane.get_namespace("ns").await.unwrap().state,
            plane.get_namespace("ns").await.unwrap().state,
            plane.get_namespace("ns").await.unwrap().state,
        ]
        .to_vec();
        assert_eq!(
            states,
            vec![LifecycleState::Creating, LifecycleState::Creating, LifecycleState::Available]
        );
        assert_eq!(plane.call_count("get_namespace"), 3);
        assert_eq!(plane.mutating_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let plane = InMemoryControlPlane::new();
        plane.create_namespace(&namespace_spec("ns")).await.unwrap();
        let err = plane.create_namespace(&namespace_spec("ns")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let plane = InMemoryControlPlane::new();
        plane.fail_next("get_namespace", CloudError::Throttled("slow down".into()));

        let first = plane.get_namespace("ns").await.unwrap_err();
        assert!(first.is_transient());
        let second = plane.get_namespace("ns").await.unwrap_err();
        assert!(second.is_not_found());
        assert_eq!(plane.call_count("get_namespace"), 2);
    }

    #[tokio::test]
    async fn pinned_state_overrides_lifecycle() {
        let plane = InMemoryControlPlane::new().with_namespace("ns", LifecycleState::Available);
        plane.pin_state(ResourceKind::Namespace, "ns", LifecycleState::Failed);
        assert_eq!(plane.get_namespace("ns").await.unwrap().state, LifecycleState::Failed);
    }
}
