use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::apply::{ConfigApplier, ScheduledTaskMigrator};
use crate::config::settings::Settings;
use crate::config::types::{ApplyOptions, SourceResourceConfig, TargetResourceConfig};
use crate::config::validator::validate_options;
use crate::error::Result;
use crate::extract::{ConfigExtractor, Extraction};
use crate::mapping::target;
use crate::output::dry_run;
use crate::output::result::{MigrationReport, Outcome};
use crate::provider::models::ResourceKind;
use crate::provider::ControlPlane;
use crate::state::SessionStore;

use super::clock::{Clock, TokioClock};
use super::orchestrator::{Orchestrator, ProvisionRequest, Provisioned, SnapshotRef};

/// How the target pair gets provisioned when `create_if_missing` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionPath {
    /// Take a fresh snapshot and restore it into a new pair.
    SnapshotAndRestore,
    /// Restore an existing snapshot.
    FromSnapshot(SnapshotRef),
    /// Get-or-create an empty namespace and workgroup.
    EnsureExists,
}

impl ProvisionPath {
    pub fn from_options(opts: &ApplyOptions) -> Self {
        if opts.create_snapshot {
            return ProvisionPath::SnapshotAndRestore;
        }
        match opts.snapshot_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => ProvisionPath::FromSnapshot(SnapshotRef::Named(name.to_string())),
            None if opts.use_latest_snapshot => ProvisionPath::FromSnapshot(SnapshotRef::Latest),
            None => ProvisionPath::EnsureExists,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ProvisionPath::SnapshotAndRestore => "create_snapshot_and_restore",
            ProvisionPath::FromSnapshot(_) => "create_from_snapshot",
            ProvisionPath::EnsureExists => "ensure_namespace_and_workgroup",
        }
    }
}

/// Entry point for the extract, apply and migrate workflows.
///
/// Every workflow validates its inputs before touching the control plane.
pub struct MigrationEngine<C: ControlPlane + 'static> {
    plane: Arc<C>,
    settings: Settings,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl<C: ControlPlane + 'static> MigrationEngine<C> {
    pub fn new(plane: Arc<C>, settings: Settings) -> Self {
        Self {
            plane,
            settings,
            clock: Arc::new(TokioClock),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn extractor(&self) -> ConfigExtractor {
        ConfigExtractor::new(
            self.plane.clone(),
            self.plane.clone(),
            self.settings.clone(),
            self.clock.clone(),
        )
    }

    fn orchestrator(&self, dry_run: bool) -> Orchestrator {
        Orchestrator::new(
            self.plane.clone(),
            self.plane.clone(),
            self.settings.clone(),
            self.clock.clone(),
            self.cancel.clone(),
        )
        .with_dry_run(dry_run)
    }

    fn applier(&self, dry_run: bool) -> ConfigApplier {
        let tasks = ScheduledTaskMigrator::new(
            self.plane.clone(),
            self.plane.clone(),
            self.settings.clone(),
            self.clock.clone(),
        );
        ConfigApplier::new(
            self.plane.clone(),
            self.orchestrator(dry_run),
            tasks,
            self.settings.clone(),
            self.clock.clone(),
        )
        .with_dry_run(dry_run)
    }

    // ─── Extract ────────────────────────────────────────────────────────────

    pub async fn extract(&self, source_id: &str) -> Result<SourceResourceConfig> {
        Ok(self.extract_with_warnings(source_id).await?.config)
    }

    pub async fn extract_with_warnings(&self, source_id: &str) -> Result<Extraction> {
        validate_options(source_id, None)?;
        info!(cluster = source_id, "Extracting source configuration");
        self.extractor().extract_with_warnings(source_id).await
    }

    // ─── Apply ──────────────────────────────────────────────────────────────

    /// Provision (optionally) and configure the target pair for an extracted source.
    ///
    /// Only validation failures are returned as `Err`; everything after that is
    /// reported per component.
    pub async fn apply(&self, config: &SourceResourceConfig, opts: &ApplyOptions) -> Result<MigrationReport> {
        validate_options(&config.identifier, Some(opts))?;

        let workgroup = opts.resolved_workgroup(&config.identifier);
        let namespace = opts.resolved_namespace(&config.identifier);
        let target = target::derive(config, &workgroup, &namespace);

        info!(
            cluster = %config.identifier,
            namespace = %namespace,
            workgroup = %workgroup,
            dry_run = opts.dry_run,
            "Applying configuration"
        );

        let provision = if opts.create_if_missing {
            let request = self.provision_request(config, &target, opts);
            let outcome = self.provision(&request, &ProvisionPath::from_options(opts), opts.dry_run).await;
            if outcome.is_error() {
                return Ok(self.provisioning_failed(config, outcome, opts.dry_run));
            }
            Some(outcome)
        } else {
            None
        };

        let mut report = self
            .applier(opts.dry_run)
            .apply(
                &target,
                Some(&config.scheduled_tasks),
                config.snapshot_copy.as_ref(),
            )
            .await;
        if let Some(outcome) = provision {
            report.insert("provision", outcome);
        }

        if report.has_errors() {
            warn!(errors = report.error_count(), "Apply finished with errors");
        } else {
            info!(components = report.components.len(), "Apply finished");
        }
        Ok(report)
    }

    /// Extract then apply in one call.
    pub async fn migrate(&self, source_id: &str, opts: &ApplyOptions) -> Result<MigrationReport> {
        validate_options(source_id, Some(opts))?;
        let config = self.extract(source_id).await?;
        self.apply(&config, opts).await
    }

    // ─── Sessions ───────────────────────────────────────────────────────────

    /// Extract, reusing the session's cached config for this source when present.
    pub async fn extract_in_session(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        source_id: &str,
    ) -> Result<SourceResourceConfig> {
        validate_options(source_id, None)?;
        if let Some(config) = store.cached_config(session_id, source_id) {
            debug!(session = session_id, cluster = source_id, "Using cached configuration");
            return Ok(config);
        }
        let config = self.extract(source_id).await?;
        store.cache_config(session_id, config.clone());
        Ok(config)
    }

    pub async fn apply_in_session(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        source_id: &str,
        opts: &ApplyOptions,
    ) -> Result<MigrationReport> {
        validate_options(source_id, Some(opts))?;
        let config = self.extract_in_session(store, session_id, source_id).await?;
        self.apply(&config, opts).await
    }

    // ─── Provisioning ───────────────────────────────────────────────────────

    fn provision_request(
        &self,
        config: &SourceResourceConfig,
        target: &TargetResourceConfig,
        opts: &ApplyOptions,
    ) -> ProvisionRequest {
        ProvisionRequest {
            source_id: config.identifier.clone(),
            namespace_name: target.namespace_name.clone(),
            workgroup_name: target.workgroup_name.clone(),
            network: target.network.clone(),
            max_capacity: opts.max_capacity.unwrap_or(self.settings.max_capacity),
            iam_roles: target.iam_roles.clone(),
            tags: target.tags.clone(),
            admin_username: opts
                .admin_username
                .clone()
                .unwrap_or_else(|| self.settings.admin_username.clone()),
            admin_password: opts.admin_password.clone(),
        }
    }

    /// Run one provisioning path and fold its result into the `provision` outcome.
    async fn provision(&self, request: &ProvisionRequest, path: &ProvisionPath, dry_run: bool) -> Outcome {
        let orchestrator = self.orchestrator(dry_run);
        let action = path.action();

        let result: Result<(String, Option<String>)> = match path {
            ProvisionPath::SnapshotAndRestore => {
                let planned = orchestrator.snapshot_name(&request.source_id);
                orchestrator
                    .create_snapshot_and_restore(request)
                    .await
                    .map(|provisioned| match provisioned {
                        Provisioned::Live(done) => (done.message, Some(done.snapshot.snapshot_identifier)),
                        Provisioned::DryRun(_) => (
                            format!("Would snapshot {} and restore into {}", request.source_id, request.namespace_name),
                            Some(planned),
                        ),
                    })
            }
            ProvisionPath::FromSnapshot(snapshot) => {
                self.provision_from_snapshot(&orchestrator, request, snapshot).await
            }
            ProvisionPath::EnsureExists => self.ensure_pair(&orchestrator, request).await,
        };

        match result {
            Ok((message, snapshot)) => {
                let detail = dry_run::provision_detail(action, request, snapshot.as_deref());
                if dry_run {
                    Outcome::dry_run(message, detail)
                } else {
                    Outcome::success(message, detail)
                }
            }
            Err(e) => {
                warn!(action, error = %e, "Provisioning failed");
                let detail = dry_run::provision_detail(action, request, None);
                Outcome::error(e.kind(), e.to_string(), Some(detail))
            }
        }
    }

    /// Restore, then wait for the pair to settle before the settings pass.
    async fn provision_from_snapshot(
        &self,
        orchestrator: &Orchestrator,
        request: &ProvisionRequest,
        snapshot: &SnapshotRef,
    ) -> Result<(String, Option<String>)> {
        match orchestrator.create_from_existing_snapshot(request, snapshot).await? {
            Provisioned::DryRun(_) => Ok((
                format!("Would restore snapshot {} into {}", snapshot.describe(), request.namespace_name),
                Some(snapshot.describe()),
            )),
            Provisioned::Live(restored) => {
                orchestrator
                    .wait_for(ResourceKind::Namespace, &request.namespace_name)
                    .await?;
                orchestrator
                    .wait_for(ResourceKind::Workgroup, &request.workgroup_name)
                    .await?;
                Ok((restored.message, Some(restored.snapshot.snapshot_identifier)))
            }
        }
    }

    async fn ensure_pair(
        &self,
        orchestrator: &Orchestrator,
        request: &ProvisionRequest,
    ) -> Result<(String, Option<String>)> {
        let namespace = orchestrator.ensure_namespace_exists(request).await?;
        if namespace.is_dry_run() {
            orchestrator.ensure_workgroup_exists(request).await?;
            return Ok((
                format!(
                    "Would ensure namespace {} and workgroup {} exist",
                    request.namespace_name, request.workgroup_name
                ),
                None,
            ));
        }
        orchestrator
            .wait_for(ResourceKind::Namespace, &request.namespace_name)
            .await?;

        let workgroup = orchestrator.ensure_workgroup_exists(request).await?;
        orchestrator
            .wait_for(ResourceKind::Workgroup, &request.workgroup_name)
            .await?;

        let messages: Vec<String> = [namespace.into_live(), workgroup.into_live()]
            .into_iter()
            .flatten()
            .map(|o| o.message)
            .collect();
        Ok((messages.join("; "), None))
    }

    /// Report a failed provisioning step; nothing downstream is attempted.
    fn provisioning_failed(&self, config: &SourceResourceConfig, provision: Outcome, dry_run: bool) -> MigrationReport {
        let reason = format!("provisioning failed: {}", provision.message());
        let mut report = MigrationReport::new(dry_run);
        for component in ["network", "identity", "parameters", "tags", "scheduled_tasks"] {
            report.insert(component, Outcome::skipped(reason.clone()));
        }
        if config.snapshot_copy.is_some() {
            report.insert("snapshot_copy", Outcome::skipped(reason));
        }
        report.insert("provision", provision);
        report
    }
}

impl<C: ControlPlane + 'static> std::fmt::Debug for MigrationEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("settings", &self.settings)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_path_follows_options() {
        let mut opts = ApplyOptions::default();
        assert_eq!(ProvisionPath::from_options(&opts), ProvisionPath::EnsureExists);

        opts.use_latest_snapshot = true;
        assert_eq!(
            ProvisionPath::from_options(&opts),
            ProvisionPath::FromSnapshot(SnapshotRef::Latest)
        );

        opts.use_latest_snapshot = false;
        opts.snapshot_name = Some("snap-1".into());
        assert_eq!(
            ProvisionPath::from_options(&opts),
            ProvisionPath::FromSnapshot(SnapshotRef::Named("snap-1".into()))
        );

        let opts = ApplyOptions {
            create_snapshot: true,
            ..Default::default()
        };
        assert_eq!(ProvisionPath::from_options(&opts).action(), "create_snapshot_and_restore");
    }
}
