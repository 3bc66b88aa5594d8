//! Application service — the agent lifecycle orchestrator.
//!
//! Sequences the runtime, the dependency resolver, the filesystem composer and
//! the Git bootstrap into create / exec / destroy. Agent existence lives in two
//! places (the registry and the runtime); every exec-style operation resolves
//! the container by name and reports a missing one as [`AgentError::NotRunning`].
//!
//! Imports only from `crate::domain` and `crate::application`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use capsulate_common::{
    AgentState, DependencyTier, GitStatus, MetricCategory, OverlayStatus, ResolvedDependency,
};
use chrono::Utc;
use tokio::sync::OnceCell;

use crate::application::ports::{
    AgentShell, AgentStateStore, ContainerFilter, ContainerRuntime, ContainerSpec, ExecOutput,
    ExecRequest, ImageStore, LocalFs, MetricsSink, ProgressReporter,
};
use crate::application::services::dependency::{self, DependencyPlan, TierSelection};
use crate::application::services::filesystem::{self, FilesystemPlan};
use crate::application::services::image;
use crate::application::services::registry::AgentRegistry;
use crate::application::services::status;
use crate::domain::agent::{validate_agent_id, validate_branch_name, validate_package_name};
use crate::domain::layout::{
    AGENT_ID_LABEL, CONTAINER_AGENT_DEPS, CONTAINER_LINK_DIR, CONTAINER_OVERLAY_BASE,
    CONTAINER_OVERLAY_DIFF, CONTAINER_OVERLAY_MERGED, CONTAINER_SSH_DIR, MANAGED_LABEL,
    container_name, container_workdir,
};
use crate::domain::{
    Agent, AgentConfig, AgentError, AgentResult, CapsulateConfig, ContainerSummary, HostLayout,
    Mount, ShellScript, git, validate_config,
};

/// Runtime-facing settings of an [`AgentManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    pub base_image: String,
    pub builder_image: String,
    pub stop_timeout: Duration,
    pub mount_ssh: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from_config(&CapsulateConfig::default())
    }
}

impl ManagerOptions {
    #[must_use]
    pub fn from_config(config: &CapsulateConfig) -> Self {
        Self {
            base_image: config.base_image.clone(),
            builder_image: config.builder_image.clone(),
            stop_timeout: config.stop_timeout(),
            mount_ssh: config.mount_ssh,
        }
    }
}

/// Creates, drives and destroys agents.
///
/// The registry is injected so several managers (or tests) can run side by
/// side in one process.
pub struct AgentManager<R, F, S> {
    runtime: R,
    fs: F,
    store: S,
    registry: Arc<AgentRegistry>,
    metrics: Arc<dyn MetricsSink>,
    layout: HostLayout,
    options: ManagerOptions,
    base_image: OnceCell<()>,
}

impl<R, F, S> AgentManager<R, F, S>
where
    R: ContainerRuntime + ImageStore,
    F: LocalFs,
    S: AgentStateStore,
{
    pub fn new(
        runtime: R,
        fs: F,
        store: S,
        registry: Arc<AgentRegistry>,
        metrics: Arc<dyn MetricsSink>,
        layout: HostLayout,
        options: ManagerOptions,
    ) -> Self {
        Self {
            runtime,
            fs,
            store,
            registry,
            metrics,
            layout,
            options,
            base_image: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    #[must_use]
    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    #[must_use]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    // ── Registry views ────────────────────────────────────────────────────────

    /// Load persisted agent records into the registry.
    ///
    /// Returns the number of agents loaded. Records already registered are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the state store cannot be read.
    pub fn recover(&self) -> Result<usize> {
        let mut loaded = 0;
        for agent in self.store.load_all()? {
            let id = agent.id.clone();
            match self.registry.register(agent) {
                Ok(()) => loaded += 1,
                Err(e) => tracing::debug!(agent_id = %id, error = %e, "skipping stored agent"),
            }
        }
        Ok(loaded)
    }

    #[must_use]
    pub fn list_agents(&self) -> Vec<Agent> {
        self.registry.list()
    }

    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] if the id is not registered.
    pub fn get_agent(&self, id: &str) -> AgentResult<Agent> {
        self.registry
            .get(id)
            .ok_or_else(|| AgentError::NotFound(id.to_string()))
    }

    /// Managed containers with no registry entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime listing fails.
    pub async fn orphans(&self) -> Result<Vec<ContainerSummary>> {
        let filter = ContainerFilter::by_label(&format!("{MANAGED_LABEL}=true")).including_stopped();
        let containers = self.runtime.list_containers(&filter).await?;
        Ok(containers
            .into_iter()
            .filter(|c| c.agent_id().is_none_or(|id| !self.registry.contains(id)))
            .collect())
    }

    // ── Create ────────────────────────────────────────────────────────────────

    /// Build the base image once per manager.
    ///
    /// # Errors
    ///
    /// Returns the provisioning error; a later call retries.
    pub async fn ensure_base_image(&self, reporter: &impl ProgressReporter) -> Result<()> {
        self.base_image
            .get_or_try_init(|| async {
                image::ensure_base_image(
                    &self.runtime,
                    reporter,
                    &self.options.base_image,
                    &self.options.builder_image,
                )
                .await
                .map(|_| ())
            })
            .await
            .map(|_| ())
    }

    /// Create, start and bootstrap a new agent.
    ///
    /// On any failure after the container exists, the container is stopped
    /// and removed and the agent is never registered.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] before any external call,
    /// [`AgentError::AlreadyExists`] if the id is taken in this process or at
    /// the runtime, and infrastructure errors otherwise. If cleanup after a
    /// failure also fails, [`AgentError::RollbackFailed`] carries both.
    #[tracing::instrument(name = "agent.create", skip_all, fields(agent_id = %config.id))]
    pub async fn create(&self, config: &AgentConfig, reporter: &impl ProgressReporter) -> AgentResult<Agent> {
        let started = Instant::now();
        validate_config(config)?;
        let id = config.id.as_str();
        let reservation = self.registry.reserve(id)?;

        let name = container_name(id);
        let existing = self
            .runtime
            .list_containers(&ContainerFilter::by_name(&name).including_stopped())
            .await
            .map_err(|e| AgentError::runtime(id, "list containers", &e))?;
        if !existing.is_empty() {
            return Err(AgentError::AlreadyExists(id.to_string()));
        }

        self.ensure_base_image(reporter)
            .await
            .map_err(|e| AgentError::runtime(id, "ensure base image", &e))?;

        reporter.step("preparing dependency tiers and workspace...");
        let plans = dependency::plan(&self.fs, &self.layout, config).and_then(|deps| {
            filesystem::plan(&self.fs, &self.layout, config).map(|files| (deps, files))
        });
        let (deps, files) = match plans {
            Ok(plans) => plans,
            Err(e) => {
                self.remove_private_dirs(id);
                return Err(e);
            }
        };

        let spec = self.container_spec(config, &name, &deps, &files);
        let container_id = match self.runtime.create_container(&spec).await {
            Ok(cid) => cid,
            Err(e) => {
                self.remove_private_dirs(id);
                return Err(AgentError::runtime(id, "create container", &e));
            }
        };
        tracing::info!(container = %container_id, "container created");

        let branch = match self.bootstrap(config, &container_id, deps, files, reporter).await {
            Ok(branch) => branch,
            Err(cause) => return Err(self.rollback(id, &container_id, cause).await),
        };

        let agent = Agent {
            id: id.to_string(),
            container_id,
            branch,
            dependency_level: config.dependency_level,
            team_id: config.team_id.clone().filter(|t| !t.is_empty()),
            override_dependencies: config.override_dependencies.clone(),
            use_overlay: config.use_overlay,
            host_workspace: self.layout.workspace(id),
            repo_url: config.repo_url.clone(),
            git_config: config.git_config.clone(),
            state: AgentState::Ready,
            created_at: Utc::now(),
        };
        reservation.commit(agent.clone());
        self.persist(&agent);
        self.refresh_status_file(&agent).await;

        self.metrics.count(MetricCategory::ContainerOps, "create_agent", Some(id), 1);
        self.metrics
            .duration(MetricCategory::ContainerOps, "create_agent", Some(id), started.elapsed());
        Ok(agent)
    }

    fn container_spec(
        &self,
        config: &AgentConfig,
        name: &str,
        deps: &DependencyPlan,
        files: &FilesystemPlan,
    ) -> ContainerSpec {
        let mut mounts: Vec<Mount> = Vec::new();
        if self.options.mount_ssh
            && let Some(ssh) = self.fs.home_dir().map(|h| h.join(".ssh"))
            && self.fs.exists(&ssh)
        {
            mounts.push(Mount::read_only(ssh, CONTAINER_SSH_DIR));
        }
        mounts.extend(files.mounts.iter().cloned());
        mounts.extend(deps.mounts.iter().cloned());

        let env = vec![
            ("AGENT_ID".to_string(), config.id.clone()),
            ("DEPENDENCY_LEVEL".to_string(), config.dependency_level.to_string()),
            ("TEAM_ID".to_string(), config.team_id.clone().unwrap_or_default()),
            ("OVERRIDE_DEPS".to_string(), config.override_dependencies.join(",")),
            ("USE_OVERLAY".to_string(), config.use_overlay.to_string()),
            ("NODE_PATH".to_string(), CONTAINER_LINK_DIR.to_string()),
        ];
        let labels = BTreeMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (AGENT_ID_LABEL.to_string(), config.id.clone()),
        ]);

        ContainerSpec {
            name: name.to_string(),
            image: self.options.base_image.clone(),
            command: vec!["tail".into(), "-f".into(), "/dev/null".into()],
            env,
            mounts,
            labels,
            privileged: config.use_overlay,
        }
    }

    /// Start, union mount, link dependencies, clone, configure, branch.
    /// Returns the branch the agent ends up on.
    async fn bootstrap(
        &self,
        config: &AgentConfig,
        container_id: &str,
        deps: DependencyPlan,
        files: FilesystemPlan,
        reporter: &impl ProgressReporter,
    ) -> AgentResult<String> {
        let id = config.id.as_str();
        self.runtime
            .start_container(container_id)
            .await
            .map_err(|e| AgentError::runtime(id, "start container", &e))?;

        if let Some(script) = files.mount_script {
            reporter.step("mounting overlay filesystem...");
            self.run_checked(id, container_id, script.into_argv(), None, "mount overlay filesystem")
                .await?;
        }

        reporter.step("linking dependencies...");
        let timer = Instant::now();
        self.run_checked(id, container_id, deps.setup_script.into_argv(), None, "link dependencies")
            .await?;
        self.metrics
            .duration(MetricCategory::DependencyOps, "setup_dependencies", Some(id), timer.elapsed());

        let requested = config.requested_branch();
        let Some(url) = config.repo_url.as_deref() else {
            return Ok(requested.unwrap_or_default().to_string());
        };
        let workdir = files.workdir;

        if config.use_overlay && self.has_repository(id, container_id, workdir).await? {
            reporter.step("using repository from the shared base layer...");
        } else {
            reporter.step(&format!("cloning {url}..."));
            let timer = Instant::now();
            self.run_checked(
                id,
                container_id,
                git::clone_argv(url, requested, config.depth, workdir),
                None,
                "git clone",
            )
            .await?;
            self.metrics
                .duration(MetricCategory::GitOps, "clone", Some(id), timer.elapsed());
        }

        for (key, value) in &config.git_config {
            self.run_checked(id, container_id, git::config_argv(key, value), Some(workdir), "git config")
                .await?;
        }

        match requested {
            Some(branch) => {
                self.run_checked(
                    id,
                    container_id,
                    git::checkout_new_argv(branch),
                    Some(workdir),
                    "git checkout",
                )
                .await?;
                Ok(branch.to_string())
            }
            None => {
                let out = self
                    .run_checked(id, container_id, git::current_branch_argv(), Some(workdir), "git rev-parse")
                    .await?;
                Ok(out.stdout.trim().to_string())
            }
        }
    }

    /// `true` when `workdir` already holds a Git repository, which is the case
    /// for an overlay whose base layer is a repository snapshot.
    async fn has_repository(&self, id: &str, container_id: &str, workdir: &str) -> AgentResult<bool> {
        let git_dir = format!("{workdir}/.git");
        let probe = self
            .exec_raw(id, container_id, vec!["test".into(), "-d".into(), git_dir], None)
            .await?;
        Ok(probe.success())
    }

    /// Stop and remove a half-created container, then drop private host dirs.
    async fn rollback(&self, id: &str, container_id: &str, cause: AgentError) -> AgentError {
        tracing::warn!(container = %container_id, error = %cause, "creation failed, rolling back");
        let stopped = self
            .runtime
            .stop_container(container_id, self.options.stop_timeout)
            .await;
        let removed = self.runtime.remove_container(container_id).await;
        self.remove_private_dirs(id);
        self.metrics.count(MetricCategory::ContainerOps, "create_rollback", Some(id), 1);

        match (stopped, removed) {
            (_, Ok(())) => cause,
            (Ok(()), Err(rm)) => AgentError::RollbackFailed {
                agent_id: id.to_string(),
                cause: Box::new(cause),
                cleanup: format!("remove container: {rm:#}"),
            },
            (Err(stop), Err(rm)) => AgentError::RollbackFailed {
                agent_id: id.to_string(),
                cause: Box::new(cause),
                cleanup: format!("stop container: {stop:#}; remove container: {rm:#}"),
            },
        }
    }

    fn remove_private_dirs(&self, id: &str) {
        for dir in [
            self.layout.workspace(id),
            self.layout.overlay_diff(id),
            self.layout.overlay_work(id),
        ] {
            if let Err(e) = self.fs.remove_dir_all(&dir) {
                tracing::warn!(agent_id = id, path = %dir.display(), error = %format!("{e:#}"), "failed to clean up");
            }
        }
    }

    // ── Exec-style operations ─────────────────────────────────────────────────

    /// Registered agent plus the id of its running container.
    async fn resolve_container(&self, id: &str) -> AgentResult<(Agent, String)> {
        let agent = self.get_agent(id)?;
        let running = self
            .runtime
            .list_containers(&ContainerFilter::by_name(&container_name(id)))
            .await
            .map_err(|e| AgentError::runtime(id, "list containers", &e))?;
        match running.into_iter().find(ContainerSummary::is_running) {
            Some(container) => Ok((agent, container.id)),
            None => {
                tracing::warn!(agent_id = id, "registered agent has no running container");
                if let Ok(updated) = self.registry.set_state(id, AgentState::Error) {
                    self.persist(&updated);
                }
                Err(AgentError::NotRunning(id.to_string()))
            }
        }
    }

    async fn exec_raw(
        &self,
        id: &str,
        container_id: &str,
        argv: Vec<String>,
        workdir: Option<&str>,
    ) -> AgentResult<ExecOutput> {
        let request = ExecRequest {
            argv,
            workdir: workdir.map(str::to_string),
        };
        self.runtime
            .exec(container_id, &request)
            .await
            .map_err(|e| AgentError::runtime(id, "exec", &e))
    }

    /// Exec and turn a non-zero exit into [`AgentError::CommandFailed`].
    async fn run_checked(
        &self,
        id: &str,
        container_id: &str,
        argv: Vec<String>,
        workdir: Option<&str>,
        operation: &str,
    ) -> AgentResult<ExecOutput> {
        let output = self.exec_raw(id, container_id, argv, workdir).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(AgentError::CommandFailed {
                agent_id: id.to_string(),
                operation: operation.to_string(),
                exit_code: output.exit_code,
                output: output.combined(),
            })
        }
    }

    /// Run a shell command in the agent's working tree and return stdout.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] / [`AgentError::NotRunning`] if the
    /// agent or its container is gone, and [`AgentError::CommandFailed`] on a
    /// non-zero exit.
    #[tracing::instrument(name = "agent.exec", skip(self, command))]
    pub async fn exec(&self, agent_id: &str, command: &str) -> AgentResult<String> {
        let started = Instant::now();
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()];
        let output = self
            .run_checked(
                agent_id,
                &container_id,
                argv,
                Some(container_workdir(agent.use_overlay)),
                "exec",
            )
            .await?;
        self.metrics
            .duration(MetricCategory::ContainerOps, "exec", Some(agent_id), started.elapsed());
        Ok(output.stdout)
    }

    /// Create a branch, optionally checking it out. Two execs, not atomic.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] for a bad branch name, plus the
    /// errors of [`AgentManager::exec`].
    #[tracing::instrument(name = "agent.create_branch", skip(self))]
    pub async fn create_branch(&self, agent_id: &str, branch: &str, checkout: bool) -> AgentResult<()> {
        validate_branch_name(branch).map_err(|reason| AgentError::invalid(agent_id, reason))?;
        let started = Instant::now();
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        self.run_checked(
            agent_id,
            &container_id,
            git::branch_argv(branch),
            Some(container_workdir(agent.use_overlay)),
            "git branch",
        )
        .await?;
        self.metrics
            .duration(MetricCategory::GitOps, "create_branch", Some(agent_id), started.elapsed());
        if checkout {
            self.checkout_branch(agent_id, branch).await?;
        } else {
            self.refresh_status_file(&agent).await;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] for a bad branch name, plus the
    /// errors of [`AgentManager::exec`].
    #[tracing::instrument(name = "agent.checkout_branch", skip(self))]
    pub async fn checkout_branch(&self, agent_id: &str, branch: &str) -> AgentResult<()> {
        validate_branch_name(branch).map_err(|reason| AgentError::invalid(agent_id, reason))?;
        let started = Instant::now();
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        self.run_checked(
            agent_id,
            &container_id,
            git::checkout_argv(branch),
            Some(container_workdir(agent.use_overlay)),
            "git checkout",
        )
        .await?;
        let updated = self.registry.update(agent_id, |a| a.branch = branch.to_string())?;
        self.persist(&updated);
        self.refresh_status_file(&updated).await;
        self.metrics
            .duration(MetricCategory::GitOps, "checkout_branch", Some(agent_id), started.elapsed());
        Ok(())
    }

    /// Point-in-time Git status of the agent's working tree.
    ///
    /// # Errors
    ///
    /// Same as [`AgentManager::exec`].
    #[tracing::instrument(name = "agent.git_status", skip(self))]
    pub async fn git_status(&self, agent_id: &str) -> AgentResult<GitStatus> {
        let started = Instant::now();
        let result = status::git_status(self, agent_id).await?;
        self.metrics
            .duration(MetricCategory::GitOps, "status", Some(agent_id), started.elapsed());
        Ok(result)
    }

    /// Union mount state and layer file counts.
    ///
    /// # Errors
    ///
    /// Same as [`AgentManager::exec`].
    #[tracing::instrument(name = "agent.overlay_status", skip(self))]
    pub async fn overlay_status(&self, agent_id: &str) -> AgentResult<OverlayStatus> {
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        if !agent.use_overlay {
            return Ok(OverlayStatus {
                enabled: false,
                base_files: None,
                diff_files: None,
                merged_files: None,
            });
        }
        let probe = self
            .run_checked(agent_id, &container_id, filesystem::overlay_probe_argv(), None, "probe overlay")
            .await?;
        if probe.stdout.trim() != "enabled" {
            return Ok(OverlayStatus {
                enabled: false,
                base_files: None,
                diff_files: None,
                merged_files: None,
            });
        }
        let mut counts = Vec::with_capacity(3);
        for dir in [CONTAINER_OVERLAY_BASE, CONTAINER_OVERLAY_DIFF, CONTAINER_OVERLAY_MERGED] {
            let out = self
                .exec_raw(agent_id, &container_id, filesystem::count_files_argv(dir), None)
                .await?;
            counts.push(out.stdout.trim().parse::<u64>().ok());
        }
        Ok(OverlayStatus {
            enabled: true,
            base_files: counts[0],
            diff_files: counts[1],
            merged_files: counts[2],
        })
    }

    // ── Dependencies ──────────────────────────────────────────────────────────

    /// Effective package set of an agent, resolved on the host.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] or an I/O error listing a tier.
    pub fn list_dependencies(&self, agent_id: &str) -> AgentResult<Vec<ResolvedDependency>> {
        let agent = self.get_agent(agent_id)?;
        dependency::resolve(&self.fs, &self.layout, &TierSelection::from_agent(&agent))
            .map_err(|e| AgentError::io(agent_id, "list dependencies", &e))
    }

    /// Add a package to the agent's own tier and link it in the container.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] for a bad package name, an I/O
    /// error writing the tier, or the errors of [`AgentManager::exec`].
    #[tracing::instrument(name = "agent.add_dependency", skip(self))]
    pub async fn add_dependency(
        &self,
        agent_id: &str,
        package: &str,
        version: &str,
    ) -> AgentResult<ResolvedDependency> {
        validate_package_name(package).map_err(|reason| AgentError::invalid(agent_id, reason))?;
        let started = Instant::now();
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        dependency::add_package(&self.fs, &self.layout.container_tier(agent_id), package, version)
            .map_err(|e| AgentError::io(agent_id, "add dependency", &e))?;

        let target = format!("{CONTAINER_AGENT_DEPS}/{package}");
        let link = format!("{CONTAINER_LINK_DIR}/{package}");
        let mut script = ShellScript::new();
        script
            .command(&["mkdir", "-p", CONTAINER_LINK_DIR])
            .command(&["ln", "-sfn", target.as_str(), link.as_str()]);
        self.run_checked(agent_id, &container_id, script.into_argv(), None, "link dependency")
            .await?;

        self.metrics.count(MetricCategory::DependencyOps, "add_dependency", Some(agent_id), 1);
        self.metrics
            .duration(MetricCategory::DependencyOps, "add_dependency", Some(agent_id), started.elapsed());
        Ok(ResolvedDependency {
            name: package.to_string(),
            tier: DependencyTier::Container,
            version: Some(version.to_string()),
            overridden: agent.overrides(package),
        })
    }

    /// Re-run the link procedure so packages added to shared tiers after
    /// creation become linked. Returns the number of link commands run.
    ///
    /// # Errors
    ///
    /// Returns a tier listing error or the errors of [`AgentManager::exec`].
    #[tracing::instrument(name = "agent.sync_dependencies", skip(self))]
    pub async fn sync_dependencies(&self, agent_id: &str) -> AgentResult<usize> {
        let started = Instant::now();
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        let script = dependency::link_script(&self.fs, &self.layout, &TierSelection::from_agent(&agent))?;
        let links = script
            .lines()
            .iter()
            .filter(|l| l.starts_with("ln "))
            .count();
        self.run_checked(agent_id, &container_id, script.into_argv(), None, "link dependencies")
            .await?;
        self.metrics
            .duration(MetricCategory::DependencyOps, "sync_dependencies", Some(agent_id), started.elapsed());
        Ok(links)
    }

    /// # Errors
    ///
    /// Returns an error for an invalid team id or an unwritable tier.
    pub fn create_team(&self, team_id: &str) -> Result<PathBuf> {
        let dir = dependency::create_team(&self.fs, &self.layout, team_id)?;
        self.metrics.count(MetricCategory::DependencyOps, "create_team", None, 1);
        Ok(dir)
    }

    /// # Errors
    ///
    /// Returns an error for an invalid team or package, or an unwritable tier.
    pub fn add_team_dependency(&self, team_id: &str, package: &str, version: &str) -> Result<PathBuf> {
        let dir = dependency::add_team_dependency(&self.fs, &self.layout, team_id, package, version)?;
        self.metrics.count(MetricCategory::DependencyOps, "add_team_dependency", None, 1);
        Ok(dir)
    }

    /// # Errors
    ///
    /// Returns an error for an invalid package or an unwritable tier.
    pub fn add_core_dependency(&self, package: &str, version: &str) -> Result<PathBuf> {
        let dir = dependency::add_core_dependency(&self.fs, &self.layout, package, version)?;
        self.metrics.count(MetricCategory::DependencyOps, "add_core_dependency", None, 1);
        Ok(dir)
    }

    // ── Destroy ───────────────────────────────────────────────────────────────

    /// Stop and remove the agent's container, then forget the agent.
    ///
    /// If the container is already gone the registry entry is simply cleaned
    /// up. If stop or remove fails the agent stays registered (state `error`)
    /// and the caller should retry.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NotFound`] if the id is not registered, or the
    /// runtime error of the failed stop/remove.
    #[tracing::instrument(name = "agent.destroy", skip(self))]
    pub async fn destroy(&self, agent_id: &str) -> AgentResult<()> {
        validate_agent_id(agent_id)?;
        let started = Instant::now();
        if !self.registry.contains(agent_id) {
            return Err(AgentError::NotFound(agent_id.to_string()));
        }
        self.registry.set_state(agent_id, AgentState::Destroying)?;

        let containers = match self
            .runtime
            .list_containers(&ContainerFilter::by_name(&container_name(agent_id)).including_stopped())
            .await
        {
            Ok(containers) => containers,
            Err(e) => {
                self.mark_error(agent_id);
                return Err(AgentError::runtime(agent_id, "list containers", &e));
            }
        };

        if containers.is_empty() {
            tracing::warn!(agent_id, "container already gone, cleaning up registry");
        }
        for container in containers {
            if let Err(e) = self
                .runtime
                .stop_container(&container.id, self.options.stop_timeout)
                .await
            {
                self.mark_error(agent_id);
                return Err(AgentError::runtime(agent_id, "stop container", &e));
            }
            if let Err(e) = self.runtime.remove_container(&container.id).await {
                self.mark_error(agent_id);
                return Err(AgentError::runtime(agent_id, "remove container", &e));
            }
        }

        self.registry.remove(agent_id)?;
        if let Err(e) = self.store.remove(agent_id) {
            tracing::warn!(agent_id, error = %format!("{e:#}"), "failed to remove agent record");
        }
        self.remove_private_dirs(agent_id);

        self.metrics.count(MetricCategory::ContainerOps, "destroy_agent", Some(agent_id), 1);
        self.metrics
            .duration(MetricCategory::ContainerOps, "destroy_agent", Some(agent_id), started.elapsed());
        Ok(())
    }

    fn mark_error(&self, agent_id: &str) {
        if let Ok(agent) = self.registry.set_state(agent_id, AgentState::Error) {
            self.persist(&agent);
        }
    }

    // ── Host-side bookkeeping ────────────────────────────────────────────────

    fn persist(&self, agent: &Agent) {
        if let Err(e) = self.store.save(agent) {
            tracing::warn!(agent_id = %agent.id, error = %format!("{e:#}"), "failed to save agent record");
        }
    }

    /// Rewrite `<workspace>/.git-status.md`. Failures are logged only.
    async fn refresh_status_file(&self, agent: &Agent) {
        let body = match status::status_file_contents(self, &agent.id, &agent.branch, &agent.git_config).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(agent_id = %agent.id, error = %e, "failed to collect status file contents");
                return;
            }
        };
        let path = self.layout.status_file(&agent.id);
        if let Err(e) = self.fs.write(&path, &body) {
            tracing::warn!(agent_id = %agent.id, path = %path.display(), error = %format!("{e:#}"), "failed to write status file");
        }
    }
}

impl<R, F, S> AgentShell for AgentManager<R, F, S>
where
    R: ContainerRuntime + ImageStore,
    F: LocalFs,
    S: AgentStateStore,
{
    async fn run_in_workdir(&self, agent_id: &str, argv: &[String]) -> AgentResult<ExecOutput> {
        let (agent, container_id) = self.resolve_container(agent_id).await?;
        self.exec_raw(
            agent_id,
            &container_id,
            argv.to_vec(),
            Some(container_workdir(agent.use_overlay)),
        )
        .await
    }
}
