//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use capsulate_common::MetricCategory;

use crate::domain::{Agent, AgentResult, ContainerSummary, Mount, StatsSample};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Everything needed to create one agent container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Container command; keeps the container alive between execs.
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub mounts: Vec<Mount>,
    pub labels: BTreeMap<String, String>,
    /// Required for in-container union mounts.
    pub privileged: bool,
}

/// Selects containers in [`ContainerRuntime::list_containers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Exact container name.
    pub name: Option<String>,
    /// `key` or `key=value`.
    pub label: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilter {
    #[must_use]
    pub fn by_name(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn by_label(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn including_stopped(mut self) -> Self {
        self.all = true;
        self
    }
}

/// A command to run inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub argv: Vec<String>,
    pub workdir: Option<String>,
}

/// Captured result of an in-container command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout and stderr joined, for error messages.
    #[must_use]
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Container Runtime Ports ───────────────────────────────────────────────────

/// Container lifecycle and inspection. Errors carry the runtime's own message.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>>;
    /// Create (but do not start) a container; returns its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;
    async fn start_container(&self, id: &str) -> Result<()>;
    /// Stop with a grace period, then kill.
    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;
    async fn remove_container(&self, id: &str) -> Result<()>;
    /// Block until the container exits; returns its exit code.
    async fn wait_container(&self, id: &str) -> Result<i64>;
    /// Run a command inside a running container. A non-zero exit is not an
    /// error at this level.
    async fn exec(&self, id: &str, request: &ExecRequest) -> Result<ExecOutput>;
    /// One resource sample.
    async fn stats(&self, id: &str) -> Result<StatsSample>;
}

/// Image operations needed to provision the base image.
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    async fn image_exists(&self, image: &str) -> Result<bool>;
    async fn pull_image(&self, image: &str) -> Result<()>;
    /// Snapshot a container's filesystem as `image`.
    async fn commit_container(&self, id: &str, image: &str) -> Result<()>;
}

// ── Agent Shell Port ──────────────────────────────────────────────────────────

/// Command execution in an agent's Git working tree, by agent id.
///
/// The status reporter depends only on this, not on the orchestrator.
#[allow(async_fn_in_trait)]
pub trait AgentShell {
    /// Run `argv` in the agent's working tree. A non-zero exit is returned as
    /// output, not as an error.
    async fn run_in_workdir(&self, agent_id: &str, argv: &[String]) -> AgentResult<ExecOutput>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Metrics Port ──────────────────────────────────────────────────────────────

/// Receives counters, gauges and durations at operation boundaries.
///
/// Sync and infallible: recording a metric never fails an operation.
pub trait MetricsSink: Send + Sync {
    fn count(&self, category: MetricCategory, operation: &str, agent_id: Option<&str>, value: u64);
    fn gauge(&self, category: MetricCategory, operation: &str, agent_id: Option<&str>, value: f64);
    fn duration(
        &self,
        category: MetricCategory,
        operation: &str,
        agent_id: Option<&str>,
        elapsed: Duration,
    );
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn count(&self, _: MetricCategory, _: &str, _: Option<&str>, _: u64) {}
    fn gauge(&self, _: MetricCategory, _: &str, _: Option<&str>, _: f64) {}
    fn duration(&self, _: MetricCategory, _: &str, _: Option<&str>, _: Duration) {}
}

// ── State and Filesystem Ports ────────────────────────────────────────────────

/// Persists agent records so a fresh process can rebuild its registry.
pub trait AgentStateStore {
    /// Load every stored agent record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_all(&self) -> Result<Vec<Agent>>;
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn save(&self, agent: &Agent) -> Result<()>;
    /// Removing an absent record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be deleted.
    fn remove(&self, agent_id: &str) -> Result<()>;
}

/// Host filesystem access for tier, workspace and overlay directories.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Removing an absent directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Names of the sub-directories of `path`, sorted. An absent directory
    /// lists as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` exists but cannot be read.
    fn list_dirs(&self, path: &Path) -> Result<Vec<String>>;
    /// Home directory, if one can be determined.
    fn home_dir(&self) -> Option<PathBuf>;
}
