//! Application context — unified state passed to every command handler.
//!
//! `AppContext` wires the docker adapter, host filesystem, agent store and
//! metrics recorder into one `AgentManager` and recovers persisted agents
//! into its registry. Command handlers receive `&AppContext` and never build
//! infrastructure themselves.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::services::{AgentManager, AgentRegistry, ManagerOptions};
use crate::domain::{CapsulateConfig, HostLayout};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::{YamlConfigStore, metrics_dir};
use crate::infra::docker::DockerCli;
use crate::infra::fs::HostFs;
use crate::infra::metrics::InMemoryMetrics;
use crate::infra::state::JsonAgentStore;
use crate::output::OutputContext;

/// The production manager type.
pub type Manager = AgentManager<DockerCli<TokioCommandRunner>, HostFs, JsonAgentStore>;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `CAPSULATE_YES` env vars).
    pub yes: bool,
    /// Directory holding `.capsulate/`; the current directory when unset.
    pub root: Option<PathBuf>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Loaded configuration, environment overrides applied.
    pub config: CapsulateConfig,
    /// Agent lifecycle orchestrator.
    pub manager: Manager,
    /// Recorder behind the manager's metrics sink.
    pub metrics: Arc<InMemoryMetrics>,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `CAPSULATE_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the stored agent records
    /// cannot be read.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("CAPSULATE_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let root = match &flags.behaviour.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let layout = HostLayout::new(&root);
        let config = YamlConfigStore::for_layout(&layout).load()?;

        let metrics = Arc::new(InMemoryMetrics::new());
        let manager = AgentManager::new(
            DockerCli::with_timeouts(config.command_timeout(), config.exec_timeout()),
            HostFs,
            JsonAgentStore::new(layout.agents_dir()),
            Arc::new(AgentRegistry::new()),
            metrics.clone(),
            layout,
            ManagerOptions::from_config(&config),
        );
        let recovered = manager.recover().context("loading agent records")?;
        tracing::debug!(recovered, root = %root.display(), "agent registry loaded");

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            config,
            manager,
            metrics,
            non_interactive,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `CAPSULATE_YES`
    /// env), returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }

    /// Write recorded metrics to the metrics directory. Best-effort.
    pub fn flush_metrics(&self) {
        let dir = match metrics_dir(&self.config) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "metrics not flushed");
                return;
            }
        };
        match self.metrics.flush(&dir) {
            Ok(Some(path)) => tracing::debug!(path = %path.display(), "metrics flushed"),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "metrics not flushed"),
        }
    }
}
