//! Host and container path layout.
//!
//! The host side lives under `<root>/.capsulate/` and must stay stable across
//! releases: agent records, dependency tiers and overlay layers are found by
//! path alone after a restart.

use std::path::{Path, PathBuf};

/// Prefix of every managed container name.
pub const CONTAINER_PREFIX: &str = "capsulate-";
/// Label set on every managed container.
pub const MANAGED_LABEL: &str = "capsulate.managed";
/// Label carrying the agent id.
pub const AGENT_ID_LABEL: &str = "capsulate.agent-id";

/// Name of the per-agent status file in the host workspace.
pub const STATUS_FILE: &str = ".git-status.md";
/// Version marker inside every package directory.
pub const VERSION_FILE: &str = "version";

pub const CONTAINER_WORKSPACE: &str = "/workspace";
pub const CONTAINER_REPO_DIR: &str = "/workspace/repo";
pub const CONTAINER_OVERLAY_BASE: &str = "/workspace/base";
pub const CONTAINER_OVERLAY_DIFF: &str = "/workspace/diff";
pub const CONTAINER_OVERLAY_WORK: &str = "/workspace/work";
pub const CONTAINER_OVERLAY_MERGED: &str = "/workspace/merged";

pub const CONTAINER_CORE_DEPS: &str = "/capsulate/deps/core";
pub const CONTAINER_TEAM_DEPS: &str = "/capsulate/deps/team";
pub const CONTAINER_AGENT_DEPS: &str = "/capsulate/deps/container";
/// Directory the tiers are linked into; exported as `NODE_PATH`.
pub const CONTAINER_LINK_DIR: &str = "/capsulate/node_modules";

pub const CONTAINER_SSH_DIR: &str = "/root/.ssh";

/// A bind mount from the host into an agent container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl Mount {
    #[must_use]
    pub fn read_only(source: impl Into<PathBuf>, target: &str) -> Self {
        Self {
            source: source.into(),
            target: target.to_string(),
            read_only: true,
        }
    }

    #[must_use]
    pub fn read_write(source: impl Into<PathBuf>, target: &str) -> Self {
        Self {
            source: source.into(),
            target: target.to_string(),
            read_only: false,
        }
    }
}

/// Paths under `<root>/.capsulate/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    state_root: PathBuf,
}

impl HostLayout {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            state_root: root.join(".capsulate"),
        }
    }

    #[must_use]
    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.state_root.join("config.yaml")
    }

    #[must_use]
    pub fn agents_dir(&self) -> PathBuf {
        self.state_root.join("agents")
    }

    #[must_use]
    pub fn workspace(&self, agent_id: &str) -> PathBuf {
        self.state_root.join("workspaces").join(agent_id)
    }

    #[must_use]
    pub fn status_file(&self, agent_id: &str) -> PathBuf {
        self.workspace(agent_id).join(STATUS_FILE)
    }

    #[must_use]
    pub fn dependencies_root(&self) -> PathBuf {
        self.state_root.join("dependencies")
    }

    #[must_use]
    pub fn core_tier(&self) -> PathBuf {
        self.dependencies_root().join("core")
    }

    #[must_use]
    pub fn team_tier(&self, team_id: &str) -> PathBuf {
        self.dependencies_root().join("team").join(team_id)
    }

    #[must_use]
    pub fn container_tier(&self, agent_id: &str) -> PathBuf {
        self.dependencies_root().join("container").join(agent_id)
    }

    #[must_use]
    pub fn overlay_base(&self) -> PathBuf {
        self.state_root.join("overlay").join("base")
    }

    #[must_use]
    pub fn overlay_diff(&self, agent_id: &str) -> PathBuf {
        self.state_root.join("overlay").join("diffs").join(agent_id)
    }

    #[must_use]
    pub fn overlay_work(&self, agent_id: &str) -> PathBuf {
        self.state_root.join("overlay").join("work").join(agent_id)
    }
}

#[must_use]
pub fn container_name(agent_id: &str) -> String {
    format!("{CONTAINER_PREFIX}{agent_id}")
}

/// Inverse of [`container_name`]. Accepts the leading `/` docker sometimes
/// reports.
#[must_use]
pub fn agent_id_from_name(name: &str) -> Option<&str> {
    name.trim_start_matches('/')
        .strip_prefix(CONTAINER_PREFIX)
        .filter(|id| !id.is_empty())
}

/// Git working tree inside the container for the chosen workspace mode.
#[must_use]
pub fn container_workdir(use_overlay: bool) -> &'static str {
    if use_overlay {
        CONTAINER_OVERLAY_MERGED
    } else {
        CONTAINER_REPO_DIR
    }
}
