//! Agent configuration, the persisted agent record, and pure validation.
//!
//! Every identifier that later reaches a host path, a container name or a
//! shell token is checked here, before any external call is made.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use capsulate_common::{AgentState, DependencyLevel};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::{AgentError, AgentResult};

/// Agent and team ids: used verbatim as directory names and container name
/// suffixes, so no path separators and no leading dot or dash.
pub static AGENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: compile-time constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]{0,62}$").expect("valid regex")
});

/// Package names as npm accepts them, minus the scope separator.
pub static PACKAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9@_][A-Za-z0-9._@+-]{0,213}$").expect("valid regex")
});

/// `section.key` or `section.subsection.key`.
pub static GIT_CONFIG_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z][A-Za-z0-9-]*(\.[^\s=]+)?\.[A-Za-z][A-Za-z0-9-]*$").expect("valid regex")
});

/// Everything the caller supplies to `create`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    pub id: String,
    pub repo_url: Option<String>,
    /// Empty means "whatever the clone checks out".
    pub branch: Option<String>,
    /// `0` clones full history.
    pub depth: u32,
    pub git_config: BTreeMap<String, String>,
    pub dependency_level: DependencyLevel,
    pub team_id: Option<String>,
    pub override_dependencies: Vec<String>,
    pub use_overlay: bool,
}

impl AgentConfig {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Team id only when the level actually links the team tier.
    #[must_use]
    pub fn effective_team(&self) -> Option<&str> {
        match self.dependency_level {
            DependencyLevel::Team => self.team_id.as_deref().filter(|t| !t.is_empty()),
            DependencyLevel::Core | DependencyLevel::Container => None,
        }
    }

    #[must_use]
    pub fn requested_branch(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| !b.is_empty())
    }

    #[must_use]
    pub fn overrides(&self, package: &str) -> bool {
        self.override_dependencies.iter().any(|p| p == package)
    }
}

/// One managed agent as the registry and the state store see it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub container_id: String,
    pub branch: String,
    pub dependency_level: DependencyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default)]
    pub override_dependencies: Vec<String>,
    #[serde(default)]
    pub use_overlay: bool,
    pub host_workspace: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Git config applied at creation; shown in the status file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub git_config: BTreeMap<String, String>,
    #[serde(default)]
    pub state: AgentState,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    #[must_use]
    pub fn overrides(&self, package: &str) -> bool {
        self.override_dependencies.iter().any(|p| p == package)
    }
}

/// Validate a complete agent configuration.
///
/// # Errors
///
/// Returns [`AgentError::InvalidConfig`] naming the first offending field.
pub fn validate_config(config: &AgentConfig) -> AgentResult<()> {
    let id = config.id.as_str();
    validate_agent_id(id)?;

    if config.dependency_level == DependencyLevel::Team {
        match config.team_id.as_deref() {
            None | Some("") => {
                return Err(AgentError::invalid(
                    id,
                    "team_id is required when dependency level is 'team'",
                ));
            }
            Some(team) => validate_team_id(team).map_err(|reason| AgentError::invalid(id, reason))?,
        }
    }

    if let Some(url) = config.repo_url.as_deref() {
        validate_repo_url(url).map_err(|reason| AgentError::invalid(id, reason))?;
    }
    if let Some(branch) = config.requested_branch() {
        validate_branch_name(branch).map_err(|reason| AgentError::invalid(id, reason))?;
    }
    for (key, value) in &config.git_config {
        if !GIT_CONFIG_KEY_RE.is_match(key) {
            return Err(AgentError::invalid(id, format!("invalid git config key '{key}'")));
        }
        if value.contains('\n') {
            return Err(AgentError::invalid(
                id,
                format!("git config value for '{key}' must be a single line"),
            ));
        }
    }
    for package in &config.override_dependencies {
        validate_package_name(package).map_err(|reason| AgentError::invalid(id, reason))?;
    }
    Ok(())
}

/// # Errors
///
/// Returns [`AgentError::InvalidConfig`] when `id` is empty or not a safe name.
pub fn validate_agent_id(id: &str) -> AgentResult<()> {
    if id.is_empty() {
        return Err(AgentError::invalid(id, "agent id is required"));
    }
    if !AGENT_ID_RE.is_match(id) {
        return Err(AgentError::invalid(
            id,
            "agent id must start with a letter or digit and contain only letters, digits, '.', '_' or '-' (max 63 chars)",
        ));
    }
    Ok(())
}

/// # Errors
///
/// Returns the reason the team id was rejected.
pub fn validate_team_id(team: &str) -> Result<(), String> {
    if AGENT_ID_RE.is_match(team) {
        Ok(())
    } else {
        Err(format!(
            "team id '{team}' must start with a letter or digit and contain only letters, digits, '.', '_' or '-'"
        ))
    }
}

/// # Errors
///
/// Returns the reason the package name was rejected.
pub fn validate_package_name(name: &str) -> Result<(), String> {
    if name == "." || name == ".." || !PACKAGE_NAME_RE.is_match(name) {
        return Err(format!("invalid package name '{name}'"));
    }
    Ok(())
}

/// Subset of `git check-ref-format` rules.
///
/// # Errors
///
/// Returns the reason the branch name was rejected.
pub fn validate_branch_name(branch: &str) -> Result<(), String> {
    let bad = branch.is_empty()
        || branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with('.')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("@{")
        || branch.contains("//")
        || branch.split('/').any(|part| part.starts_with('.'))
        || branch
            .chars()
            .any(|c| c.is_ascii_control() || c.is_whitespace() || "~^:?*[\\".contains(c));
    if bad {
        Err(format!("invalid branch name '{branch}'"))
    } else {
        Ok(())
    }
}

/// # Errors
///
/// Returns the reason the repository URL was rejected.
pub fn validate_repo_url(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        return Err("repository URL must not be empty".to_string());
    }
    if url.starts_with('-') {
        return Err(format!("repository URL '{url}' must not start with '-'"));
    }
    if url.chars().any(|c| c.is_ascii_control()) {
        return Err("repository URL must not contain control characters".to_string());
    }
    Ok(())
}
