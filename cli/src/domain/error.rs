//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use capsulate_common::DependencyTier;
use thiserror::Error;

/// Result alias for agent lifecycle operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

// ── Registry errors ───────────────────────────────────────────────────────────

/// Errors raised by the in-process agent registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Agent '{0}' already exists.")]
    AlreadyExists(String),

    #[error("Agent '{0}' not found.")]
    NotFound(String),
}

// ── Agent errors ──────────────────────────────────────────────────────────────

/// Every failure surfaced by the lifecycle orchestrator.
///
/// Variants fall into four groups: validation (`InvalidConfig`), conflict
/// (`AlreadyExists`), not-found (`NotFound`, `NotRunning`) and infrastructure
/// (everything else). Infrastructure variants keep the underlying runtime or
/// subprocess message verbatim.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid configuration for agent '{agent_id}': {reason}")]
    InvalidConfig { agent_id: String, reason: String },

    #[error("Agent '{0}' already exists. Destroy it first: git-capsulate destroy {0}")]
    AlreadyExists(String),

    #[error("Agent '{0}' not found.")]
    NotFound(String),

    #[error(
        "Agent '{0}' is registered but its container is not running. \
         Run 'git-capsulate destroy {0}' to clean it up."
    )]
    NotRunning(String),

    #[error("{operation} failed for agent '{agent_id}' (exit code {exit_code}): {output}")]
    CommandFailed {
        agent_id: String,
        operation: String,
        exit_code: i64,
        output: String,
    },

    #[error("{tier} dependency tier unavailable for agent '{agent_id}' at {}: {message}", path.display())]
    DependencyTierUnavailable {
        agent_id: String,
        tier: DependencyTier,
        path: PathBuf,
        message: String,
    },

    #[error("{operation} failed for agent '{agent_id}': {message}")]
    Runtime {
        agent_id: String,
        operation: String,
        message: String,
    },

    #[error("{cause}; cleanup of agent '{agent_id}' also failed: {cleanup}")]
    RollbackFailed {
        agent_id: String,
        cause: Box<AgentError>,
        cleanup: String,
    },

    #[error("{operation} failed for agent '{agent_id}': {message}")]
    Io {
        agent_id: String,
        operation: String,
        message: String,
    },
}

impl AgentError {
    pub fn invalid(agent_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            agent_id: agent_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap an infrastructure failure, keeping its full context chain.
    pub fn runtime(agent_id: &str, operation: &str, err: &anyhow::Error) -> Self {
        Self::Runtime {
            agent_id: agent_id.to_string(),
            operation: operation.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn io(agent_id: &str, operation: &str, err: &anyhow::Error) -> Self {
        Self::Io {
            agent_id: agent_id.to_string(),
            operation: operation.to_string(),
            message: format!("{err:#}"),
        }
    }

    /// Stable machine-readable code used by `--json` error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "invalid_config",
            Self::AlreadyExists(_) => "agent_already_exists",
            Self::NotFound(_) => "agent_not_found",
            Self::NotRunning(_) => "agent_not_running",
            Self::CommandFailed { .. } => "command_failed",
            Self::DependencyTierUnavailable { .. } => "dependency_tier_unavailable",
            Self::Runtime { .. } => "runtime_error",
            Self::RollbackFailed { .. } => "rollback_failed",
            Self::Io { .. } => "io_error",
        }
    }

    /// `true` for errors the caller fixes by changing input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

impl From<RegistryError> for AgentError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists(id) => Self::AlreadyExists(id),
            RegistryError::NotFound(id) => Self::NotFound(id),
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
