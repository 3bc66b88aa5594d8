use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dependency isolation level chosen for an agent at creation time.
///
/// Every level links the shared `core` tier and the agent's private
/// `container` tier; only `Team` additionally links the team tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DependencyLevel {
    Core,
    Team,
    #[default]
    Container,
}

impl DependencyLevel {
    pub const ALL: [DependencyLevel; 3] = [Self::Core, Self::Team, Self::Container];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Team => "team",
            Self::Container => "container",
        }
    }
}

impl fmt::Display for DependencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a [`DependencyLevel`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid dependency level '{0}': expected one of core, team, container")]
pub struct ParseDependencyLevelError(pub String);

impl FromStr for DependencyLevel {
    type Err = ParseDependencyLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(Self::Core),
            "team" => Ok(Self::Team),
            "container" => Ok(Self::Container),
            other => Err(ParseDependencyLevelError(other.to_string())),
        }
    }
}

/// One of the three dependency scopes, ordered by increasing precedence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DependencyTier {
    Core,
    Team,
    Container,
}

impl fmt::Display for DependencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Core => "core",
            Self::Team => "team",
            Self::Container => "container",
        })
    }
}

/// A package as seen from inside an agent: the tier it resolves to and the
/// contents of its version marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub name: String,
    pub tier: DependencyTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `true` when the name is in the agent's override list.
    #[serde(default)]
    pub overridden: bool,
}

/// Lifecycle state of a managed agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Creating,
    #[default]
    Ready,
    Destroying,
    Destroyed,
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Destroying => "destroying",
            Self::Destroyed => "destroyed",
            Self::Error => "error",
        })
    }
}

/// Point-in-time Git snapshot of an agent's working tree.
///
/// Assembled from several independent commands, so it is not a consistent
/// view of a tree that is being modified concurrently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GitStatus {
    pub branch: String,
    pub current_commit: String,
    pub modified_files: Vec<String>,
    pub untracked_files: Vec<String>,
    pub ahead_count: u32,
    pub behind_count: u32,
}

impl GitStatus {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.modified_files.is_empty() && self.untracked_files.is_empty()
    }
}

/// Resource usage sample for one agent container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerStats {
    pub container_id: String,
    pub agent_id: String,
    #[serde(rename = "cpu_usage_percent")]
    pub cpu_usage: f64,
    #[serde(rename = "memory_usage_bytes")]
    pub memory_usage: u64,
    #[serde(rename = "memory_limit_bytes")]
    pub memory_limit: u64,
    #[serde(rename = "memory_usage_percent")]
    pub memory_percent: f64,
    #[serde(rename = "disk_read_bytes")]
    pub disk_read: u64,
    #[serde(rename = "disk_write_bytes")]
    pub disk_write: u64,
    #[serde(rename = "network_rx_bytes")]
    pub net_rx: u64,
    #[serde(rename = "network_tx_bytes")]
    pub net_tx: u64,
    pub timestamp: DateTime<Utc>,
}

/// Union-mount status of an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverlayStatus {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_files: Option<u64>,
}
