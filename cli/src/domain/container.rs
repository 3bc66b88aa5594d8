//! Runtime-reported container facts.

use std::collections::BTreeMap;

use crate::domain::layout::{AGENT_ID_LABEL, MANAGED_LABEL, agent_id_from_name};

/// Coarse container state as the runtime reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
    pub labels: BTreeMap<String, String>,
}

impl ContainerSummary {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.labels.get(MANAGED_LABEL).is_some_and(|v| v == "true")
    }

    /// Agent id from the label, falling back to the container name.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        self.labels
            .get(AGENT_ID_LABEL)
            .map(String::as_str)
            .or_else(|| agent_id_from_name(&self.name))
    }
}

/// Parse docker's `k=v,k2=v2` label column.
#[must_use]
pub fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}
