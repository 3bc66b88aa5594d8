//! Infrastructure implementation of the `AgentStateStore` port.
//!
//! `JsonAgentStore` keeps one JSON record per agent under
//! `<root>/.capsulate/agents/`, written atomically (temp file + rename) so a
//! crash never leaves a truncated record behind.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::AgentStateStore;
use crate::domain::Agent;
use crate::domain::agent::validate_agent_id;

pub struct JsonAgentStore {
    dir: PathBuf,
}

impl JsonAgentStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, agent_id: &str) -> Result<PathBuf> {
        validate_agent_id(agent_id)?;
        Ok(self.dir.join(format!("{agent_id}.json")))
    }
}

impl AgentStateStore for JsonAgentStore {
    fn load_all(&self) -> Result<Vec<Agent>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.dir.display()));
            }
        };

        let mut agents = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("reading {}", self.dir.display()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading agent record {}", path.display()))?;
            match serde_json::from_str::<Agent>(&content) {
                Ok(agent) if validate_agent_id(&agent.id).is_ok() => agents.push(agent),
                Ok(agent) => {
                    tracing::warn!(path = %path.display(), id = %agent.id, "skipping record with invalid agent id");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable agent record");
                }
            }
        }
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(agents)
    }

    fn save(&self, agent: &Agent) -> Result<()> {
        let path = self.record_path(&agent.id)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating directory {}", self.dir.display()))?;
        let content = serde_json::to_string_pretty(agent).context("serializing agent record")?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, &path)
            .with_context(|| format!("finalizing agent record {}", path.display()))
    }

    fn remove(&self, agent_id: &str) -> Result<()> {
        let path = self.record_path(agent_id)?;
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other.with_context(|| format!("removing agent record {}", path.display())),
        }
    }
}
