//! Domain types and validators for capsulate configuration.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `<root>/.capsulate/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CapsulateConfig {
    /// Image every agent container runs.
    pub base_image: String,
    /// Image the base image is built from when missing.
    pub builder_image: String,
    /// Grace period before a stopping container is killed.
    pub stop_timeout_secs: u64,
    /// Timeout for runtime management calls (create, start, list, ...).
    pub command_timeout_secs: u64,
    /// Timeout for commands executed inside an agent.
    pub exec_timeout_secs: u64,
    /// Polling interval for `monitor watch`, e.g. `5s`.
    pub monitor_interval: String,
    /// Mount `~/.ssh` read-only into agents.
    pub mount_ssh: bool,
    /// Where flushed metrics files go.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<PathBuf>,
}

impl Default for CapsulateConfig {
    fn default() -> Self {
        Self {
            base_image: "capsulate-base:latest".to_string(),
            builder_image: "ubuntu:latest".to_string(),
            stop_timeout_secs: 10,
            command_timeout_secs: 60,
            exec_timeout_secs: 600,
            monitor_interval: "5s".to_string(),
            mount_ssh: true,
            metrics_path: None,
        }
    }
}

impl CapsulateConfig {
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    /// Parsed monitor interval.
    ///
    /// # Errors
    ///
    /// Returns an error if `monitor_interval` is not a valid duration.
    pub fn monitor_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.monitor_interval).ok_or_else(|| ConfigError::InvalidValue {
            key: "monitor_interval".to_string(),
            value: self.monitor_interval.clone(),
        })
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Parse `500ms`, `5s`, `2m` or `1h`. A bare number is seconds. Zero is
/// rejected.
#[must_use]
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: u64 = number.parse().ok()?;
    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.checked_mul(60)?),
        "h" => Duration::from_secs(value.checked_mul(3600)?),
        _ => return None,
    };
    (!duration.is_zero()).then_some(duration)
}

// ── Unit tests ───────────────────────────────────────────────────────────────
