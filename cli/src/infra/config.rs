//! YAML configuration loading with environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::config::{CapsulateConfig, parse_duration};
use crate::domain::HostLayout;

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "CAPSULATE_CONFIG";
/// Overrides `monitor_interval`.
pub const MONITOR_INTERVAL_ENV: &str = "CAPSULATE_MONITOR_INTERVAL";
/// Overrides the metrics directory.
pub const METRICS_PATH_ENV: &str = "GIT_CAPSULATE_METRICS_PATH";

/// Reads `config.yaml` from disk. A missing file yields the defaults.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store for `<root>/.capsulate/config.yaml`, or `$CAPSULATE_CONFIG` when set.
    #[must_use]
    pub fn for_layout(layout: &HostLayout) -> Self {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => Self::new(PathBuf::from(path)),
            _ => Self::new(layout.config_file()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<CapsulateConfig> {
        let mut config = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("cannot read {}", self.path.display()))?;
            if content.trim().is_empty() {
                CapsulateConfig::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("cannot parse {}", self.path.display()))?
            }
        } else {
            CapsulateConfig::default()
        };
        apply_env_overrides(&mut config);
        Ok(config)
    }
}

fn apply_env_overrides(config: &mut CapsulateConfig) {
    if let Ok(raw) = std::env::var(MONITOR_INTERVAL_ENV) {
        if parse_duration(&raw).is_some() {
            config.monitor_interval = raw;
        } else {
            tracing::warn!(value = %raw, "ignoring invalid {MONITOR_INTERVAL_ENV}");
        }
    }
    if let Ok(path) = std::env::var(METRICS_PATH_ENV)
        && !path.is_empty()
    {
        config.metrics_path = Some(PathBuf::from(path));
    }
}

/// Directory flushed metrics are written to: the configured path, else
/// `~/.git-capsulate/metrics`.
///
/// # Errors
///
/// Returns an error if no path is configured and the home directory cannot
/// be determined.
pub fn metrics_dir(config: &CapsulateConfig) -> Result<PathBuf> {
    if let Some(path) = &config.metrics_path {
        return Ok(path.clone());
    }
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".git-capsulate").join("metrics"))
}
