//! In-memory `MetricsSink` with JSON flush.
//!
//! Each CLI process records into an `InMemoryMetrics` and flushes one
//! `metrics-YYYYMMDD-HHMMSS.json` summary on exit. `metrics show` merges
//! every flushed file back into one summary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use capsulate_common::{MetricCategory, MetricsSummary, OperationSummary};
use chrono::Utc;

use crate::application::ports::MetricsSink;

const FILE_PREFIX: &str = "metrics-";
/// Key used for metrics recorded without an agent.
const GLOBAL_KEY: &str = "global";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MetricKey {
    category: MetricCategory,
    operation: String,
    agent: Option<String>,
}

impl MetricKey {
    fn new(category: MetricCategory, operation: &str, agent: Option<&str>) -> Self {
        Self {
            category,
            operation: operation.to_string(),
            agent: agent.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    count: u64,
    total_ms: u64,
    min_ms: u64,
    max_ms: u64,
}

#[derive(Debug, Default)]
struct Recorded {
    counters: BTreeMap<MetricKey, u64>,
    gauges: BTreeMap<MetricKey, f64>,
    timings: BTreeMap<MetricKey, Timing>,
}

impl Recorded {
    fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty() && self.timings.is_empty()
    }
}

fn entry<'a>(summary: &'a mut MetricsSummary, key: &MetricKey) -> &'a mut OperationSummary {
    summary
        .categories
        .entry(key.category.as_str().to_string())
        .or_default()
        .entry(key.operation.clone())
        .or_default()
}

/// Process-local recorder.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    inner: Mutex<Recorded>,
}

impl InMemoryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn counter(&self, category: MetricCategory, operation: &str, agent_id: Option<&str>) -> u64 {
        let key = MetricKey::new(category, operation, agent_id);
        self.with(|r| r.counters.get(&key).copied().unwrap_or(0))
    }

    #[must_use]
    pub fn gauge_value(
        &self,
        category: MetricCategory,
        operation: &str,
        agent_id: Option<&str>,
    ) -> Option<f64> {
        let key = MetricKey::new(category, operation, agent_id);
        self.with(|r| r.gauges.get(&key).copied())
    }

    /// Everything recorded so far, aggregated across agents.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        self.with(|recorded| {
            let mut summary = MetricsSummary {
                generated_at: Some(Utc::now()),
                categories: BTreeMap::new(),
            };
            for (key, count) in &recorded.counters {
                entry(&mut summary, key).count += count;
            }
            for (key, value) in &recorded.gauges {
                let agent = key.agent.clone().unwrap_or_else(|| GLOBAL_KEY.to_string());
                entry(&mut summary, key).gauges.insert(agent, *value);
            }
            for (key, timing) in &recorded.timings {
                entry(&mut summary, key).merge(&OperationSummary {
                    timed: timing.count,
                    total_ms: timing.total_ms,
                    min_ms: Some(timing.min_ms),
                    max_ms: Some(timing.max_ms),
                    ..OperationSummary::default()
                });
            }
            summary
        })
    }

    pub fn clear(&self) {
        self.with(|r| *r = Recorded::default());
    }

    /// Write the summary to `dir` and clear. Nothing is written when no
    /// metric was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn flush(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.with(|r| r.is_empty()) {
            return Ok(None);
        }
        let summary = self.summary();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating metrics directory {}", dir.display()))?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let mut path = dir.join(format!("{FILE_PREFIX}{stamp}.json"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{FILE_PREFIX}{stamp}-{n}.json"));
            n += 1;
        }
        let content = serde_json::to_string_pretty(&summary).context("serializing metrics")?;
        std::fs::write(&path, content)
            .with_context(|| format!("writing metrics file {}", path.display()))?;
        self.clear();
        Ok(Some(path))
    }
}

impl MetricsSink for InMemoryMetrics {
    fn count(&self, category: MetricCategory, operation: &str, agent_id: Option<&str>, value: u64) {
        let key = MetricKey::new(category, operation, agent_id);
        self.with(|r| *r.counters.entry(key).or_insert(0) += value);
    }

    fn gauge(&self, category: MetricCategory, operation: &str, agent_id: Option<&str>, value: f64) {
        let key = MetricKey::new(category, operation, agent_id);
        self.with(|r| {
            r.gauges.insert(key, value);
        });
    }

    fn duration(
        &self,
        category: MetricCategory,
        operation: &str,
        agent_id: Option<&str>,
        elapsed: Duration,
    ) {
        let key = MetricKey::new(category, operation, agent_id);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.with(|r| {
            r.timings
                .entry(key)
                .and_modify(|t| {
                    t.count += 1;
                    t.total_ms = t.total_ms.saturating_add(ms);
                    t.min_ms = t.min_ms.min(ms);
                    t.max_ms = t.max_ms.max(ms);
                })
                .or_insert(Timing {
                    count: 1,
                    total_ms: ms,
                    min_ms: ms,
                    max_ms: ms,
                });
        });
    }
}

fn flushed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("reading {}", dir.display()))?.path();
        let is_metrics = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".json"));
        if is_metrics {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Merge every flushed summary in `dir`, oldest first. Unreadable files are
/// skipped with a warning.
///
/// # Errors
///
/// Returns an error if `dir` exists but cannot be listed.
pub fn load_flushed(dir: &Path) -> Result<MetricsSummary> {
    let mut merged = MetricsSummary::default();
    for path in flushed_files(dir)? {
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|c| serde_json::from_str::<MetricsSummary>(&c).map_err(Into::into));
        match parsed {
            Ok(summary) => merged.merge(&summary),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping metrics file"),
        }
    }
    Ok(merged)
}

/// Delete every flushed summary in `dir`; returns how many were removed.
///
/// # Errors
///
/// Returns an error if a file cannot be deleted.
pub fn clear_flushed(dir: &Path) -> Result<usize> {
    let files = flushed_files(dir)?;
    for path in &files {
        std::fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
    }
    Ok(files.len())
}
