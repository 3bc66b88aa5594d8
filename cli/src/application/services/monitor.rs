//! Application service — container resource monitor.
//!
//! Samples every running managed container, keeps the latest sample per
//! container id, and records each sample as `resource_usage` gauges.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use capsulate_common::{ContainerStats, MetricCategory};
use chrono::Utc;

use crate::application::ports::{ContainerFilter, ContainerRuntime, MetricsSink};
use crate::domain::layout::MANAGED_LABEL;

pub struct ContainerMonitor {
    latest: RwLock<HashMap<String, ContainerStats>>,
    metrics: Arc<dyn MetricsSink>,
}

impl ContainerMonitor {
    #[must_use]
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            latest: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Take one sample of every running managed container.
    ///
    /// A container whose stats cannot be read is skipped with a warning and
    /// keeps its previous sample; samples of containers that are no longer
    /// running are dropped. Returns the number of containers sampled.
    ///
    /// # Errors
    ///
    /// Returns an error only if the container listing fails.
    pub async fn collect(&self, runtime: &impl ContainerRuntime) -> Result<usize> {
        let filter = ContainerFilter::by_label(&format!("{MANAGED_LABEL}=true"));
        let containers = runtime
            .list_containers(&filter)
            .await
            .context("listing managed containers")?;

        let running: HashSet<&str> = containers
            .iter()
            .filter(|c| c.is_running())
            .map(|c| c.id.as_str())
            .collect();
        self.latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, _| running.contains(id.as_str()));

        let mut sampled = 0;
        for container in containers.iter().filter(|c| c.is_running()) {
            let Some(agent_id) = container.agent_id() else {
                continue;
            };
            let sample = match runtime.stats(&container.id).await {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::warn!(container = %container.id, error = %format!("{e:#}"), "failed to read stats");
                    continue;
                }
            };
            let stats = ContainerStats {
                container_id: container.id.clone(),
                agent_id: agent_id.to_string(),
                cpu_usage: sample.cpu_percent,
                memory_usage: sample.memory_usage,
                memory_limit: sample.memory_limit,
                memory_percent: sample.memory_percent,
                disk_read: sample.block_read,
                disk_write: sample.block_write,
                net_rx: sample.net_rx,
                net_tx: sample.net_tx,
                timestamp: Utc::now(),
            };
            self.record(&stats);
            self.latest
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(stats.container_id.clone(), stats);
            sampled += 1;
        }
        Ok(sampled)
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&self, stats: &ContainerStats) {
        let agent = Some(stats.agent_id.as_str());
        let gauges = [
            ("cpu_usage", stats.cpu_usage),
            ("memory_usage", stats.memory_usage as f64),
            ("memory_percent", stats.memory_percent),
            ("disk_read", stats.disk_read as f64),
            ("disk_write", stats.disk_write as f64),
            ("net_rx", stats.net_rx as f64),
            ("net_tx", stats.net_tx as f64),
        ];
        for (name, value) in gauges {
            self.metrics.gauge(MetricCategory::ResourceUsage, name, agent, value);
        }
    }

    /// Latest sample for one container.
    #[must_use]
    pub fn container_stats(&self, container_id: &str) -> Option<ContainerStats> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container_id)
            .cloned()
    }

    /// Latest samples, sorted by agent id.
    #[must_use]
    pub fn all_stats(&self) -> Vec<ContainerStats> {
        let mut all: Vec<_> = self
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }

    #[must_use]
    pub fn stats_for_agent(&self, agent_id: &str) -> Vec<ContainerStats> {
        self.all_stats()
            .into_iter()
            .filter(|s| s.agent_id == agent_id)
            .collect()
    }

    /// Collect every `interval` until `shutdown` resolves, calling `on_tick`
    /// with the latest samples after each round. Collection errors are
    /// logged and do not stop the loop.
    pub async fn run<F>(
        &self,
        runtime: &impl ContainerRuntime,
        interval: Duration,
        shutdown: F,
        mut on_tick: impl FnMut(&[ContainerStats]),
    ) where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.collect(runtime).await {
                        tracing::warn!(error = %format!("{e:#}"), "stats collection failed");
                    }
                    on_tick(&self.all_stats());
                }
            }
        }
    }
}
