//! Container resource monitor tests.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use capsulate_cli::application::services::ContainerMonitor;
use capsulate_cli::domain::AgentConfig;
use capsulate_cli::infra::metrics::InMemoryMetrics;
use capsulate_common::MetricCategory;

use crate::fakes::{FakeRuntime, Harness, RecordingReporter};

async fn harness_with_agents(ids: &[&str]) -> Harness {
    let h = Harness::new();
    for id in ids {
        h.manager
            .create(&AgentConfig::new(*id), &RecordingReporter::default())
            .await
            .expect("create");
    }
    h
}

#[tokio::test]
async fn test_collect_samples_running_managed_containers() {
    let h = harness_with_agents(&["a1", "a2"]).await;
    let metrics = Arc::new(InMemoryMetrics::new());
    let monitor = ContainerMonitor::new(metrics.clone());

    let sampled = monitor.collect(h.manager.runtime()).await.unwrap();

    assert_eq!(sampled, 2);
    let all = monitor.all_stats();
    let agents: Vec<_> = all.iter().map(|s| s.agent_id.as_str()).collect();
    assert_eq!(agents, ["a1", "a2"]);
    assert_eq!(all[0].memory_usage, 64 * 1024 * 1024);
    assert_eq!(all[0].net_tx, 648);

    let a1 = monitor.stats_for_agent("a1");
    assert_eq!(a1.len(), 1);
    assert_eq!(
        monitor.container_stats(&a1[0].container_id).map(|s| s.agent_id),
        Some("a1".to_string())
    );
    assert_eq!(
        metrics.gauge_value(MetricCategory::ResourceUsage, "cpu_usage", Some("a1")),
        Some(1.5)
    );
    assert_eq!(
        metrics.gauge_value(MetricCategory::ResourceUsage, "memory_percent", Some("a2")),
        Some(6.25)
    );
}

#[tokio::test]
async fn test_collect_skips_stopped_and_unmanaged() {
    let h = harness_with_agents(&["a1"]).await;
    h.runtime.state().containers.values_mut().for_each(|c| c.running = false);

    let monitor = ContainerMonitor::new(Arc::new(InMemoryMetrics::new()));
    assert_eq!(monitor.collect(h.manager.runtime()).await.unwrap(), 0);
    assert!(monitor.all_stats().is_empty());
    assert!(monitor.stats_for_agent("a1").is_empty());
}

#[tokio::test]
async fn test_collect_drops_samples_of_containers_no_longer_running() {
    let h = harness_with_agents(&["a1", "a2", "a3"]).await;
    let monitor = ContainerMonitor::new(Arc::new(InMemoryMetrics::new()));
    assert_eq!(monitor.collect(h.manager.runtime()).await.unwrap(), 3);
    let a1_container = monitor.stats_for_agent("a1")[0].container_id.clone();

    h.runtime
        .state()
        .containers
        .values_mut()
        .filter(|c| c.spec.name == "capsulate-a1")
        .for_each(|c| c.running = false);
    h.runtime.vanish("capsulate-a2");

    assert_eq!(monitor.collect(h.manager.runtime()).await.unwrap(), 1);
    let agents: Vec<_> = monitor.all_stats().into_iter().map(|s| s.agent_id).collect();
    assert_eq!(agents, ["a3"]);
    assert!(monitor.container_stats(&a1_container).is_none());
    assert!(monitor.stats_for_agent("a2").is_empty());
}

#[tokio::test]
async fn test_collect_with_no_containers() {
    let runtime = FakeRuntime::new();
    let monitor = ContainerMonitor::new(Arc::new(InMemoryMetrics::new()));
    assert_eq!(monitor.collect(&runtime).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_ticks_until_shutdown() {
    let h = harness_with_agents(&["a1"]).await;
    let monitor = ContainerMonitor::new(Arc::new(InMemoryMetrics::new()));
    let mut ticks = Vec::new();

    monitor
        .run(
            h.manager.runtime(),
            Duration::from_secs(5),
            tokio::time::sleep(Duration::from_secs(12)),
            |stats| ticks.push(stats.len()),
        )
        .await;

    // Immediate first tick, then at 5s and 10s.
    assert_eq!(ticks, [1, 1, 1]);
}
