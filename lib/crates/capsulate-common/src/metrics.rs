use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category a metric is recorded under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    GitOps,
    ContainerOps,
    FileOps,
    DependencyOps,
    ResourceUsage,
}

impl MetricCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitOps => "git_ops",
            Self::ContainerOps => "container_ops",
            Self::FileOps => "file_ops",
            Self::DependencyOps => "dependency_ops",
            Self::ResourceUsage => "resource_usage",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate for one operation within a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    /// Sum of recorded counts.
    pub count: u64,
    /// Number of timed runs.
    pub timed: u64,
    pub total_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_ms: Option<f64>,
    /// Latest gauge value per agent (`global` when recorded without one).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gauges: BTreeMap<String, f64>,
}

impl OperationSummary {
    #[allow(clippy::cast_precision_loss)]
    fn recompute_average(&mut self) {
        self.avg_ms = (self.timed > 0).then(|| self.total_ms as f64 / self.timed as f64);
    }

    /// Fold `other` into `self`. Later gauges win.
    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.timed += other.timed;
        self.total_ms += other.total_ms;
        self.min_ms = match (self.min_ms, other.min_ms) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_ms = match (self.max_ms, other.max_ms) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.gauges
            .extend(other.gauges.iter().map(|(k, v)| (k.clone(), *v)));
        self.recompute_average();
    }
}

/// Summary grouped by category name, then operation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub categories: BTreeMap<String, BTreeMap<String, OperationSummary>>,
}

impl MetricsSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Fold `other` into `self`. Later gauges win.
    pub fn merge(&mut self, other: &Self) {
        for (category, operations) in &other.categories {
            let target = self.categories.entry(category.clone()).or_default();
            for (operation, summary) in operations {
                target.entry(operation.clone()).or_default().merge(summary);
            }
        }
        self.generated_at = self.generated_at.max(other.generated_at);
    }

    #[must_use]
    pub fn operation(&self, category: MetricCategory, operation: &str) -> Option<&OperationSummary> {
        self.categories.get(category.as_str())?.get(operation)
    }
}
