pub mod metrics;
pub mod types;

pub use metrics::{MetricCategory, MetricsSummary, OperationSummary};
pub use types::*;
