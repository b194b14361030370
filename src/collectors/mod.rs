/// Host metrics sources
pub mod metrics_source;

/// Metrics collector writing samples to the document store
pub mod metrics_collector;

pub use metrics_collector::MetricsCollector;
#[cfg(test)]
pub use metrics_source::MockMetricsSource;
pub use metrics_source::{sample_blocking, MetricsSource, SystemMetricsSource};
