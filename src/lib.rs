/// Error types for every client and the configuration layer
pub mod error;

/// Metric samples and alert records
pub mod events;

/// HTTP transport, retry policy and test double
pub mod transport;

/// Host metrics sources and the metrics collector
pub mod collectors;

/// Log search and error aggregation
pub mod analysis;

/// Threshold checks and alert delivery
pub mod alerts;

/// Kibana saved-object creation
pub mod dashboards;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{AlertError, CollectorError, ConfigError, StoreError, TransportError};
