//! Records written to the document store
//!
//! Metric samples and alert records are built once, serialized as JSON and
//! posted as new documents. Neither has an update or delete path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Point-in-time host resource usage
///
/// Field names match the documents stored in the metrics index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// When the sample was taken
    pub timestamp: Timestamp,
    /// CPU usage as a percentage (0-100)
    pub cpu_percent: f64,
    /// Used memory as a percentage of total memory (0-100)
    pub memory_percent: f64,
    /// Used space on the root filesystem as a percentage (0-100)
    pub disk_percent: f64,
    /// One-minute load average, 0 where the platform has none
    pub load_average: f64,
}

/// Alert document stored in the alerts index and forwarded to webhooks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    pub timestamp: Timestamp,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl AlertRecord {
    /// Build a record stamped with the current time
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: Utc::now(),
            title: title.into(),
            message: message.into(),
            severity,
        }
    }
}

/// Severity level for alerts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no action required
    Info,
    /// May require attention
    Warning,
    /// Requires immediate attention
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "unknown severity '{}' (expected info, warning or critical)",
                other
            )),
        }
    }
}
