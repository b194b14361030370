/// Search and aggregation queries over log indices
pub mod log_analyzer;

pub use log_analyzer::{ErrorBucket, LogAnalyzer};
