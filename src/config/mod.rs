/// TOML configuration with defaults and validation
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{AlertsConfig, Config, ElasticConfig, HttpConfig, KibanaConfig};
