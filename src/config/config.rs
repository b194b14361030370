use crate::alerts::alert_manager::{DEFAULT_ALERTS_INDEX, DEFAULT_CPU_THRESHOLD};
use crate::analysis::log_analyzer::{DEFAULT_INDEX_PATTERN, DEFAULT_TIME_FIELD};
use crate::collectors::metrics_collector::DEFAULT_METRICS_INDEX;
use crate::error::ConfigError;
use crate::transport::{Endpoint, RetryPolicy};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration
///
/// Loaded from a TOML file. Every field has a default, so an empty file (or
/// no file at all) yields a configuration pointing at local services.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub elastic: ElasticConfig,
    pub kibana: KibanaConfig,
    pub alerts: AlertsConfig,
    pub http: HttpConfig,
}

/// Document store settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElasticConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub metrics_index: String,
    pub alerts_index: String,
    pub log_pattern: String,
    pub time_field: String,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            metrics_index: DEFAULT_METRICS_INDEX.to_string(),
            alerts_index: DEFAULT_ALERTS_INDEX.to_string(),
            log_pattern: DEFAULT_INDEX_PATTERN.to_string(),
            time_field: DEFAULT_TIME_FIELD.to_string(),
        }
    }
}

/// Dashboard service settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct KibanaConfig {
    pub url: String,
}

impl Default for KibanaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5601".to_string(),
        }
    }
}

/// Alerting settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    pub webhook_url: Option<String>,
    /// CPU percentage above which `monitor-cpu` raises an alert
    pub cpu_threshold: f64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
        }
    }
}

/// Timeout and retry settings shared by all outgoing requests
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub deadline_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
            deadline_seconds: 60,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            deadline: Duration::from_secs(self.deadline_seconds),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML for this schema, and
    /// `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("elastic.url", &self.elastic.url)?;
        validate_url("kibana.url", &self.kibana.url)?;
        if let Some(webhook_url) = &self.alerts.webhook_url {
            validate_url("alerts.webhook_url", webhook_url)?;
        }

        if self.elastic.password.is_some() && self.elastic.username.is_none() {
            return Err(ConfigError::ValidationError(
                "elastic.password is set without elastic.username".to_string(),
            ));
        }

        for (name, value) in [
            ("elastic.metrics_index", &self.elastic.metrics_index),
            ("elastic.alerts_index", &self.elastic.alerts_index),
            ("elastic.log_pattern", &self.elastic.log_pattern),
            ("elastic.time_field", &self.elastic.time_field),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        if !self.alerts.cpu_threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "alerts.cpu_threshold must be a finite number".to_string(),
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "http.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.http.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "http.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.http.initial_backoff_ms > self.http.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "http.initial_backoff_ms must not exceed http.max_backoff_ms".to_string(),
            ));
        }

        Ok(())
    }

    /// Document store endpoint with credentials, if configured
    pub fn elastic_endpoint(&self) -> Endpoint {
        let endpoint = Endpoint::new(&self.elastic.url);
        match &self.elastic.username {
            Some(username) => endpoint.with_basic_auth(username, self.elastic.password.clone()),
            None => endpoint,
        }
    }

    pub fn kibana_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.kibana.url)
    }
}

fn validate_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be an http(s) URL, got '{}'",
            name, url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.elastic.metrics_index, "metrics");
        assert_eq!(config.elastic.alerts_index, "alerts");
        assert_eq!(config.elastic.log_pattern, "logs-*");
        assert_eq!(config.elastic.time_field, "@timestamp");
        assert_eq!(config.alerts.cpu_threshold, 80.0);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [elastic]
            url = "https://elastic.example.com/"
            username = "sre"
            password = "secret"

            [alerts]
            webhook_url = "https://hooks.example.com/T000"
            cpu_threshold = 92.5

            [http]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.elastic.url, "https://elastic.example.com/");
        assert_eq!(config.elastic.metrics_index, "metrics");
        assert_eq!(config.kibana, KibanaConfig::default());
        assert_eq!(config.alerts.cpu_threshold, 92.5);
        assert_eq!(config.http.max_attempts, 5);
        assert_eq!(config.http.timeout_seconds, 30);
    }

    #[test]
    fn test_elastic_endpoint_with_credentials() {
        let mut config = Config::default();
        config.elastic.url = "https://elastic.example.com/".to_string();
        config.elastic.username = Some("sre".to_string());
        config.elastic.password = Some("secret".to_string());

        let request = config.elastic_endpoint().post("metrics/_doc", serde_json::json!({}));
        assert_eq!(request.url, "https://elastic.example.com/metrics/_doc");
        let auth = request.auth.unwrap();
        assert_eq!(auth.username, "sre");
        assert_eq!(auth.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_kibana_endpoint_has_no_credentials() {
        let config = Config::default();
        let request = config
            .kibana_endpoint()
            .post("api/saved_objects/dashboard", serde_json::json!({}));
        assert!(request.auth.is_none());
    }

    #[test]
    fn test_retry_policy_from_http_config() {
        let http = HttpConfig {
            timeout_seconds: 5,
            max_attempts: 4,
            initial_backoff_ms: 50,
            max_backoff_ms: 400,
            deadline_seconds: 20,
        };

        assert_eq!(http.timeout(), Duration::from_secs(5));
        assert_eq!(
            http.retry_policy(),
            RetryPolicy {
                max_attempts: 4,
                initial_backoff: Duration::from_millis(50),
                max_backoff: Duration::from_millis(400),
                deadline: Duration::from_secs(20),
            }
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = Config::from_toml("[kibana]\nurl = \"localhost:5601\"");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_webhook_rejected() {
        let result = Config::from_toml("[alerts]\nwebhook_url = \"hooks.example.com\"");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_password_without_username_rejected() {
        let result = Config::from_toml("[elastic]\npassword = \"secret\"");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = Config::from_toml("[http]\nmax_attempts = 0");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_backoff_bounds_rejected() {
        let result = Config::from_toml("[http]\ninitial_backoff_ms = 5000\nmax_backoff_ms = 100");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_empty_index_rejected() {
        let result = Config::from_toml("[elastic]\nmetrics_index = \"  \"");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[elastic\nurl = ");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_wrong_type() {
        let result = Config::from_toml("[http]\nmax_attempts = \"three\"");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[kibana]\nurl = \"https://kibana.example.com\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.kibana.url, "https://kibana.example.com");
    }

    #[test]
    fn test_from_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/lookout.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
