use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use lookout::alerts::AlertManager;
use lookout::analysis::LogAnalyzer;
use lookout::collectors::{MetricsCollector, SystemMetricsSource};
use lookout::config::Config;
use lookout::dashboards::dashboard_generator::{DEFAULT_AGG_TYPE, DEFAULT_TIME_FIELD};
use lookout::dashboards::DashboardGenerator;
use lookout::error::ConfigError;
use lookout::events::Severity;
use lookout::transport::{HttpTransport, ReqwestTransport};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line arguments for lookout
#[derive(Parser)]
#[command(
    name = "lookout",
    about = "SRE helpers for Elasticsearch and Kibana",
    long_about = "Pushes host metrics, queries logs, raises alerts and creates Kibana \
                  saved objects through the Elasticsearch and Kibana HTTP APIs."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Elasticsearch base URL, overrides the configuration file
    #[arg(long, value_name = "URL")]
    elastic_url: Option<String>,

    /// Kibana base URL, overrides the configuration file
    #[arg(long, value_name = "URL")]
    kibana_url: Option<String>,

    /// Webhook receiving a copy of every alert, overrides the configuration file
    #[arg(long, value_name = "URL")]
    webhook_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Sample host metrics and store them as a document
    CollectMetrics,

    /// Full-text search over log messages, newest first
    Search {
        query: String,
        #[arg(long, default_value_t = 100)]
        size: usize,
    },

    /// Count error-level log entries in the last N hours
    ErrorCount {
        #[arg(long, default_value_t = 1)]
        hours: u32,
    },

    /// Show the most frequent error messages
    TopErrors {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Raise a critical alert if CPU usage exceeds the threshold
    MonitorCpu {
        /// CPU percentage, defaults to alerts.cpu_threshold
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Raise an alert
    Alert {
        title: String,
        message: String,
        #[arg(long, default_value = "warning")]
        severity: Severity,
    },

    /// Create a Kibana index pattern
    CreateIndexPattern {
        pattern: String,
        #[arg(long, default_value = DEFAULT_TIME_FIELD)]
        time_field: String,
    },

    /// Create a Kibana histogram visualization
    CreateVisualization {
        title: String,
        index_pattern: String,
        #[arg(long, default_value = DEFAULT_AGG_TYPE)]
        agg_type: String,
    },

    /// Create a Kibana dashboard from existing visualizations
    CreateDashboard {
        title: String,
        /// Visualization id, repeat for several panels
        #[arg(long = "visualization", value_name = "ID")]
        visualizations: Vec<String>,
    },
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply URL flags on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.elastic_url {
            config.elastic.url = url.clone();
        }
        if let Some(url) = &self.kibana_url {
            config.kibana.url = url.clone();
        }
        if let Some(url) = &self.webhook_url {
            config.alerts.webhook_url = Some(url.clone());
        }
    }
}

/// Load configuration from file or use defaults
///
/// A missing or unreadable file falls back to defaults with a warning. A
/// file that exists but is invalid is an error.
fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => Ok(config),
                Err(ConfigError::ReadError(reason)) => {
                    warn!(
                        "Configuration file not found or unreadable ({}), using defaults",
                        reason
                    );
                    Ok(Config::default())
                }
                Err(e) => Err(e),
            }
        }
        None => {
            info!("Using default configuration");
            Ok(Config::default())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}

async fn run(command: Command, config: &Config) -> anyhow::Result<()> {
    let transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(config.http.timeout(), config.http.retry_policy())
            .context("Failed to create HTTP client")?,
    );

    match command {
        Command::CollectMetrics => {
            let collector = MetricsCollector::new(
                config.elastic_endpoint(),
                transport,
                Arc::new(SystemMetricsSource::new()),
            )
            .with_index_name(&config.elastic.metrics_index);

            let sample = collector.collect().await?;
            print_json(&sample)?;
            if !collector.store(&sample).await {
                bail!("Failed to store metrics");
            }
            info!("Metrics stored successfully");
        }
        Command::Search { query, size } => {
            let hits = log_analyzer(config, transport).search(&query, size).await?;
            print_json(&hits)?;
        }
        Command::ErrorCount { hours } => {
            let count = log_analyzer(config, transport).error_count(hours).await?;
            print_json(&serde_json::json!({ "hours": hours, "error_count": count }))?;
        }
        Command::TopErrors { limit } => {
            let buckets = log_analyzer(config, transport).top_errors(limit).await?;
            print_json(&buckets)?;
        }
        Command::MonitorCpu { threshold } => {
            let threshold = threshold.unwrap_or(config.alerts.cpu_threshold);
            match alert_manager(config, transport).monitor_cpu(threshold).await {
                Some(delivery) => {
                    print_json(&delivery)?;
                    if !delivery.is_fully_delivered() {
                        bail!("Alert '{}' was not fully delivered", delivery.record.title);
                    }
                }
                None => info!("CPU usage below {}%, no alert raised", threshold),
            }
        }
        Command::Alert {
            title,
            message,
            severity,
        } => {
            let delivery = alert_manager(config, transport)
                .create_alert(&title, &message, severity)
                .await;
            print_json(&delivery)?;
            if !delivery.is_fully_delivered() {
                bail!("Alert '{}' was not fully delivered", title);
            }
        }
        Command::CreateIndexPattern {
            pattern,
            time_field,
        } => {
            let created = dashboard_generator(config, transport)
                .create_index_pattern(&pattern, &time_field)
                .await?;
            report_created("Index pattern", &pattern, created)?;
        }
        Command::CreateVisualization {
            title,
            index_pattern,
            agg_type,
        } => {
            let created = dashboard_generator(config, transport)
                .create_visualization(&title, &index_pattern, &agg_type)
                .await?;
            report_created("Visualization", &title, created)?;
        }
        Command::CreateDashboard {
            title,
            visualizations,
        } => {
            let created = dashboard_generator(config, transport)
                .create_dashboard(&title, &visualizations)
                .await?;
            report_created("Dashboard", &title, created)?;
        }
    }

    Ok(())
}

fn log_analyzer(config: &Config, transport: Arc<dyn HttpTransport>) -> LogAnalyzer {
    LogAnalyzer::new(config.elastic_endpoint(), transport)
        .with_index_pattern(&config.elastic.log_pattern)
        .with_time_field(&config.elastic.time_field)
}

fn alert_manager(config: &Config, transport: Arc<dyn HttpTransport>) -> AlertManager {
    AlertManager::new(
        config.elastic_endpoint(),
        config.alerts.webhook_url.clone(),
        transport,
        Arc::new(SystemMetricsSource::new()),
    )
    .with_alerts_index(&config.elastic.alerts_index)
}

fn dashboard_generator(config: &Config, transport: Arc<dyn HttpTransport>) -> DashboardGenerator {
    DashboardGenerator::new(config.kibana_endpoint(), transport)
}

fn report_created(kind: &str, name: &str, created: bool) -> anyhow::Result<()> {
    if created {
        info!("{} '{}' created", kind, name);
        Ok(())
    } else {
        Err(anyhow!("{} '{}' was not created", kind, name))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    cli.apply_overrides(&mut config);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, &config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
