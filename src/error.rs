use thiserror::Error;

/// Errors raised by the HTTP transport layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// No connection was established, so the request was never sent
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read response body: {0}")]
    InvalidBody(String),

    #[error("Retry deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded { attempts: u32 },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Errors that can occur when querying the document store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Document store returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Time window of {0} hours is out of range")]
    WindowOutOfRange(u32),
}

/// Errors that can occur while sampling host metrics
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Metrics sampling task failed: {0}")]
    SamplingFailed(String),
}

/// Errors that can occur when evaluating or raising alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Unknown threshold operator: {0} (expected gt, lt or eq)")]
    UnknownOperator(String),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
