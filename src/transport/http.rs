use crate::error::TransportError;
use crate::transport::RetryPolicy;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Trait for HTTP transports used by every client in this crate
///
/// Implementations send one JSON POST (possibly retried) and hand back the
/// status code and raw body. Interpreting the status is left to the caller.
pub trait HttpTransport: Send + Sync {
    fn post_json<'a>(
        &'a self,
        request: &'a JsonRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;
}

/// HTTP basic credentials
#[derive(Debug, Clone, PartialEq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// A JSON POST request
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequest {
    pub url: String,
    pub body: Value,
    pub headers: Vec<(String, String)>,
    pub auth: Option<BasicAuth>,
    /// Safe to repeat after a timeout; false for document and object writes
    pub idempotent: bool,
}

impl JsonRequest {
    /// Create a request posting `body` to `url`
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            body,
            headers: Vec::new(),
            auth: None,
            idempotent: false,
        }
    }

    /// Mark a read-only request (such as `_search`) as safe to retry
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    /// Value of a header, if present (names compare case-insensitively)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status code and body of a completed request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Base URL of a remote service, with optional credentials
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    base_url: String,
    auth: Option<BasicAuth>,
}

impl Endpoint {
    /// Create an endpoint; trailing slashes are stripped from the base URL
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            auth: None,
        }
    }

    /// Attach basic credentials to every request built from this endpoint
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build a JSON POST to `path` carrying this endpoint's credentials
    pub fn post(&self, path: &str, body: Value) -> JsonRequest {
        JsonRequest::post(self.url(path), body).with_auth(self.auth.clone())
    }

    /// Like [`Endpoint::post`], serializing `payload` as the body
    pub fn post_serialized<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<JsonRequest, TransportError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| TransportError::Request(format!("Failed to serialize body: {}", e)))?;
        Ok(self.post(path, body))
    }
}

/// reqwest-backed transport with a per-request timeout and retry policy
pub struct ReqwestTransport {
    client: Client,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    /// Create a transport
    ///
    /// # Arguments
    /// * `timeout` - Timeout applied to each individual attempt
    /// * `retry` - Policy applied to transport failures and 5xx responses
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ClientBuild` if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self { client, retry })
    }

    async fn send_once(&self, request: &JsonRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(&request.url).json(&request.body);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(auth) = &request.auth {
            builder = builder.basic_auth(&auth.username, auth.password.as_ref());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::InvalidBody(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json<'a>(
        &'a self,
        request: &'a JsonRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            debug!("POST {}", request.url);
            let response = self
                .retry
                .run(request.idempotent, move |_| self.send_once(request))
                .await?;
            debug!("POST {} -> {}", request.url, response.status);
            Ok(response)
        })
    }
}
