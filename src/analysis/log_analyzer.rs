use crate::error::StoreError;
use crate::transport::{Endpoint, HttpTransport};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Default index pattern searched for log documents
pub const DEFAULT_INDEX_PATTERN: &str = "logs-*";

/// Default timestamp field of log documents
pub const DEFAULT_TIME_FIELD: &str = "@timestamp";

/// Name of the terms aggregation used by [`LogAnalyzer::top_errors`]
const ERROR_MESSAGES_AGG: &str = "error_messages";

/// One distinct error message and how often it occurred
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBucket {
    /// The exact error message
    pub key: String,
    /// Number of matching documents
    pub doc_count: u64,
}

/// Read-only queries against a log index pattern
///
/// The index pattern and time field are fixed at construction. Every query
/// is a single `_search` request; failures are returned to the caller
/// without any local fallback.
pub struct LogAnalyzer {
    endpoint: Endpoint,
    index_pattern: String,
    time_field: String,
    transport: Arc<dyn HttpTransport>,
}

impl LogAnalyzer {
    /// Create an analyzer for the default `logs-*` pattern
    pub fn new(endpoint: Endpoint, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint,
            index_pattern: DEFAULT_INDEX_PATTERN.to_string(),
            time_field: DEFAULT_TIME_FIELD.to_string(),
            transport,
        }
    }

    pub fn with_index_pattern(mut self, index_pattern: impl Into<String>) -> Self {
        self.index_pattern = index_pattern.into();
        self
    }

    pub fn with_time_field(mut self, time_field: impl Into<String>) -> Self {
        self.time_field = time_field.into();
        self
    }

    pub fn index_pattern(&self) -> &str {
        &self.index_pattern
    }

    /// Full-text search on the message field, newest first
    ///
    /// # Returns
    ///
    /// Up to `limit` raw hit objects as returned by the store.
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<Value>, StoreError> {
        let body = search_query(text, limit, &self.time_field);
        let response = self.post_search(body).await?;

        let hits = response
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::InvalidResponse("missing hits.hits".to_string()))?;

        info!("Search for '{}' returned {} hit(s)", text, hits.len());
        Ok(hits.iter().take(limit).cloned().collect())
    }

    /// Count error-level documents from the last `window_hours` hours
    ///
    /// # Errors
    ///
    /// Returns `StoreError::WindowOutOfRange` without querying the store if
    /// the window reaches before the earliest representable instant.
    pub async fn error_count(&self, window_hours: u32) -> Result<u64, StoreError> {
        let since = window_start(Utc::now(), window_hours)?;
        let body = error_count_query(since, &self.time_field);
        let response = self.post_search(body).await?;

        let count = total_hits(&response)?;
        info!("{} error(s) in the last {} hour(s)", count, window_hours);
        Ok(count)
    }

    /// Most frequent error messages, most frequent first
    ///
    /// # Returns
    ///
    /// At most `limit` buckets ordered by non-increasing count. Ties keep the
    /// store's order.
    pub async fn top_errors(&self, limit: usize) -> Result<Vec<ErrorBucket>, StoreError> {
        // A terms aggregation of size 0 is rejected by the store
        if limit == 0 {
            return Ok(Vec::new());
        }

        let body = top_errors_query(limit);
        let response = self.post_search(body).await?;

        let raw_buckets = response
            .pointer(&format!("/aggregations/{}/buckets", ERROR_MESSAGES_AGG))
            .cloned()
            .ok_or_else(|| {
                StoreError::InvalidResponse(format!(
                    "missing aggregations.{}.buckets",
                    ERROR_MESSAGES_AGG
                ))
            })?;

        let mut buckets: Vec<ErrorBucket> = serde_json::from_value(raw_buckets)
            .map_err(|e| StoreError::InvalidResponse(format!("malformed buckets: {}", e)))?;

        buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count));
        buckets.truncate(limit);
        Ok(buckets)
    }

    async fn post_search(&self, body: Value) -> Result<Value, StoreError> {
        let path = format!("{}/_search", self.index_pattern);
        let request = self.endpoint.post(&path, body).idempotent();
        debug!("Search request: {}", request.body);

        let response = self.transport.post_json(&request).await?;
        if !response.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: response.status,
                body: response.body,
            });
        }

        response
            .json()
            .map_err(|e| StoreError::InvalidResponse(format!("response is not JSON: {}", e)))
    }
}

/// Start of a window of `window_hours` hours ending at `now`
fn window_start(now: DateTime<Utc>, window_hours: u32) -> Result<DateTime<Utc>, StoreError> {
    Duration::try_hours(i64::from(window_hours))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(StoreError::WindowOutOfRange(window_hours))
}

/// Match query on `message`, sorted by `time_field` descending
pub fn search_query(text: &str, limit: usize, time_field: &str) -> Value {
    json!({
        "query": {"match": {"message": text}},
        "size": limit,
        "sort": [{time_field: {"order": "desc"}}]
    })
}

/// Error-level documents with `time_field` at or after `since`
pub fn error_count_query(since: DateTime<Utc>, time_field: &str) -> Value {
    json!({
        "query": {
            "bool": {
                "must": [
                    {"match": {"level": "error"}},
                    {"range": {time_field: {"gte": since.to_rfc3339_opts(SecondsFormat::Millis, true)}}}
                ]
            }
        },
        "size": 0
    })
}

/// Terms aggregation over exact error messages
pub fn top_errors_query(limit: usize) -> Value {
    json!({
        "query": {"match": {"level": "error"}},
        "size": 0,
        "aggs": {
            ERROR_MESSAGES_AGG: {
                "terms": {"field": "message.keyword", "size": limit}
            }
        }
    })
}

/// Read `hits.total`, which is an object on Elasticsearch 7+ and a bare
/// number on older versions
fn total_hits(response: &Value) -> Result<u64, StoreError> {
    let total = response
        .pointer("/hits/total")
        .ok_or_else(|| StoreError::InvalidResponse("missing hits.total".to_string()))?;

    total
        .get("value")
        .unwrap_or(total)
        .as_u64()
        .ok_or_else(|| StoreError::InvalidResponse(format!("invalid hits.total: {}", total)))
}
