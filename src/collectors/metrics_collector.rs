use crate::collectors::{sample_blocking, MetricsSource};
use crate::error::CollectorError;
use crate::events::MetricSample;
use crate::transport::{Endpoint, HttpTransport};
use log::{debug, error, info, warn};
use std::sync::Arc;

/// Default index receiving metric documents
pub const DEFAULT_METRICS_INDEX: &str = "metrics";

/// Collects host metrics and stores them in the document store
///
/// Each call to [`MetricsCollector::collect_and_store`] takes one fresh sample
/// from the metrics source and indexes it as a new document. There is no
/// buffering or averaging; failed writes are reported, not retried beyond
/// the transport's own policy.
pub struct MetricsCollector {
    /// Document store base URL and credentials
    endpoint: Endpoint,
    /// Index receiving the documents
    index_name: String,
    transport: Arc<dyn HttpTransport>,
    source: Arc<dyn MetricsSource>,
}

impl MetricsCollector {
    /// Create a collector writing to the default `metrics` index
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use lookout::collectors::{MetricsCollector, SystemMetricsSource};
    /// use lookout::transport::{Endpoint, ReqwestTransport, RetryPolicy};
    ///
    /// let transport = ReqwestTransport::new(Duration::from_secs(10), RetryPolicy::default()).unwrap();
    /// let collector = MetricsCollector::new(
    ///     Endpoint::new("http://localhost:9200"),
    ///     Arc::new(transport),
    ///     Arc::new(SystemMetricsSource::new()),
    /// );
    /// ```
    pub fn new(
        endpoint: Endpoint,
        transport: Arc<dyn HttpTransport>,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        Self {
            endpoint,
            index_name: DEFAULT_METRICS_INDEX.to_string(),
            transport,
            source,
        }
    }

    /// Write to `index_name` instead of the default index
    pub fn with_index_name(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = index_name.into();
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Take a sample from the metrics source on the blocking thread pool
    pub async fn collect(&self) -> Result<MetricSample, CollectorError> {
        let sample = sample_blocking(&self.source).await?;
        debug!(
            "Collected metrics: cpu={:.1}% memory={:.1}% disk={:.1}% load={:.2}",
            sample.cpu_percent, sample.memory_percent, sample.disk_percent, sample.load_average
        );
        Ok(sample)
    }

    /// Index a sample as a new document
    ///
    /// # Returns
    ///
    /// `true` only if the store answered `201 Created`. Any other status and
    /// any transport failure are logged and reported as `false`.
    pub async fn store(&self, sample: &MetricSample) -> bool {
        let path = format!("{}/_doc", self.index_name);
        let request = match self.endpoint.post_serialized(&path, sample) {
            Ok(request) => request,
            Err(e) => {
                error!("Failed to encode metric sample: {}", e);
                return false;
            }
        };

        match self.transport.post_json(&request).await {
            Ok(response) if response.status == 201 => {
                info!("Stored metric sample in '{}'", self.index_name);
                true
            }
            Ok(response) => {
                warn!(
                    "Document store rejected metric sample with status {}: {}",
                    response.status, response.body
                );
                false
            }
            Err(e) => {
                error!("Failed to store metric sample: {}", e);
                false
            }
        }
    }

    /// Collect one sample and store it
    pub async fn collect_and_store(&self) -> bool {
        match self.collect().await {
            Ok(sample) => self.store(&sample).await,
            Err(e) => {
                error!("Failed to collect metrics: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::MockMetricsSource;
    use crate::error::TransportError;
    use crate::transport::{HttpResponse, MockTransport};
    use chrono::Utc;
    use quickcheck_macros::quickcheck;
    use serde_json::json;

    fn fixed_sample() -> MetricSample {
        MetricSample {
            timestamp: Utc::now(),
            cpu_percent: 37.5,
            memory_percent: 61.0,
            disk_percent: 48.2,
            load_average: 1.25,
        }
    }

    fn fixed_source() -> Arc<dyn MetricsSource> {
        let mut source = MockMetricsSource::new();
        source.expect_sample().returning(fixed_sample);
        Arc::new(source)
    }

    fn collector_with(transport: &MockTransport) -> MetricsCollector {
        MetricsCollector::new(
            Endpoint::new("http://localhost:9200/"),
            Arc::new(transport.clone()),
            fixed_source(),
        )
    }

    #[tokio::test]
    async fn test_collect_reads_from_source() {
        let transport = MockTransport::status(201, json!({}));
        let collector = collector_with(&transport);

        let sample = collector.collect().await.unwrap();
        assert_eq!(sample.cpu_percent, 37.5);
        assert_eq!(sample.memory_percent, 61.0);
        assert_eq!(sample.disk_percent, 48.2);
        assert_eq!(sample.load_average, 1.25);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_collect_samples_on_every_call() {
        let mut source = MockMetricsSource::new();
        source.expect_sample().times(3).returning(fixed_sample);
        let collector = MetricsCollector::new(
            Endpoint::new("http://localhost:9200"),
            Arc::new(MockTransport::status(201, json!({}))),
            Arc::new(source),
        );

        for _ in 0..3 {
            collector.collect().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_store_posts_sample_to_metrics_index() {
        let transport = MockTransport::status(201, json!({"result": "created"}));
        let collector = collector_with(&transport);
        let sample = fixed_sample();

        assert!(collector.store(&sample).await);

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:9200/metrics/_doc");
        assert_eq!(request.body, serde_json::to_value(&sample).unwrap());
        assert!(!request.idempotent);
    }

    #[tokio::test]
    async fn test_store_custom_index() {
        let transport = MockTransport::status(201, json!({}));
        let collector = collector_with(&transport).with_index_name("host-metrics");

        assert_eq!(collector.index_name(), "host-metrics");
        assert!(collector.store(&fixed_sample()).await);
        assert_eq!(
            transport.last_request().unwrap().url,
            "http://localhost:9200/host-metrics/_doc"
        );
    }

    #[tokio::test]
    async fn test_store_requires_created_status() {
        // 200 is a success status but not an acknowledgement of creation
        let transport = MockTransport::status(200, json!({}));
        let collector = collector_with(&transport);

        assert!(!collector.store(&fixed_sample()).await);
    }

    #[tokio::test]
    async fn test_store_transport_failure_is_false() {
        let transport = MockTransport::unreachable();
        let collector = collector_with(&transport);

        assert!(!collector.store(&fixed_sample()).await);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_collect_and_store_creates_one_document() {
        let transport = MockTransport::status(201, json!({}));
        let collector = collector_with(&transport);

        assert!(collector.collect_and_store().await);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.last_request().unwrap().body["cpu_percent"], 37.5);
    }

    #[tokio::test]
    async fn test_collect_and_store_timeout() {
        let transport = MockTransport::with_response(Err(TransportError::Timeout));
        let collector = collector_with(&transport);

        assert!(!collector.collect_and_store().await);
    }

    #[quickcheck]
    fn prop_collect_and_store_true_only_on_created(status: u16) -> bool {
        let status = 100 + status % 500;
        let transport = MockTransport::with_response(Ok(HttpResponse::new(status, "{}")));
        let collector = collector_with(&transport);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let stored = runtime.block_on(collector.collect_and_store());

        stored == (status == 201)
    }
}
