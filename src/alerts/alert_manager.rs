use crate::alerts::Operator;
use crate::collectors::{sample_blocking, MetricsSource};
use crate::error::AlertError;
use crate::events::{AlertRecord, Severity};
use crate::transport::{Endpoint, HttpTransport, JsonRequest};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Default index receiving alert documents
pub const DEFAULT_ALERTS_INDEX: &str = "alerts";

/// Default CPU threshold for [`AlertManager::monitor_cpu`], in percent
pub const DEFAULT_CPU_THRESHOLD: f64 = 80.0;

/// Outcome of one write of an alert record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Delivery {
    /// The receiver answered with a 2xx status
    Acknowledged { status: u16 },
    /// The receiver answered with a non-2xx status
    Rejected { status: u16 },
    /// The request never produced a response
    Failed { reason: String },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Acknowledged { .. })
    }
}

/// An alert record together with what happened to each of its writes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDelivery {
    pub record: AlertRecord,
    /// Write to the alerts index
    pub stored: Delivery,
    /// Forward to the webhook sink, `None` when no webhook is configured
    pub forwarded: Option<Delivery>,
}

impl AlertDelivery {
    /// Whether every attempted write was acknowledged
    pub fn is_fully_delivered(&self) -> bool {
        self.stored.is_delivered()
            && self
                .forwarded
                .as_ref()
                .map_or(true, Delivery::is_delivered)
    }
}

/// Raises alerts into the document store and an optional webhook sink
///
/// Alert records are append-only: each call to [`AlertManager::create_alert`]
/// writes one new document and, when a webhook is configured, posts the
/// same payload to it. The two writes are independent; neither is rolled
/// back if the other fails, and both outcomes are reported to the caller.
pub struct AlertManager {
    /// Document store base URL and credentials
    endpoint: Endpoint,
    /// Index receiving alert documents
    alerts_index: String,
    /// Full URL of the webhook sink
    webhook_url: Option<String>,
    transport: Arc<dyn HttpTransport>,
    source: Arc<dyn MetricsSource>,
}

impl AlertManager {
    /// Create an alert manager writing to the default `alerts` index
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Document store endpoint
    /// * `webhook_url` - Optional sink receiving a copy of every alert
    /// * `transport` - HTTP transport shared by both writes
    /// * `source` - Metrics source used by [`AlertManager::monitor_cpu`]
    pub fn new(
        endpoint: Endpoint,
        webhook_url: Option<String>,
        transport: Arc<dyn HttpTransport>,
        source: Arc<dyn MetricsSource>,
    ) -> Self {
        Self {
            endpoint,
            alerts_index: DEFAULT_ALERTS_INDEX.to_string(),
            webhook_url,
            transport,
            source,
        }
    }

    pub fn with_alerts_index(mut self, alerts_index: impl Into<String>) -> Self {
        self.alerts_index = alerts_index.into();
        self
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Compare `value` against `threshold`
    ///
    /// # Arguments
    ///
    /// * `operator` - One of `gt`, `lt` or `eq`
    ///
    /// # Errors
    ///
    /// Returns `AlertError::UnknownOperator` for any other operator string.
    pub fn check_threshold(value: f64, threshold: f64, operator: &str) -> Result<bool, AlertError> {
        let operator: Operator = operator.parse()?;
        Ok(operator.evaluate(value, threshold))
    }

    /// Build an alert record and deliver it
    ///
    /// The record is written to the alerts index first, then forwarded to
    /// the webhook if one is configured. The record is returned whatever the
    /// outcome of either write.
    pub async fn create_alert(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> AlertDelivery {
        let record = AlertRecord::new(title, message, severity);

        let payload = serde_json::to_value(&record).map_err(|e| e.to_string());

        let path = format!("{}/_doc", self.alerts_index);
        let stored = match &payload {
            Ok(body) => {
                let request = self.endpoint.post(&path, body.clone());
                self.deliver(&request, "alerts index").await
            }
            Err(reason) => Delivery::Failed {
                reason: reason.clone(),
            },
        };

        let forwarded = match (&self.webhook_url, &payload) {
            (Some(url), Ok(body)) => {
                let request = JsonRequest::post(url.as_str(), body.clone());
                Some(self.deliver(&request, "webhook").await)
            }
            (Some(_), Err(reason)) => Some(Delivery::Failed {
                reason: reason.clone(),
            }),
            (None, _) => None,
        };

        let delivery = AlertDelivery {
            record,
            stored,
            forwarded,
        };

        if delivery.is_fully_delivered() {
            info!(
                "Alert '{}' ({}) delivered",
                delivery.record.title, delivery.record.severity
            );
        }

        delivery
    }

    /// Raise a critical alert if current CPU usage exceeds `threshold`
    ///
    /// # Returns
    ///
    /// The delivery of the raised alert, or `None` if usage is at or below
    /// the threshold or could not be sampled.
    pub async fn monitor_cpu(&self, threshold: f64) -> Option<AlertDelivery> {
        let cpu_percent = match sample_blocking(&self.source).await {
            Ok(sample) => sample.cpu_percent,
            Err(e) => {
                error!("Failed to sample CPU usage: {}", e);
                return None;
            }
        };

        if !Operator::Gt.evaluate(cpu_percent, threshold) {
            info!(
                "CPU usage {:.1}% is within threshold {}%",
                cpu_percent, threshold
            );
            return None;
        }

        let message = format!(
            "CPU usage is {:.1}% (threshold: {}%)",
            cpu_percent, threshold
        );
        Some(
            self.create_alert("High CPU Usage", &message, Severity::Critical)
                .await,
        )
    }

    async fn deliver(&self, request: &JsonRequest, target: &str) -> Delivery {
        match self.transport.post_json(request).await {
            Ok(response) if response.is_success() => Delivery::Acknowledged {
                status: response.status,
            },
            Ok(response) => {
                warn!(
                    "Alert write to {} rejected with status {}: {}",
                    target, response.status, response.body
                );
                Delivery::Rejected {
                    status: response.status,
                }
            }
            Err(e) => {
                error!("Alert write to {} failed: {}", target, e);
                Delivery::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::MockMetricsSource;
    use crate::error::TransportError;
    use crate::events::MetricSample;
    use crate::transport::{HttpResponse, MockTransport};
    use chrono::{DateTime, Utc};
    use serde_json::json;

    const WEBHOOK: &str = "https://hooks.example.com/alerts";

    fn source_reading(cpu_percent: f64) -> Arc<dyn MetricsSource> {
        let mut source = MockMetricsSource::new();
        source.expect_sample().returning(move || MetricSample {
            timestamp: Utc::now(),
            cpu_percent,
            memory_percent: 50.0,
            disk_percent: 50.0,
            load_average: 1.0,
        });
        Arc::new(source)
    }

    fn manager_with(transport: &MockTransport, webhook: Option<&str>) -> AlertManager {
        AlertManager::new(
            Endpoint::new("http://localhost:9200/"),
            webhook.map(str::to_string),
            Arc::new(transport.clone()),
            source_reading(10.0),
        )
    }

    #[test]
    fn test_check_threshold() {
        assert!(AlertManager::check_threshold(5.0, 3.0, "gt").unwrap());
        assert!(!AlertManager::check_threshold(2.0, 3.0, "gt").unwrap());
        assert!(AlertManager::check_threshold(3.0, 3.0, "eq").unwrap());
        assert!(AlertManager::check_threshold(1.0, 3.0, "lt").unwrap());
    }

    #[test]
    fn test_check_threshold_unknown_operator() {
        assert!(matches!(
            AlertManager::check_threshold(1.0, 1.0, "xyz"),
            Err(AlertError::UnknownOperator(op)) if op == "xyz"
        ));
    }

    #[tokio::test]
    async fn test_create_alert_record_fields() {
        let transport = MockTransport::status(201, json!({"result": "created"}));
        let manager = manager_with(&transport, None);

        let delivery = manager.create_alert("t", "m", Severity::Warning).await;

        assert_eq!(delivery.record.title, "t");
        assert_eq!(delivery.record.message, "m");
        assert_eq!(delivery.record.severity, Severity::Warning);
        assert!(delivery.record.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn test_create_alert_stores_document() {
        let transport = MockTransport::status(201, json!({}));
        let manager = manager_with(&transport, None);

        let delivery = manager.create_alert("Disk", "Disk full", Severity::Critical).await;

        assert_eq!(delivery.stored, Delivery::Acknowledged { status: 201 });
        assert_eq!(delivery.forwarded, None);
        assert!(delivery.is_fully_delivered());

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "http://localhost:9200/alerts/_doc");
        assert_eq!(request.body["title"], "Disk");
        assert_eq!(request.body["severity"], "critical");
        let raw = request.body["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(raw).is_ok());
    }

    #[tokio::test]
    async fn test_create_alert_forwards_same_payload_to_webhook() {
        let transport = MockTransport::status(201, json!({}));
        let manager = manager_with(&transport, Some(WEBHOOK));

        let delivery = manager.create_alert("t", "m", Severity::Info).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, "http://localhost:9200/alerts/_doc");
        assert_eq!(requests[1].url, WEBHOOK);
        assert_eq!(requests[0].body, requests[1].body);
        assert!(requests.iter().all(|request| !request.idempotent));
        assert_eq!(delivery.forwarded, Some(Delivery::Acknowledged { status: 201 }));
    }

    #[tokio::test]
    async fn test_webhook_does_not_receive_store_credentials() {
        let transport = MockTransport::status(201, json!({}));
        let manager = AlertManager::new(
            Endpoint::new("http://localhost:9200").with_basic_auth("elastic", None),
            Some(WEBHOOK.to_string()),
            Arc::new(transport.clone()),
            source_reading(10.0),
        );

        manager.create_alert("t", "m", Severity::Info).await;

        let requests = transport.requests();
        assert!(requests[0].auth.is_some());
        assert!(requests[1].auth.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_webhook() {
        let transport = MockTransport::with_responses(vec![
            Err(TransportError::Timeout),
            Ok(HttpResponse::new(204, "")),
        ]);
        let manager = manager_with(&transport, Some(WEBHOOK));

        let delivery = manager.create_alert("t", "m", Severity::Warning).await;

        assert!(matches!(delivery.stored, Delivery::Failed { .. }));
        assert_eq!(delivery.forwarded, Some(Delivery::Acknowledged { status: 204 }));
        assert!(!delivery.is_fully_delivered());
        assert_eq!(delivery.record.title, "t");
    }

    #[tokio::test]
    async fn test_rejected_webhook_is_reported() {
        let transport = MockTransport::with_responses(vec![
            Ok(HttpResponse::new(201, "{}")),
            Ok(HttpResponse::new(410, "gone")),
        ]);
        let manager = manager_with(&transport, Some(WEBHOOK));

        let delivery = manager.create_alert("t", "m", Severity::Warning).await;

        assert!(delivery.stored.is_delivered());
        assert_eq!(delivery.forwarded, Some(Delivery::Rejected { status: 410 }));
        assert!(!delivery.is_fully_delivered());
    }

    #[tokio::test]
    async fn test_custom_alerts_index() {
        let transport = MockTransport::status(201, json!({}));
        let manager = manager_with(&transport, None).with_alerts_index("sre-alerts");

        manager.create_alert("t", "m", Severity::Info).await;

        assert_eq!(
            transport.last_request().unwrap().url,
            "http://localhost:9200/sre-alerts/_doc"
        );
    }

    #[tokio::test]
    async fn test_monitor_cpu_above_threshold() {
        let transport = MockTransport::status(201, json!({}));
        let manager = AlertManager::new(
            Endpoint::new("http://localhost:9200"),
            None,
            Arc::new(transport.clone()),
            source_reading(93.5),
        );

        let delivery = manager.monitor_cpu(90.0).await.unwrap();

        assert_eq!(delivery.record.title, "High CPU Usage");
        assert_eq!(delivery.record.severity, Severity::Critical);
        assert_eq!(delivery.record.message, "CPU usage is 93.5% (threshold: 90%)");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_monitor_cpu_below_threshold() {
        let transport = MockTransport::status(201, json!({}));
        let manager = manager_with(&transport, Some(WEBHOOK));

        assert!(manager.monitor_cpu(DEFAULT_CPU_THRESHOLD).await.is_none());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_monitor_cpu_at_threshold_does_not_alert() {
        let transport = MockTransport::status(201, json!({}));
        let manager = AlertManager::new(
            Endpoint::new("http://localhost:9200"),
            None,
            Arc::new(transport.clone()),
            source_reading(80.0),
        );

        assert!(manager.monitor_cpu(80.0).await.is_none());
    }

    #[test]
    fn test_delivery_serialization() {
        let value = serde_json::to_value(Delivery::Rejected { status: 503 }).unwrap();
        assert_eq!(value, json!({"outcome": "rejected", "status": 503}));
    }
}
