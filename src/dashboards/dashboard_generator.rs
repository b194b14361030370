use crate::error::TransportError;
use crate::transport::{Endpoint, HttpTransport};
use log::{info, warn};
use serde_json::{json, Value};
use std::sync::Arc;

/// Default timestamp field for new index patterns
pub const DEFAULT_TIME_FIELD: &str = "@timestamp";

/// Default metric aggregation for new visualizations
pub const DEFAULT_AGG_TYPE: &str = "count";

/// Creates Kibana saved objects
///
/// Every `create_*` call posts one saved-object definition and reports
/// whether Kibana answered `200 OK`. Referenced identifiers are not checked
/// before creation, and repeated calls create repeated objects.
pub struct DashboardGenerator {
    endpoint: Endpoint,
    transport: Arc<dyn HttpTransport>,
}

impl DashboardGenerator {
    pub fn new(endpoint: Endpoint, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    /// Create an index pattern saved object
    pub async fn create_index_pattern(
        &self,
        pattern: &str,
        time_field: &str,
    ) -> Result<bool, TransportError> {
        self.create_saved_object("index-pattern", index_pattern_object(pattern, time_field))
            .await
    }

    /// Create a histogram visualization with a single metric aggregation
    pub async fn create_visualization(
        &self,
        title: &str,
        index_pattern: &str,
        agg_type: &str,
    ) -> Result<bool, TransportError> {
        self.create_saved_object(
            "visualization",
            visualization_object(title, index_pattern, agg_type),
        )
        .await
    }

    /// Create a dashboard referencing `visualization_ids` in the given order
    pub async fn create_dashboard(
        &self,
        title: &str,
        visualization_ids: &[String],
    ) -> Result<bool, TransportError> {
        self.create_saved_object("dashboard", dashboard_object(title, visualization_ids))
            .await
    }

    async fn create_saved_object(
        &self,
        object_type: &str,
        definition: Value,
    ) -> Result<bool, TransportError> {
        let path = format!("api/saved_objects/{}", object_type);
        let request = self
            .endpoint
            .post(&path, definition)
            .with_header("kbn-xsrf", "true");

        let response = self.transport.post_json(&request).await?;
        if response.status == 200 {
            info!("Created {} saved object", object_type);
            Ok(true)
        } else {
            warn!(
                "Kibana refused {} saved object with status {}: {}",
                object_type, response.status, response.body
            );
            Ok(false)
        }
    }
}

pub fn index_pattern_object(pattern: &str, time_field: &str) -> Value {
    json!({
        "attributes": {
            "title": pattern,
            "timeFieldName": time_field
        }
    })
}

/// Kibana stores `visState` and `searchSourceJSON` as JSON-encoded strings
pub fn visualization_object(title: &str, index_pattern: &str, agg_type: &str) -> Value {
    let vis_state = json!({
        "type": "histogram",
        "aggs": [{"id": "1", "type": agg_type, "schema": "metric"}]
    });
    let search_source = json!({"index": index_pattern});

    json!({
        "attributes": {
            "title": title,
            "visState": vis_state.to_string(),
            "kibanaSavedObjectMeta": {
                "searchSourceJSON": search_source.to_string()
            }
        }
    })
}

pub fn dashboard_object(title: &str, visualization_ids: &[String]) -> Value {
    let panels: Vec<Value> = visualization_ids
        .iter()
        .map(|id| json!({"id": id, "type": "visualization"}))
        .collect();

    json!({
        "attributes": {
            "title": title,
            "panelsJSON": Value::Array(panels).to_string()
        }
    })
}
