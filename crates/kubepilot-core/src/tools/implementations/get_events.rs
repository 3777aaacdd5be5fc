//! get_events - recent events, newest first

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::cluster::{optional, ClusterAccess};
use crate::tools::format::{i64_at, parse_timestamp, str_at};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_LIMIT: usize = 30;

pub struct GetEventsTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl GetEventsTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self { cluster }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    resource_name: Option<String>,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Best timestamp an event carries
fn event_time(event: &Value) -> Option<DateTime<Utc>> {
    [
        "/lastTimestamp",
        "/eventTime",
        "/firstTimestamp",
        "/metadata/creationTimestamp",
    ]
    .iter()
    .find_map(|p| parse_timestamp(str_at(event, p)))
}

fn render(event: &Value) -> Value {
    json!({
        "type": str_at(event, "/type"),
        "reason": str_at(event, "/reason"),
        "message": str_at(event, "/message"),
        "object": format!(
            "{}/{}",
            str_at(event, "/involvedObject/kind"),
            str_at(event, "/involvedObject/name")
        ),
        "count": i64_at(event, "/count"),
        "firstSeen": str_at(event, "/firstTimestamp"),
        "lastSeen": str_at(event, "/lastTimestamp"),
    })
}

/// Newest first. Undated events keep reverse list order, after dated ones.
fn newest_first(mut events: Vec<Value>) -> Vec<Value> {
    events.reverse();
    events.sort_by_key(|e| Reverse(event_time(e)));
    events
}

#[async_trait]
impl Tool for GetEventsTool {
    fn name(&self) -> &str {
        "get_events"
    }

    fn description(&self) -> &str {
        "Fetch Kubernetes events, optionally filtered by namespace, resource, or type. Events reveal scheduling failures, image pulls, OOM kills, and more."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "namespace": {
                    "type": "string",
                    "description": "Namespace to filter events (empty for all)"
                },
                "resourceName": {
                    "type": "string",
                    "description": "Filter events by involved object name"
                },
                "eventType": {
                    "type": "string",
                    "description": "Filter by event type: Normal or Warning"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of events to return (default 30)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let namespace = optional(&params.namespace);
        let resource_name = optional(&params.resource_name);
        let event_type = optional(&params.event_type);
        let limit = match params.limit {
            Some(0) | None => DEFAULT_LIMIT,
            Some(n) => n,
        };

        let events = match self.cluster.events(namespace, resource_name).await {
            Ok(events) => events,
            Err(e) => return ToolResult::error(format!("failed to list events: {:#}", e)),
        };
        let total = events.len();

        let results: Vec<Value> = newest_first(events)
            .iter()
            .filter(|e| resource_name.map_or(true, |n| str_at(e, "/involvedObject/name") == n))
            .filter(|e| event_type.map_or(true, |t| str_at(e, "/type").eq_ignore_ascii_case(t)))
            .take(limit)
            .map(render)
            .collect();

        ToolResult::success_data(json!({
            "total": total,
            "events": results,
        }))
    }
}
