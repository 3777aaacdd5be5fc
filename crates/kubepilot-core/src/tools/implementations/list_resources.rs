//! list_resources - summary table of objects of one kind

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::cluster::{optional, ClusterAccess, Gvr};
use crate::tools::format::{object_age, str_at};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

pub struct ListResourcesTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl ListResourcesTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self { cluster }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    gvr: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    label_selector: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

fn summarize(obj: &Value, now: chrono::DateTime<Utc>) -> Value {
    let mut item = Map::new();
    item.insert("name".into(), json!(str_at(obj, "/metadata/name")));
    item.insert("namespace".into(), json!(str_at(obj, "/metadata/namespace")));
    if let Some(phase) = obj.pointer("/status/phase").and_then(Value::as_str) {
        item.insert("status".into(), json!(phase));
    }
    if let Some(age) = object_age(obj, now) {
        item.insert("age".into(), json!(age));
    }
    Value::Object(item)
}

#[async_trait]
impl Tool for ListResourcesTool {
    fn name(&self) -> &str {
        "list_resources"
    }

    fn description(&self) -> &str {
        "List Kubernetes resources of a given type. Returns a summary table with key fields (name, namespace, status, age)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "gvr": {
                    "type": "string",
                    "description": "Group/Version/Resource identifier, e.g. v1/pods, apps/v1/deployments"
                },
                "namespace": {
                    "type": "string",
                    "description": "Kubernetes namespace (empty for all namespaces)"
                },
                "labelSelector": {
                    "type": "string",
                    "description": "Label selector to filter resources, e.g. app=web"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of resources to return (default 50)"
                }
            },
            "required": ["gvr"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let gvr = Gvr::parse(&params.gvr);
        if gvr.is_empty() {
            return ToolResult::invalid_parameters("gvr is required");
        }
        let namespace = optional(&params.namespace);
        let selector = optional(&params.label_selector);
        let limit = match params.limit {
            Some(0) | None => DEFAULT_LIMIT,
            Some(n) => n.min(MAX_LIMIT),
        };

        let objs = match self.cluster.list(&gvr, namespace, selector).await {
            Ok(objs) => objs,
            Err(e) => {
                return ToolResult::error(format!(
                    "failed to list {} in {}: {:#}",
                    params.gvr,
                    namespace.unwrap_or("all namespaces"),
                    e
                ))
            }
        };

        let now = Utc::now();
        let total = objs.len();
        let resources: Vec<Value> = objs.iter().take(limit).map(|o| summarize(o, now)).collect();

        let mut summary = format!("Found {} {} resources", total, params.gvr);
        if total > limit {
            summary.push_str(&format!(" (showing first {})", limit));
        }

        ToolResult::success_data(json!({
            "summary": summary,
            "total": total,
            "returned": resources.len(),
            "resources": resources,
        }))
    }
}
