//! describe_resource - kubectl-style description

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::get_resource::object_path;
use crate::tools::cluster::{optional, ClusterAccess, Gvr};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct DescribeResourceTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl DescribeResourceTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self { cluster }
    }
}

#[derive(Deserialize)]
struct Params {
    gvr: String,
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[async_trait]
impl Tool for DescribeResourceTool {
    fn name(&self) -> &str {
        "describe_resource"
    }

    fn description(&self) -> &str {
        "Get the full kubectl-style description of a Kubernetes resource, including events and conditions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "gvr": {
                    "type": "string",
                    "description": "Group/Version/Resource identifier"
                },
                "name": {
                    "type": "string",
                    "description": "Resource name"
                },
                "namespace": {
                    "type": "string",
                    "description": "Kubernetes namespace"
                }
            },
            "required": ["gvr", "name"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let gvr = Gvr::parse(&params.gvr);
        if gvr.is_empty() || params.name.trim().is_empty() {
            return ToolResult::invalid_parameters("gvr and name are required");
        }
        let namespace = optional(&params.namespace);

        match self.cluster.describe(&gvr, namespace, &params.name).await {
            Ok(description) => ToolResult::success_data(json!({ "description": description })),
            Err(e) => ToolResult::error(format!(
                "failed to describe {} {}: {:#}",
                params.gvr,
                object_path(namespace, &params.name),
                e
            )),
        }
    }
}
