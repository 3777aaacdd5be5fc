//! check_rbac - single permission query

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::cluster::{optional, ClusterAccess};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct CheckRbacTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl CheckRbacTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self { cluster }
    }
}

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    namespace: Option<String>,
    verb: String,
    resource: String,
}

#[async_trait]
impl Tool for CheckRbacTool {
    fn name(&self) -> &str {
        "check_rbac"
    }

    fn description(&self) -> &str {
        "Check if the current user has permission to perform a specific action on a resource in a namespace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "namespace": {
                    "type": "string",
                    "description": "Namespace to check (empty for cluster scope)"
                },
                "verb": {
                    "type": "string",
                    "description": "Action verb: get, list, create, update, delete, watch"
                },
                "resource": {
                    "type": "string",
                    "description": "Resource type, e.g. pods, deployments, secrets"
                }
            },
            "required": ["verb", "resource"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let verb = params.verb.trim();
        let resource = params.resource.trim();
        if verb.is_empty() || resource.is_empty() {
            return ToolResult::invalid_parameters("verb and resource are required");
        }
        let namespace = optional(&params.namespace);

        match self.cluster.can_i(namespace, verb, resource).await {
            Ok(allowed) => ToolResult::success_data(json!({
                "allowed": allowed,
                "namespace": namespace.unwrap_or(""),
                "verb": verb,
                "resource": resource,
            })),
            Err(e) => ToolResult::error(format!("RBAC check failed: {:#}", e)),
        }
    }
}
