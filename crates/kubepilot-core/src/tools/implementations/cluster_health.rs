//! get_cluster_health - node readiness and pod status overview

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tools::cluster::{ClusterAccess, Gvr};
use crate::tools::format::{array_at, str_at};
use crate::tools::registry::Tool;
use crate::tools::{ToolContext, ToolResult};

pub struct ClusterHealthTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl ClusterHealthTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self { cluster }
    }
}

fn node_ready(node: &Value) -> bool {
    array_at(node, "/status/conditions")
        .iter()
        .any(|c| str_at(c, "/type") == "Ready" && str_at(c, "/status") == "True")
}

/// Phase, unless a container is waiting or terminated with a reason.
pub(crate) fn pod_status(pod: &Value) -> String {
    for cs in array_at(pod, "/status/containerStatuses") {
        let waiting = str_at(cs, "/state/waiting/reason");
        if !waiting.is_empty() {
            return waiting.to_string();
        }
        let terminated = str_at(cs, "/state/terminated/reason");
        if !terminated.is_empty() {
            return terminated.to_string();
        }
    }
    str_at(pod, "/status/phase").to_string()
}

#[async_trait]
impl Tool for ClusterHealthTool {
    fn name(&self) -> &str {
        "get_cluster_health"
    }

    fn description(&self) -> &str {
        "Get a high-level cluster health overview: node count, pod counts by status, resource utilization summary."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        let nodes = match self.cluster.list(&Gvr::parse("v1/nodes"), None, None).await {
            Ok(nodes) => nodes,
            Err(e) => return ToolResult::error(format!("failed to list nodes: {:#}", e)),
        };
        let ready = nodes.iter().filter(|n| node_ready(n)).count();

        let pods = match self.cluster.list(&Gvr::parse("v1/pods"), None, None).await {
            Ok(pods) => pods,
            Err(e) => return ToolResult::error(format!("failed to list pods: {:#}", e)),
        };
        let mut status_summary: BTreeMap<String, usize> = BTreeMap::new();
        for pod in &pods {
            *status_summary.entry(pod_status(pod)).or_default() += 1;
        }

        let mut result = json!({
            "nodes": {
                "total": nodes.len(),
                "ready": ready,
            },
            "pods": {
                "total": pods.len(),
                "statusSummary": status_summary,
            },
        });

        match self.cluster.server_version().await {
            Ok(version) => result["serverVersion"] = json!(version),
            Err(e) => debug!("Server version unavailable: {:#}", e),
        }

        ToolResult::success_data(result)
    }
}
