//! get_resource - fetch one object as YAML

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::cluster::{optional, ClusterAccess, Gvr};
use crate::tools::format::object_to_yaml;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct GetResourceTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl GetResourceTool {
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

/// `namespace/name`, or just `name` for cluster-scoped objects
pub(crate) fn object_path(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}/{}", ns, name),
        None => name.to_string(),
    }
}

#[async_trait]
impl Tool for GetResourceTool {
    fn name(&self) -> &str {
        "get_resource"
    }

    fn description(&self) -> &str {
        "Fetch a specific Kubernetes resource by GVR, name, and namespace. Returns the resource as YAML."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "gvr": {
                    "type": "string",
                    "description": "Group/Version/Resource identifier, e.g. v1/pods, apps/v1/deployments"
                },
                "name": {
                    "type": "string",
                    "description": "Resource name"
                },
                "namespace": {
                    "type": "string",
                    "description": "Kubernetes namespace (empty for cluster-scoped)"
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
        let path = object_path(namespace, &params.name);

        let obj = match self.cluster.get(&gvr, namespace, &params.name).await {
            Ok(obj) => obj,
            Err(e) => {
                return ToolResult::error(format!(
                    "failed to get {} {}: {:#}",
                    params.gvr, path, e
                ))
            }
        };

        match object_to_yaml(&obj) {
            Ok(yaml) => ToolResult::success_data(json!({
                "gvr": gvr.to_string(),
                "path": path,
                "yaml": yaml,
            })),
            Err(e) => ToolResult::from_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{envelope, FakeCluster};

    fn cluster() -> Arc<FakeCluster> {
        Arc::new(FakeCluster::with_objects(
            "pods",
            vec![json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {
                    "name": "web-0",
                    "namespace": "shop",
                    "managedFields": [{"manager": "kube-controller-manager"}]
                },
                "status": {"phase": "Running"}
            })],
        ))
    }

    #[tokio::test]
    async fn test_returns_yaml_without_managed_fields() {
        let tool = GetResourceTool::new(cluster());
        let result = tool
            .execute(
                json!({"gvr": "v1/pods", "name": "web-0", "namespace": "shop"}),
                &ToolContext::default(),
            )
            .await;
        assert!(!result.is_error, "{}", result.output);
        let parsed = envelope(&result);
        let yaml = parsed["data"]["yaml"].as_str().unwrap();
        assert!(yaml.contains("phase: Running"));
        assert!(!yaml.contains("managedFields"));
        assert_eq!(parsed["data"]["path"], "shop/web-0");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let tool = GetResourceTool::new(cluster());
        let result = tool
            .execute(
                json!({"gvr": "v1/pods", "name": "ghost", "namespace": "shop"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(envelope(&result)["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let tool = GetResourceTool::new(cluster());
        let result = tool
            .execute(json!({"gvr": "v1/pods", "name": " "}), &ToolContext::default())
            .await;
        assert_eq!(envelope(&result)["error"]["code"], "invalid_parameters");
    }
}
