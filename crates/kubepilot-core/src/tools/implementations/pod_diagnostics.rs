//! get_pod_diagnostics - one record merging pod status and spec

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::tools::cluster::{ClusterAccess, Gvr};
use crate::tools::format::{array_at, object_age, str_at};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct PodDiagnosticsTool {
    cluster: Arc<dyn ClusterAccess>,
}

impl PodDiagnosticsTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self { cluster }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    pod_name: String,
    namespace: String,
}

fn termination(state: &Value) -> Value {
    json!({
        "reason": str_at(state, "/reason"),
        "exitCode": state.get("exitCode").cloned().unwrap_or(json!(0)),
        "signal": state.get("signal").cloned().unwrap_or(json!(0)),
        "message": str_at(state, "/message"),
        "finishedAt": str_at(state, "/finishedAt"),
    })
}

fn container_status(cs: &Value) -> Map<String, Value> {
    let mut c = Map::new();
    c.insert("name".into(), json!(str_at(cs, "/name")));
    c.insert("ready".into(), json!(cs["ready"].as_bool().unwrap_or(false)));
    c.insert(
        "restartCount".into(),
        json!(cs["restartCount"].as_i64().unwrap_or(0)),
    );
    c.insert("image".into(), json!(str_at(cs, "/image")));

    let state = &cs["state"];
    if let Some(running) = state.get("running") {
        c.insert("state".into(), json!("Running"));
        c.insert("startedAt".into(), json!(str_at(running, "/startedAt")));
    } else if let Some(waiting) = state.get("waiting") {
        c.insert("state".into(), json!("Waiting"));
        c.insert("reason".into(), json!(str_at(waiting, "/reason")));
        c.insert("message".into(), json!(str_at(waiting, "/message")));
    } else if let Some(terminated) = state.get("terminated") {
        c.insert("state".into(), json!("Terminated"));
        if let Value::Object(fields) = termination(terminated) {
            for key in ["reason", "exitCode", "signal", "message"] {
                if let Some(v) = fields.get(key) {
                    c.insert(key.into(), v.clone());
                }
            }
        }
    }

    if let Some(last) = cs.pointer("/lastState/terminated") {
        c.insert("lastTermination".into(), termination(last));
    }
    c
}

fn cpu_memory(resources: &Value) -> Value {
    json!({
        "cpu": str_at(resources, "/cpu"),
        "memory": str_at(resources, "/memory"),
    })
}

/// Fold declared resources and probes from the pod spec into the matching status entry.
fn merge_spec(container: &mut Map<String, Value>, spec: &Value) {
    if let Some(requests) = spec.pointer("/resources/requests") {
        container.insert("resourceRequests".into(), cpu_memory(requests));
    }
    if let Some(limits) = spec.pointer("/resources/limits") {
        container.insert("resourceLimits".into(), cpu_memory(limits));
    }
    for probe in ["livenessProbe", "readinessProbe", "startupProbe"] {
        if spec.get(probe).is_some_and(|p| !p.is_null()) {
            container.insert(probe.into(), json!("configured"));
        }
    }
}

pub(crate) fn diagnose(pod: &Value, now: chrono::DateTime<Utc>) -> Value {
    let mut diag = Map::new();
    diag.insert("name".into(), json!(str_at(pod, "/metadata/name")));
    diag.insert("namespace".into(), json!(str_at(pod, "/metadata/namespace")));
    let phase = if pod.pointer("/metadata/deletionTimestamp").is_some() {
        "Terminating"
    } else {
        str_at(pod, "/status/phase")
    };
    diag.insert("phase".into(), json!(phase));
    diag.insert("node".into(), json!(str_at(pod, "/spec/nodeName")));
    diag.insert("qos".into(), json!(str_at(pod, "/status/qosClass")));
    if let Some(age) = object_age(pod, now) {
        diag.insert("age".into(), json!(age));
    }

    let specs = array_at(pod, "/spec/containers");
    let containers: Vec<Value> = array_at(pod, "/status/containerStatuses")
        .iter()
        .map(|cs| {
            let mut c = container_status(cs);
            let name = str_at(cs, "/name");
            if let Some(spec) = specs.iter().find(|s| str_at(s, "/name") == name) {
                merge_spec(&mut c, spec);
            }
            Value::Object(c)
        })
        .collect();
    diag.insert("containers".into(), Value::Array(containers));

    let conditions: Vec<Value> = array_at(pod, "/status/conditions")
        .iter()
        .map(|cond| {
            json!({
                "type": str_at(cond, "/type"),
                "status": str_at(cond, "/status"),
                "reason": str_at(cond, "/reason"),
                "message": str_at(cond, "/message"),
            })
        })
        .collect();
    diag.insert("conditions".into(), Value::Array(conditions));

    Value::Object(diag)
}

#[async_trait]
impl Tool for PodDiagnosticsTool {
    fn name(&self) -> &str {
        "get_pod_diagnostics"
    }

    fn description(&self) -> &str {
        "Get comprehensive diagnostics for a specific pod: phase, container states, restart counts, exit codes, resource usage, probe status, and recent events."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "podName": {
                    "type": "string",
                    "description": "Pod name"
                },
                "namespace": {
                    "type": "string",
                    "description": "Pod namespace"
                }
            },
            "required": ["podName", "namespace"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if params.pod_name.trim().is_empty() {
            return ToolResult::invalid_parameters("podName is required");
        }

        let pod = match self
            .cluster
            .get(
                &Gvr::parse("v1/pods"),
                Some(params.namespace.as_str()).filter(|ns| !ns.is_empty()),
                &params.pod_name,
            )
            .await
        {
            Ok(pod) => pod,
            Err(e) => {
                return ToolResult::error(format!(
                    "failed to get pod {}/{}: {:#}",
                    params.namespace, params.pod_name, e
                ))
            }
        };

        ToolResult::success_data(diagnose(&pod, Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{envelope, FakeCluster};

    fn crashing_pod() -> Value {
        json!({
            "metadata": {
                "name": "api-7d9f",
                "namespace": "shop",
                "creationTimestamp": "2024-05-10T09:00:00Z"
            },
            "spec": {
                "nodeName": "node-a",
                "containers": [
                    {
                        "name": "api",
                        "resources": {
                            "requests": {"cpu": "100m", "memory": "128Mi"},
                            "limits": {"cpu": "500m", "memory": "256Mi"}
                        },
                        "livenessProbe": {"httpGet": {"path": "/healthz", "port": 8080}},
                        "readinessProbe": {"httpGet": {"path": "/ready", "port": 8080}}
                    },
                    {"name": "sidecar"}
                ]
            },
            "status": {
                "phase": "Running",
                "qosClass": "Burstable",
                "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
                "containerStatuses": [
                    {
                        "name": "api",
                        "ready": false,
                        "restartCount": 7,
                        "image": "shop/api:1.4",
                        "state": {"waiting": {"reason": "CrashLoopBackOff", "message": "back-off 5m0s"}},
                        "lastState": {"terminated": {
                            "reason": "OOMKilled",
                            "exitCode": 137,
                            "finishedAt": "2024-05-10T11:58:00Z"
                        }}
                    },
                    {
                        "name": "sidecar",
                        "ready": true,
                        "restartCount": 0,
                        "image": "envoy:1.30",
                        "state": {"running": {"startedAt": "2024-05-10T09:00:05Z"}}
                    }
                ]
            }
        })
    }

    #[test]
    fn test_diagnose_merges_status_and_spec() {
        let now = crate::tools::format::parse_timestamp("2024-05-10T12:00:00Z").unwrap();
        let diag = diagnose(&crashing_pod(), now);
        assert_eq!(diag["phase"], "Running");
        assert_eq!(diag["node"], "node-a");
        assert_eq!(diag["qos"], "Burstable");
        assert_eq!(diag["age"], "3h");

        let api = &diag["containers"][0];
        assert_eq!(api["state"], "Waiting");
        assert_eq!(api["reason"], "CrashLoopBackOff");
        assert_eq!(api["restartCount"], 7);
        assert_eq!(api["lastTermination"]["reason"], "OOMKilled");
        assert_eq!(api["lastTermination"]["exitCode"], 137);
        assert_eq!(api["resourceRequests"], json!({"cpu": "100m", "memory": "128Mi"}));
        assert_eq!(api["resourceLimits"]["memory"], "256Mi");
        assert_eq!(api["livenessProbe"], "configured");
        assert_eq!(api["readinessProbe"], "configured");
        assert!(api.get("startupProbe").is_none());

        let sidecar = &diag["containers"][1];
        assert_eq!(sidecar["state"], "Running");
        assert!(sidecar.get("resourceRequests").is_none());
        assert!(sidecar.get("lastTermination").is_none());

        assert_eq!(diag["conditions"][0]["reason"], "ContainersNotReady");
    }

    #[test]
    fn test_deleting_pod_is_terminating() {
        let mut pod = crashing_pod();
        pod["metadata"]["deletionTimestamp"] = json!("2024-05-10T11:59:00Z");
        let diag = diagnose(&pod, Utc::now());
        assert_eq!(diag["phase"], "Terminating");
    }

    #[tokio::test]
    async fn test_tool_fetches_pod() {
        let tool = PodDiagnosticsTool::new(Arc::new(FakeCluster::with_objects(
            "pods",
            vec![crashing_pod()],
        )));
        let result = tool
            .execute(
                json!({"podName": "api-7d9f", "namespace": "shop"}),
                &ToolContext::default(),
            )
            .await;
        assert!(!result.is_error, "{}", result.output);
        assert_eq!(envelope(&result)["data"]["name"], "api-7d9f");

        let missing = tool
            .execute(
                json!({"podName": "gone", "namespace": "shop"}),
                &ToolContext::default(),
            )
            .await;
        assert_eq!(envelope(&missing)["error"]["code"], "not_found");
    }
}
