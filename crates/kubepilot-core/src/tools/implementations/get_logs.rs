//! get_logs - bounded container log fetch

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

use crate::tools::cluster::{optional, ClusterAccess, LogRequest};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_TAIL_LINES: i64 = 100;

/// Hard ceiling on log bytes returned per call
pub const MAX_LOG_BYTES: usize = 256 * 1024;

pub struct GetLogsTool {
    cluster: Arc<dyn ClusterAccess>,
    max_bytes: usize,
}

impl GetLogsTool {
    pub fn new(cluster: Arc<dyn ClusterAccess>) -> Self {
        Self {
            cluster,
            max_bytes: MAX_LOG_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Params {
    pod_name: String,
    namespace: String,
    #[serde(default)]
    container: Option<String>,
    #[serde(default)]
    tail_lines: Option<i64>,
    #[serde(default)]
    previous: bool,
}

/// Decode `bytes` and cut to at most `max` bytes on a char boundary.
fn bounded_text(bytes: &[u8], max: usize) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

#[async_trait]
impl Tool for GetLogsTool {
    fn name(&self) -> &str {
        "get_logs"
    }

    fn description(&self) -> &str {
        "Fetch container logs for a pod. Essential for diagnosing CrashLoopBackOff, application errors, and runtime issues."
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
                },
                "container": {
                    "type": "string",
                    "description": "Container name (empty for the default container)"
                },
                "tailLines": {
                    "type": "number",
                    "description": "Number of lines from the end (default 100)"
                },
                "previous": {
                    "type": "boolean",
                    "description": "If true, return previous container logs (useful for crash analysis)"
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
        let tail_lines = match params.tail_lines {
            Some(n) if n > 0 => n,
            _ => DEFAULT_TAIL_LINES,
        };

        let request = LogRequest {
            namespace: params.namespace.clone(),
            pod: params.pod_name.clone(),
            container: optional(&params.container).map(str::to_string),
            tail_lines,
            previous: params.previous,
        };

        let stream = match self.cluster.logs(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                return ToolResult::error(format!(
                    "failed to stream logs for {}/{}: {:#}",
                    params.namespace, params.pod_name, e
                ))
            }
        };

        // One byte past the ceiling tells us whether anything was cut.
        let mut buf = Vec::new();
        let mut limited = stream.take(self.max_bytes as u64 + 1);
        if let Err(e) = limited.read_to_end(&mut buf).await {
            return ToolResult::error(format!("failed to read logs: {}", e));
        }
        let truncated = buf.len() > self.max_bytes;
        buf.truncate(self.max_bytes);
        let logs = bounded_text(&buf, self.max_bytes);

        ToolResult::success_data(json!({
            "pod": params.pod_name,
            "namespace": params.namespace,
            "container": request.container,
            "tailLines": tail_lines,
            "previous": params.previous,
            "truncated": truncated,
            "logs": logs,
        }))
    }
}
