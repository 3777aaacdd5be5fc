//! Prompt text

/// Base system message for every session
pub fn system_message() -> &'static str {
    r#"You are an expert Kubernetes cluster assistant integrated into kubepilot, a terminal-based Kubernetes companion.

Available tools:
- get_resource: Fetch a specific resource by GVR, name, and namespace (returns YAML)
- list_resources: List resources of a given type with optional label selectors and limits
- describe_resource: Get full kubectl-style description including events and conditions
- get_logs: Fetch container logs (supports tail, previous containers for crash analysis)
- get_events: Fetch cluster events filtered by namespace, resource, or type (Normal/Warning)
- get_cluster_health: High-level cluster overview: node count, pod status summary, server version
- get_pod_diagnostics: Comprehensive pod diagnostics: phase, container states, restarts, exit codes, probes, resource limits
- check_rbac: Verify if the current user can perform a specific verb on a resource

Diagnostic workflow:
1. Start with get_pod_diagnostics or describe_resource to understand the current state
2. Check get_events for Warnings related to the resource
3. If containers are crashing, use get_logs with previous=true to get crash logs
4. Check get_cluster_health for cluster-wide issues (node pressure, resource exhaustion)
5. Use check_rbac if permission issues are suspected

Guidelines:
- Be concise and actionable; users are SREs/DevOps engineers in a terminal
- When diagnosing issues, start with the most likely root cause
- Provide kubectl commands or YAML patches when suggesting fixes
- Use bullet points and short paragraphs for readability in a terminal
- Flag security concerns when you notice them (exposed secrets, overly permissive RBAC, missing network policies)
- If you need more information to diagnose, use the available tools to fetch it; do not ask the user to run commands manually
- Always consider the Kubernetes context (namespace, cluster) when answering
- When listing resources, use sensible limits to avoid overwhelming output"#
}

/// Base system message plus an optional skill addendum
pub fn compose_system_message(suffix: &str) -> String {
    let mut message = system_message().to_string();
    if !suffix.is_empty() {
        message.push_str("\n\n");
        message.push_str(suffix);
    }
    message
}

pub fn diagnose_prompt(kind: &str, name: &str, namespace: &str) -> String {
    format!(
        "Diagnose the {} '{}' in namespace '{}'. Check its status, recent events, logs if applicable, and suggest fixes for any issues.",
        kind, name, namespace
    )
}

pub fn explain_prompt(kind: &str, name: &str, namespace: &str) -> String {
    format!(
        "Explain the {} '{}' in namespace '{}'. Describe its current state, configuration, and how it relates to other resources in the cluster. Highlight anything unusual.",
        kind, name, namespace
    )
}

/// The resource a chat is focused on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceScope {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceScope {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse `KIND/NAME` or `KIND/NAMESPACE/NAME`.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split('/').map(str::trim).collect();
        match parts.as_slice() {
            [kind, name] if !kind.is_empty() && !name.is_empty() => {
                Some(Self::new(*kind, "", *name))
            }
            [kind, ns, name] if !kind.is_empty() && !name.is_empty() => {
                Some(Self::new(*kind, *ns, *name))
            }
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !self.kind.is_empty() && !self.name.is_empty()
    }
}

/// History key: `kind/ns/name`, `kind/name`, or `_global_`
pub fn chat_scope(scope: Option<&ResourceScope>) -> String {
    match scope.filter(|s| s.is_set()) {
        None => "_global_".to_string(),
        Some(s) if s.namespace.is_empty() => format!("{}/{}", s.kind, s.name),
        Some(s) => format!("{}/{}/{}", s.kind, s.namespace, s.name),
    }
}

/// Wrap a question so the agent stays on one workload.
pub fn contextual_prompt(text: &str, scope: Option<&ResourceScope>) -> String {
    let Some(scope) = scope.filter(|s| s.is_set()) else {
        return text.to_string();
    };
    let ns = if scope.namespace.is_empty() {
        "(cluster-scoped)"
    } else {
        scope.namespace.as_str()
    };

    format!(
        r#"[RESOURCE CONTEXT]
This chat is focused on the {kind} "{name}" in namespace "{ns}".
Focus your analysis ONLY on this specific workload and its directly related resources:
- The {kind} itself and its pods/replicas
- Services that select or target it
- ConfigMaps, Secrets, and ServiceAccounts it references
- Ingress or NetworkPolicies related to it
- PersistentVolumeClaims it uses
- Events related to it and its pods

Do NOT analyze unrelated cluster-wide resources unless the user explicitly asks.
When using diagnostic tools, scope queries to this resource and its namespace.

[USER QUESTION]
{text}"#,
        kind = scope.kind,
        name = scope.name,
        ns = ns,
        text = text
    )
}

/// Status line for a running tool
pub fn tool_display_name(tool: &str) -> String {
    match tool {
        "get_resource" => "Fetching resource...".to_string(),
        "list_resources" => "Listing resources...".to_string(),
        "describe_resource" => "Describing resource...".to_string(),
        "get_logs" => "Fetching logs...".to_string(),
        "get_events" => "Checking events...".to_string(),
        "get_cluster_health" => "Checking cluster health...".to_string(),
        "get_pod_diagnostics" => "Running pod diagnostics...".to_string(),
        "check_rbac" => "Checking RBAC permissions...".to_string(),
        "report_intent" => "Planning action...".to_string(),
        other => format!("Running {}...", other),
    }
}
