//! Built-in skills

use super::skill::Skill;

pub(super) fn builtin_skills() -> Vec<Skill> {
    vec![diagnostics(), security(), optimization()]
}

fn diagnostics() -> Skill {
    Skill::new(
        "diagnostics",
        "Diagnose unhealthy pods, deployments, and workloads",
        &[
            "get_pod_diagnostics",
            "get_logs",
            "get_events",
            "describe_resource",
            "get_cluster_health",
            "get_resource",
        ],
        r#"Focus: Root-cause analysis and remediation.
Workflow: Always start by fetching diagnostics/description, then events, then logs (with previous=true for crashes).
Prioritize: CrashLoopBackOff > OOMKilled > ImagePullBackOff > Pending (scheduling) > other.
For each issue found, provide a specific fix (kubectl command or YAML patch)."#,
    )
}

fn security() -> Skill {
    Skill::new(
        "security",
        "RBAC auditing, security posture, and policy analysis",
        &[
            "check_rbac",
            "get_resource",
            "describe_resource",
            "list_resources",
        ],
        r#"Focus: Security posture and RBAC analysis.
Check for: Overly permissive ClusterRoleBindings, wildcard verbs/resources, secrets mounted unnecessarily, containers running as root, missing network policies, service accounts with excessive permissions.
When auditing RBAC: enumerate role bindings, check for privilege escalation paths, verify least-privilege principle.
Flag any security concerns with severity (Critical/High/Medium/Low)."#,
    )
}

fn optimization() -> Skill {
    Skill::new(
        "optimization",
        "Resource utilization, cost optimization, and scaling",
        &[
            "get_cluster_health",
            "list_resources",
            "get_resource",
            "describe_resource",
            "get_pod_diagnostics",
        ],
        r#"Focus: Resource efficiency, cost optimization, and scaling recommendations.
Analyze: CPU/memory requests vs limits, over-provisioned pods, under-utilized nodes, missing resource requests.
Recommend: Right-sized resource requests, HPA configurations, PDB settings, node pool sizing.
Compare actual usage patterns with configured limits when data is available."#,
    )
}
