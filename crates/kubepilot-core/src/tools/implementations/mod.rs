//! Cluster tool implementations
//!
//! - get_resource: one object as YAML
//! - list_resources: paged summary table
//! - describe_resource: kubectl-style description
//! - get_logs: container logs, byte-capped
//! - get_events: events, newest first
//! - get_cluster_health: node readiness and pod status histogram
//! - get_pod_diagnostics: merged pod status and spec record
//! - check_rbac: single permission check

pub mod check_rbac;
pub mod cluster_health;
pub mod describe_resource;
pub mod get_events;
pub mod get_logs;
pub mod get_resource;
pub mod list_resources;
pub mod pod_diagnostics;

pub use check_rbac::CheckRbacTool;
pub use cluster_health::ClusterHealthTool;
pub use describe_resource::DescribeResourceTool;
pub use get_events::GetEventsTool;
pub use get_logs::GetLogsTool;
pub use get_resource::GetResourceTool;
pub use list_resources::ListResourcesTool;
pub use pod_diagnostics::PodDiagnosticsTool;

use std::sync::Arc;

use crate::tools::cluster::ClusterAccess;
use crate::tools::registry::ToolRegistry;

/// Register every cluster tool backed by `cluster`
pub fn register_cluster_tools(registry: &mut ToolRegistry, cluster: Arc<dyn ClusterAccess>) {
    registry.register(Arc::new(GetResourceTool::new(cluster.clone())));
    registry.register(Arc::new(ListResourcesTool::new(cluster.clone())));
    registry.register(Arc::new(DescribeResourceTool::new(cluster.clone())));
    registry.register(Arc::new(GetLogsTool::new(cluster.clone())));
    registry.register(Arc::new(GetEventsTool::new(cluster.clone())));
    registry.register(Arc::new(ClusterHealthTool::new(cluster.clone())));
    registry.register(Arc::new(PodDiagnosticsTool::new(cluster.clone())));
    registry.register(Arc::new(CheckRbacTool::new(cluster)));
}

/// Fresh registry holding the full cluster tool set
pub fn cluster_tools(cluster: Arc<dyn ClusterAccess>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_cluster_tools(&mut registry, cluster);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillRegistry;
    use crate::tools::testing::FakeCluster;

    #[test]
    fn test_full_tool_set_in_order() {
        let registry = cluster_tools(Arc::new(FakeCluster::default()));
        assert_eq!(
            registry.names(),
            vec![
                "get_resource",
                "list_resources",
                "describe_resource",
                "get_logs",
                "get_events",
                "get_cluster_health",
                "get_pod_diagnostics",
                "check_rbac",
            ]
        );
        for tool in registry.ai_tools() {
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(!tool.description.is_empty());
        }
    }

    #[test]
    fn test_security_skill_scopes_real_tools() {
        let registry = cluster_tools(Arc::new(FakeCluster::default()));
        let skills = SkillRegistry::new();
        let scoped = skills.filter_tools("security", &registry.all());
        let mut names: Vec<&str> = scoped.iter().map(|t| t.name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["check_rbac", "describe_resource", "get_resource", "list_resources"]
        );
    }
}
