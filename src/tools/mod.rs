//! # Domain tools
//!
//! Availability tooling served over the dispatch core. Each family lives in
//! its own module and exposes `register_tools(registry, cluster)`.
//!
//! | Module | Tools |
//! |---|---|
//! | `analysis` | `analyze_cluster_availability` |
//! | `recommendations` | `recommend_availability_classes` |
//! | `management` | `list_availability_policies`, `create_availability_policy`, `update_deployment_annotations` |
//! | `compliance` | `validate_policy_compliance`, `simulate_policy_impact` |
//! | `backup` | `backup_policies`, `restore_policies` |
//! | `monitoring` | `monitor_pdb_events` |
//! | `optimization` | `optimize_resource_allocation` |
//!
//! Prompts and resources need no cluster and are registered by
//! [`register_builtins`].

pub mod analysis;
pub mod backup;
pub mod compliance;
pub mod management;
pub mod monitoring;
pub mod optimization;
pub mod prompts;
pub mod recommendations;
pub mod resources;

use crate::cluster::SharedCluster;
use crate::mcp::{McpRegistry, RegistryError, ToolError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Register every cluster-backed tool.
pub fn register_all_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    analysis::register_tools(registry, cluster.clone())?;
    recommendations::register_tools(registry, cluster.clone())?;
    management::register_tools(registry, cluster.clone())?;
    compliance::register_tools(registry, cluster.clone())?;
    backup::register_tools(registry, cluster.clone())?;
    monitoring::register_tools(registry, cluster.clone())?;
    optimization::register_tools(registry, cluster)?;
    tracing::info!(tools = registry.tool_count(), "Registered availability tools");
    Ok(())
}

/// Register prompts and resources.
pub fn register_builtins(registry: &McpRegistry) -> Result<(), RegistryError> {
    prompts::register_prompts(registry)?;
    resources::register_resources(registry)?;
    Ok(())
}

/// Decode tool arguments. Absent arguments decode as an empty object.
pub(crate) fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T, ToolError> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Treat a blank namespace as "all namespaces".
pub(crate) fn scope(namespace: &Option<String>) -> Option<&str> {
    namespace
        .as_deref()
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
}
