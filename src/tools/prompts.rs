//! Built-in prompts steering a client through common availability reviews.

use crate::mcp::{McpRegistry, RegisteredPrompt, RegistryError};

pub fn register_prompts(registry: &McpRegistry) -> Result<(), RegistryError> {
    registry.register_prompt(
        RegisteredPrompt::new(
            "pdb-coverage-review",
            "Review PodDisruptionBudget coverage and fix the biggest gaps",
        )
        .argument("namespace", "Namespace to review (all namespaces if omitted)", false)
        .template(
            "Review PodDisruptionBudget coverage in {namespace}.\n\
             1. Call analyze_cluster_availability to find deployments without a PDB.\n\
             2. Call validate_policy_compliance and group violations by severity.\n\
             3. Propose AvailabilityPolicies that close the CRITICAL gaps first.",
        ),
    )?;

    registry.register_prompt(
        RegisteredPrompt::new(
            "availability-class-advice",
            "Recommend an availability class for one deployment",
        )
        .argument("deployment", "Deployment name", true)
        .argument("namespace", "Namespace of the deployment", false)
        .template(
            "Recommend an availability class for deployment {deployment} in {namespace}.\n\
             Call recommend_availability_classes, explain the matched factors, and if the \
             class should change, show the update_deployment_annotations call that sets it.",
        ),
    )?;

    registry.register_prompt(
        RegisteredPrompt::new(
            "maintenance-window-plan",
            "Plan node maintenance without breaking disruption budgets",
        )
        .argument("namespace", "Namespace to plan for (all namespaces if omitted)", false)
        .template(
            "Plan a node maintenance window for {namespace}.\n\
             1. Call monitor_pdb_events with time_range 7d to spot recurring eviction problems.\n\
             2. Call optimize_resource_allocation to find single-replica workloads.\n\
             3. List the deployments whose PDB would block a drain and what to change first.",
        ),
    )
}
