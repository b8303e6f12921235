//! `analyze_cluster_availability`: PDB coverage and availability issues.

use super::{parse_args, scope};
use crate::cluster::SharedCluster;
use crate::domain::workload;
use crate::domain::{percentage, round2, AvailabilityClass, ComponentFunction, PdbIndex};
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const TOOL_NAME: &str = "analyze_cluster_availability";

pub const ISSUE_MULTI_REPLICA_NO_PDB: &str = "Multi-replica deployment without PDB";
pub const ISSUE_MISSING_CLASS: &str = "Missing availability class annotation";
pub const ISSUE_SINGLE_REPLICA_HA: &str = "Single replica with high availability class";
pub const ISSUE_WEAK_SECURITY_CLASS: &str = "Security component should have higher availability class";

#[derive(Debug, Default, Deserialize)]
struct AnalyzeParams {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityReport {
    pub summary: CoverageSummary,
    pub by_namespace: BTreeMap<String, NamespaceCoverage>,
    pub deployments: Vec<DeploymentAvailability>,
    pub issues_found: usize,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CoverageSummary {
    pub total_deployments: usize,
    pub deployments_with_pdb: usize,
    pub deployments_without_pdb: usize,
    pub coverage_percentage: f64,
    pub total_pdbs: usize,
    pub namespaces_analyzed: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct NamespaceCoverage {
    pub total: usize,
    pub with_pdb: usize,
    pub coverage_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct DeploymentAvailability {
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
    pub availability_class: Option<String>,
    pub component_function: Option<String>,
    pub has_pdb: bool,
    pub pdb_name: Option<String>,
    pub issues: Vec<String>,
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    registry.register_tool(
        ToolBuilder::new(TOOL_NAME)
            .description(
                "Analyze PodDisruptionBudget coverage and availability issues for deployments",
            )
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to analyze (all namespaces if omitted)"
                    }
                }
            }))
            .build(move |_ctx, params| {
                let cluster = cluster.clone();
                async move { analyze_cluster_availability(cluster, params).await }
            }),
    )
}

async fn analyze_cluster_availability(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: AnalyzeParams = parse_args(params)?;
    let namespace = scope(&params.namespace);

    let deployments = cluster.list_deployments(namespace).await?;
    let pdbs = cluster.list_pdbs(namespace).await?;
    tracing::debug!(
        namespace = namespace.unwrap_or("*"),
        deployments = deployments.len(),
        pdbs = pdbs.len(),
        "Analyzing availability"
    );

    Ok(ToolOutput::json(&analyze(&deployments, &pdbs)))
}

/// Coverage report over a snapshot of deployments and PDBs.
pub fn analyze(deployments: &[Deployment], pdbs: &[PodDisruptionBudget]) -> AvailabilityReport {
    let index = PdbIndex::new(pdbs);
    let mut by_namespace: BTreeMap<String, NamespaceCoverage> = BTreeMap::new();
    let mut rows = Vec::with_capacity(deployments.len());

    for deployment in deployments {
        let covering = index.covering(deployment);
        let has_pdb = covering.is_some();

        let entry = by_namespace
            .entry(workload::namespace(deployment).to_string())
            .or_default();
        entry.total += 1;
        if has_pdb {
            entry.with_pdb += 1;
        }

        let class = workload::class_annotation(deployment);
        let function = workload::function_annotation(deployment);
        rows.push(DeploymentAvailability {
            name: workload::name(deployment).to_string(),
            namespace: workload::namespace(deployment).to_string(),
            replicas: workload::replicas(deployment),
            availability_class: (!class.is_empty()).then(|| class.to_string()),
            component_function: (!function.is_empty()).then(|| function.to_string()),
            has_pdb,
            pdb_name: covering.and_then(|p| p.metadata.name.clone()),
            issues: detect_issues(deployment, has_pdb),
        });
    }

    for coverage in by_namespace.values_mut() {
        coverage.coverage_percentage = round2(percentage(coverage.with_pdb, coverage.total));
    }

    let total = rows.len();
    let with_pdb = rows.iter().filter(|r| r.has_pdb).count();
    let issues_found = rows.iter().map(|r| r.issues.len()).sum();

    AvailabilityReport {
        summary: CoverageSummary {
            total_deployments: total,
            deployments_with_pdb: with_pdb,
            deployments_without_pdb: total - with_pdb,
            coverage_percentage: round2(percentage(with_pdb, total)),
            total_pdbs: index.len(),
            namespaces_analyzed: by_namespace.len(),
        },
        by_namespace,
        deployments: rows,
        issues_found,
        analyzed_at: Utc::now(),
    }
}

fn detect_issues(deployment: &Deployment, has_pdb: bool) -> Vec<String> {
    let mut issues = Vec::new();
    let replicas = workload::replicas(deployment);
    let class = workload::class_annotation(deployment);

    if replicas > 1 && !has_pdb {
        issues.push(ISSUE_MULTI_REPLICA_NO_PDB.to_string());
    }
    if class.is_empty() {
        issues.push(ISSUE_MISSING_CLASS.to_string());
    }
    if replicas == 1
        && matches!(
            workload::availability_class(deployment),
            Some(AvailabilityClass::HighAvailability | AvailabilityClass::MissionCritical)
        )
    {
        issues.push(ISSUE_SINGLE_REPLICA_HA.to_string());
    }
    if workload::component_function(deployment) == Some(ComponentFunction::Security)
        && (class.is_empty() || class == AvailabilityClass::NonCritical.as_str())
    {
        issues.push(ISSUE_WEAK_SECURITY_CLASS.to_string());
    }
    issues
}
