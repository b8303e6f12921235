//! `optimize_resource_allocation`: scaling, resource and PDB advice.

use super::{parse_args, scope};
use crate::cluster::SharedCluster;
use crate::domain::pdb::{self, PdbIndex};
use crate::domain::{round2, workload};
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TOOL_NAME: &str = "optimize_resource_allocation";

/// Rough monthly cost of one replica, used for savings estimates.
const REPLICA_MONTHLY_COST: f64 = 25.0;
const AUTOSCALE_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationTarget {
    Availability,
    Cost,
    #[default]
    Balanced,
}

impl OptimizationTarget {
    fn cost_aware(&self) -> bool {
        matches!(self, OptimizationTarget::Cost | OptimizationTarget::Balanced)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OptimizeParams {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    optimization_target: OptimizationTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Scaling,
    Resources,
    Pdb,
}

#[derive(Debug, Serialize)]
pub struct Advice {
    pub category: Category,
    pub priority: Priority,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CurrentState {
    pub replicas: i32,
    pub has_pdb: bool,
    pub pdb_min_available: Option<String>,
    pub has_requests: bool,
    pub has_limits: bool,
}

#[derive(Debug, Serialize)]
pub struct RecommendedConfiguration {
    pub replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdb_min_available: Option<String>,
    pub add_requests: bool,
    pub add_limits: bool,
    pub enable_autoscaling: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AvailabilityLevel {
    Low,
    Moderate,
    Good,
}

impl AvailabilityLevel {
    pub fn for_replicas(replicas: i32) -> Self {
        match replicas {
            r if r >= 3 => AvailabilityLevel::Good,
            2 => AvailabilityLevel::Moderate,
            _ => AvailabilityLevel::Low,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailabilityImpact {
    pub current: AvailabilityLevel,
    pub projected: AvailabilityLevel,
    pub improvement: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Risk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Serialize)]
pub struct DeploymentOptimization {
    pub name: String,
    pub namespace: String,
    pub current: CurrentState,
    pub recommendations: Vec<Advice>,
    pub recommended_configuration: RecommendedConfiguration,
    pub availability_impact: AvailabilityImpact,
    pub implementation_risk: Risk,
    pub estimated_monthly_savings: f64,
}

#[derive(Debug, Serialize)]
pub struct OptimizationReport {
    pub optimization_target: OptimizationTarget,
    pub summary: OptimizationSummary,
    pub deployments: Vec<DeploymentOptimization>,
    pub cluster_recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OptimizationSummary {
    pub total_deployments: usize,
    pub with_recommendations: usize,
    pub high_priority: usize,
    pub pdb_needed: usize,
    pub resources_needed: usize,
    pub estimated_total_savings: f64,
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    registry.register_tool(
        ToolBuilder::new(TOOL_NAME)
            .description("Recommend replica, resource and PDB changes balancing availability and cost")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to optimize (all namespaces if omitted)"
                    },
                    "optimization_target": {
                        "type": "string",
                        "enum": ["availability", "cost", "balanced"],
                        "default": "balanced"
                    }
                }
            }))
            .build(move |_ctx, params| {
                let cluster = cluster.clone();
                async move { optimize_resource_allocation(cluster, params).await }
            }),
    )
}

async fn optimize_resource_allocation(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: OptimizeParams = parse_args(params)?;
    let namespace = scope(&params.namespace);
    let deployments = cluster.list_deployments(namespace).await?;
    let pdbs = cluster.list_pdbs(namespace).await?;
    Ok(ToolOutput::json(&optimize(&deployments, &pdbs, params.optimization_target)))
}

pub fn optimize(
    deployments: &[Deployment],
    pdbs: &[PodDisruptionBudget],
    target: OptimizationTarget,
) -> OptimizationReport {
    let index = PdbIndex::new(pdbs);
    let mut rows = Vec::with_capacity(deployments.len());
    let (mut pdb_needed, mut resources_needed) = (0, 0);

    for deployment in deployments {
        let row = optimize_one(deployment, index.covering(deployment), target);
        if row.recommendations.iter().any(|a| a.category == Category::Pdb && !row.current.has_pdb) {
            pdb_needed += 1;
        }
        if !row.current.has_requests || !row.current.has_limits {
            resources_needed += 1;
        }
        rows.push(row);
    }

    let mut cluster_recommendations = Vec::new();
    if pdb_needed > 3 {
        cluster_recommendations.push(format!(
            "{} deployments lack a PodDisruptionBudget; adopt AvailabilityPolicies to manage PDBs consistently",
            pdb_needed
        ));
    }
    if resources_needed > 5 {
        cluster_recommendations.push(format!(
            "{} deployments lack resource requests or limits; define namespace LimitRange defaults",
            resources_needed
        ));
    }

    OptimizationReport {
        optimization_target: target,
        summary: OptimizationSummary {
            total_deployments: rows.len(),
            with_recommendations: rows.iter().filter(|r| !r.recommendations.is_empty()).count(),
            high_priority: rows
                .iter()
                .flat_map(|r| &r.recommendations)
                .filter(|a| a.priority == Priority::High)
                .count(),
            pdb_needed,
            resources_needed,
            estimated_total_savings: round2(rows.iter().map(|r| r.estimated_monthly_savings).sum()),
        },
        deployments: rows,
        cluster_recommendations,
    }
}

fn optimize_one(
    deployment: &Deployment,
    covering: Option<&PodDisruptionBudget>,
    target: OptimizationTarget,
) -> DeploymentOptimization {
    let replicas = workload::replicas(deployment);
    let current_min = covering.and_then(pdb::min_available);
    let current = CurrentState {
        replicas,
        has_pdb: covering.is_some(),
        pdb_min_available: pdb::format_opt(current_min),
        has_requests: !workload::missing_requests(deployment),
        has_limits: !workload::missing_limits(deployment),
    };

    let mut advice = Vec::new();
    let mut config = RecommendedConfiguration {
        replicas,
        pdb_min_available: None,
        add_requests: !current.has_requests,
        add_limits: !current.has_limits,
        enable_autoscaling: false,
    };
    let mut savings = 0.0;

    if replicas < 2 {
        config.replicas = 2;
        advice.push(Advice {
            category: Category::Scaling,
            priority: Priority::High,
            message: "Increase replicas to at least 2 so voluntary disruptions keep a pod serving"
                .to_string(),
        });
    } else if replicas > AUTOSCALE_THRESHOLD && target.cost_aware() {
        config.enable_autoscaling = true;
        savings = (replicas - AUTOSCALE_THRESHOLD) as f64 * REPLICA_MONTHLY_COST;
        advice.push(Advice {
            category: Category::Scaling,
            priority: Priority::Medium,
            message: format!(
                "{} static replicas; consider a HorizontalPodAutoscaler to scale with demand",
                replicas
            ),
        });
    }

    if !current.has_requests {
        advice.push(Advice {
            category: Category::Resources,
            priority: Priority::High,
            message: "Set CPU and memory requests so the scheduler can place pods reliably"
                .to_string(),
        });
    }
    if !current.has_limits {
        advice.push(Advice {
            category: Category::Resources,
            priority: Priority::Medium,
            message: "Set CPU and memory limits to contain noisy neighbours".to_string(),
        });
    }

    match current_min {
        None if !current.has_pdb && replicas > 1 => {
            let min = if replicas == 2 {
                IntOrString::Int(1)
            } else {
                IntOrString::String("50%".to_string())
            };
            advice.push(Advice {
                category: Category::Pdb,
                priority: Priority::High,
                message: format!(
                    "Create a PodDisruptionBudget with minAvailable {}",
                    pdb::format_value(&min)
                ),
            });
            config.pdb_min_available = Some(pdb::format_value(&min));
        }
        Some(IntOrString::Int(1)) if replicas >= 3 => {
            advice.push(Advice {
                category: Category::Pdb,
                priority: Priority::Low,
                message: "minAvailable 1 does not scale with replicas; consider a percentage such as 50%"
                    .to_string(),
            });
            config.pdb_min_available = Some("50%".to_string());
        }
        _ => {}
    }

    let projected = AvailabilityLevel::for_replicas(config.replicas);
    let impact = AvailabilityImpact {
        current: AvailabilityLevel::for_replicas(replicas),
        projected,
        improvement: config.replicas > replicas,
    };

    DeploymentOptimization {
        name: workload::name(deployment).to_string(),
        namespace: workload::namespace(deployment).to_string(),
        implementation_risk: assess_risk(&advice),
        current,
        recommendations: advice,
        recommended_configuration: config,
        availability_impact: impact,
        estimated_monthly_savings: round2(savings),
    }
}

/// Risk from the number of high and medium priority changes.
pub fn assess_risk(advice: &[Advice]) -> Risk {
    let high = advice.iter().filter(|a| a.priority == Priority::High).count();
    let medium = advice.iter().filter(|a| a.priority == Priority::Medium).count();
    if high >= 2 {
        Risk::High
    } else if high == 1 || medium >= 2 {
        Risk::Medium
    } else {
        Risk::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::{pdb, DeploymentFixture};

    fn row<'a>(report: &'a OptimizationReport, name: &str) -> &'a DeploymentOptimization {
        report.deployments.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn test_single_replica_without_resources() {
        let d = DeploymentFixture::new("ns", "solo", 1).container().build();
        let report = optimize(&[d], &[], OptimizationTarget::Availability);
        let solo = row(&report, "solo");

        assert_eq!(solo.recommended_configuration.replicas, 2);
        assert!(solo.availability_impact.improvement);
        assert_eq!(solo.availability_impact.projected, AvailabilityLevel::Moderate);
        assert_eq!(solo.implementation_risk, Risk::High);
        assert!(solo.recommendations.iter().all(|a| a.category != Category::Pdb));
        assert_eq!(report.summary.resources_needed, 1);
    }

    #[test]
    fn test_pdb_suggestions() {
        let deployments = vec![
            DeploymentFixture::new("ns", "pair", 2).container_with_resources().build(),
            DeploymentFixture::new("ns", "trio", 3).container_with_resources().build(),
            DeploymentFixture::new("ns", "fixed", 4).container_with_resources().build(),
        ];
        let pdbs = vec![pdb("ns", "fixed-pdb", Some(IntOrString::Int(1)), None, &[])];
        let report = optimize(&deployments, &pdbs, OptimizationTarget::Balanced);

        assert_eq!(row(&report, "pair").recommended_configuration.pdb_min_available.as_deref(), Some("1"));
        assert_eq!(row(&report, "trio").recommended_configuration.pdb_min_available.as_deref(), Some("50%"));

        let fixed = row(&report, "fixed");
        assert_eq!(fixed.recommendations.len(), 1);
        assert_eq!(fixed.recommendations[0].priority, Priority::Low);
        assert_eq!(fixed.implementation_risk, Risk::Low);
        assert_eq!(report.summary.pdb_needed, 2);
    }

    #[test]
    fn test_autoscaler_only_when_cost_aware() {
        let big = DeploymentFixture::new("ns", "big", 14).container_with_resources().build();
        let pdbs = vec![pdb("ns", "big-pdb", Some(IntOrString::String("50%".into())), None, &[])];

        let cost = optimize(std::slice::from_ref(&big), &pdbs, OptimizationTarget::Cost);
        assert!(row(&cost, "big").recommended_configuration.enable_autoscaling);
        assert_eq!(cost.summary.estimated_total_savings, 100.0);

        let availability = optimize(&[big], &pdbs, OptimizationTarget::Availability);
        assert!(row(&availability, "big").recommendations.is_empty());
        assert_eq!(availability.summary.estimated_total_savings, 0.0);
    }

    #[test]
    fn test_cluster_level_recommendations() {
        let deployments: Vec<_> = (0..6)
            .map(|i| DeploymentFixture::new("ns", &format!("svc-{}", i), 3).container().build())
            .collect();
        let report = optimize(&deployments, &[], OptimizationTarget::Balanced);
        assert_eq!(report.cluster_recommendations.len(), 2);
    }
}
