//! Policy compliance checks and what-if simulation.

use super::{parse_args, scope};
use crate::cluster::SharedCluster;
use crate::domain::pdb::{self, PdbIndex};
use crate::domain::selector::{applicable_policies, highest_priority, spec_matches};
use crate::domain::workload;
use crate::domain::{
    percentage, round2, AvailabilityClass, AvailabilityPolicy, AvailabilityPolicySpec, Severity,
};
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const VALIDATE_TOOL: &str = "validate_policy_compliance";
pub const SIMULATE_TOOL: &str = "simulate_policy_impact";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    NoPolicy,
    MissingPdb,
    PdbMinAvailable,
    PdbMaxUnavailable,
    LowReplicaCount,
    MissingAntiAffinity,
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub deployment: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ComplianceSummary {
    pub total_deployments: usize,
    pub compliant_deployments: usize,
    pub deployments_with_violations: usize,
    pub compliance_score: f64,
    pub policy_coverage: f64,
    pub total_violations: usize,
    pub violations_by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug, Serialize)]
pub struct ComplianceReport {
    pub summary: ComplianceSummary,
    pub violations: Vec<Violation>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct ValidateParams {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimulateParams {
    policy: AvailabilityPolicySpec,
    #[serde(default)]
    namespace: Option<String>,
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    let validate_cluster = cluster.clone();
    registry.register_tool(
        ToolBuilder::new(VALIDATE_TOOL)
            .description("Validate deployments and their PDBs against AvailabilityPolicies")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to validate (all namespaces if omitted)"
                    }
                }
            }))
            .build(move |_ctx, params| {
                let cluster = validate_cluster.clone();
                async move { validate_policy_compliance(cluster, params).await }
            }),
    )?;

    registry.register_tool(
        ToolBuilder::new(SIMULATE_TOOL)
            .description("Preview the impact of a candidate AvailabilityPolicy without applying it")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "policy": {
                        "type": "object",
                        "description": "Candidate AvailabilityPolicy spec"
                    },
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to simulate against (all namespaces if omitted)"
                    }
                },
                "required": ["policy"]
            }))
            .build(move |_ctx, params| {
                let cluster = cluster.clone();
                async move { simulate_policy_impact(cluster, params).await }
            }),
    )
}

async fn validate_policy_compliance(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: ValidateParams = parse_args(params)?;
    let namespace = scope(&params.namespace);

    let deployments = cluster.list_deployments(namespace).await?;
    let pdbs = cluster.list_pdbs(namespace).await?;
    // Policies may select namespaces other than their own.
    let policies = cluster.list_policies(None).await?;

    let report = check_compliance(&deployments, &pdbs, &policies);
    tracing::debug!(
        violations = report.summary.total_violations,
        score = report.summary.compliance_score,
        "Compliance check finished"
    );
    Ok(ToolOutput::json(&report))
}

/// Check every deployment against its highest-priority applicable policy.
pub fn check_compliance(
    deployments: &[Deployment],
    pdbs: &[PodDisruptionBudget],
    policies: &[AvailabilityPolicy],
) -> ComplianceReport {
    let index = PdbIndex::new(pdbs);
    let mut violations = Vec::new();
    let mut covered = 0;

    for deployment in deployments {
        let applicable = applicable_policies(policies, deployment);
        match highest_priority(&applicable) {
            Some(policy) => {
                covered += 1;
                check_deployment(deployment, policy, &index, &mut violations);
            }
            None => violations.push(violation(
                deployment,
                None,
                ViolationKind::NoPolicy,
                Severity::Warning,
                "No AvailabilityPolicy applies to this deployment".to_string(),
            )),
        }
    }

    sort_violations(&mut violations);

    let total = deployments.len();
    let with_violations: BTreeSet<(&str, &str)> = violations
        .iter()
        .map(|v| (v.namespace.as_str(), v.deployment.as_str()))
        .collect();
    let compliant = total - with_violations.len();

    let mut by_severity = BTreeMap::new();
    for v in &violations {
        *by_severity.entry(v.severity).or_insert(0) += 1;
    }

    ComplianceReport {
        summary: ComplianceSummary {
            total_deployments: total,
            compliant_deployments: compliant,
            deployments_with_violations: with_violations.len(),
            compliance_score: round2(percentage(compliant, total)),
            policy_coverage: round2(percentage(covered, total)),
            total_violations: violations.len(),
            violations_by_severity: by_severity,
        },
        violations,
        checked_at: Utc::now(),
    }
}

fn check_deployment(
    deployment: &Deployment,
    policy: &AvailabilityPolicy,
    index: &PdbIndex<'_>,
    out: &mut Vec<Violation>,
) {
    let policy_name = policy.metadata.name.clone();
    let class = policy.spec.availability_class;
    let severity = policy.spec.enforcement.severity();

    match index.managed_for(deployment) {
        None => out.push(Violation {
            expected: Some(pdb::expected_pdb_name(workload::name(deployment))),
            ..violation(
                deployment,
                policy_name.clone(),
                ViolationKind::MissingPdb,
                severity,
                format!("Missing PodDisruptionBudget required by {} policy", class),
            )
        }),
        Some(existing) => {
            if let Some(expected) = pdb::expected_config(&policy.spec) {
                compare_value(
                    deployment,
                    &policy_name,
                    ViolationKind::PdbMinAvailable,
                    "minAvailable",
                    expected.min_available.as_ref(),
                    pdb::min_available(existing),
                    severity,
                    out,
                );
                compare_value(
                    deployment,
                    &policy_name,
                    ViolationKind::PdbMaxUnavailable,
                    "maxUnavailable",
                    expected.max_unavailable.as_ref(),
                    pdb::max_unavailable(existing),
                    severity,
                    out,
                );
            }
        }
    }

    let replicas = workload::replicas(deployment);
    if replicas < 2 {
        let severity = if class == AvailabilityClass::MissionCritical {
            Severity::Critical
        } else {
            Severity::Warning
        };
        out.push(Violation {
            expected: Some("2".to_string()),
            actual: Some(replicas.to_string()),
            ..violation(
                deployment,
                policy_name.clone(),
                ViolationKind::LowReplicaCount,
                severity,
                format!("{} replica(s) cannot tolerate any disruption", replicas),
            )
        });
    }

    if class == AvailabilityClass::MissionCritical && !workload::has_anti_affinity(deployment) {
        out.push(violation(
            deployment,
            policy_name,
            ViolationKind::MissingAntiAffinity,
            Severity::Warning,
            "Mission-critical deployment has no pod anti-affinity".to_string(),
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn compare_value(
    deployment: &Deployment,
    policy: &Option<String>,
    kind: ViolationKind,
    field: &str,
    expected: Option<&IntOrString>,
    actual: Option<&IntOrString>,
    severity: Severity,
    out: &mut Vec<Violation>,
) {
    let Some(expected) = expected else {
        return;
    };
    let expected = pdb::format_value(expected);
    let actual = pdb::format_opt(actual);
    if actual.as_deref() == Some(expected.as_str()) {
        return;
    }
    out.push(Violation {
        expected: Some(expected.clone()),
        actual: actual.clone(),
        ..violation(
            deployment,
            policy.clone(),
            kind,
            severity,
            format!(
                "PDB {} is {}, policy expects {}",
                field,
                actual.as_deref().unwrap_or("unset"),
                expected
            ),
        )
    });
}

fn violation(
    deployment: &Deployment,
    policy: Option<String>,
    kind: ViolationKind,
    severity: Severity,
    message: String,
) -> Violation {
    Violation {
        deployment: workload::name(deployment).to_string(),
        namespace: workload::namespace(deployment).to_string(),
        policy,
        kind,
        severity,
        message,
        expected: None,
        actual: None,
    }
}

/// Severity first (CRITICAL, WARNING, INFO), then deployment name.
pub fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        a.severity
            .order()
            .cmp(&b.severity.order())
            .then_with(|| a.deployment.cmp(&b.deployment))
            .then_with(|| a.namespace.cmp(&b.namespace))
    });
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Serialize)]
pub struct DeploymentImpact {
    pub deployment: String,
    pub namespace: String,
    pub current_class: Option<AvailabilityClass>,
    pub projected_class: AvailabilityClass,
    pub current_min_available: Option<String>,
    pub projected_min_available: Option<String>,
    pub impact: Impact,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub policy_class: AvailabilityClass,
    pub matched_deployments: usize,
    pub impacts: Vec<DeploymentImpact>,
    pub summary: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

async fn simulate_policy_impact(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: SimulateParams = parse_args(params)?;
    params.policy.validate().map_err(ToolError::Validation)?;

    let namespace = scope(&params.namespace);
    let deployments = cluster.list_deployments(namespace).await?;
    let pdbs = cluster.list_pdbs(namespace).await?;

    Ok(ToolOutput::json(&simulate(&params.policy, &deployments, &pdbs)))
}

/// Project a candidate policy onto the current deployments.
pub fn simulate(
    spec: &AvailabilityPolicySpec,
    deployments: &[Deployment],
    pdbs: &[PodDisruptionBudget],
) -> SimulationReport {
    let index = PdbIndex::new(pdbs);
    let projected_config = pdb::expected_config(spec);
    let projected_value = projected_config.as_ref().and_then(|c| {
        pdb::format_opt(c.min_available.as_ref())
            .or_else(|| pdb::format_opt(c.max_unavailable.as_ref()).map(|v| format!("maxUnavailable {}", v)))
    });

    let mut impacts = Vec::new();
    for deployment in deployments.iter().filter(|d| spec_matches(spec, d)) {
        let covering = index.covering(deployment);
        let current_min = covering.and_then(pdb::min_available);
        let current_class = workload::availability_class(deployment).or_else(|| {
            current_min.map(|v| pdb::infer_class(v, workload::replicas(deployment)))
        });
        let (impact, reason) = classify(covering.is_some(), current_class, spec.availability_class);

        impacts.push(DeploymentImpact {
            deployment: workload::name(deployment).to_string(),
            namespace: workload::namespace(deployment).to_string(),
            current_class,
            projected_class: spec.availability_class,
            current_min_available: pdb::format_opt(current_min),
            projected_min_available: projected_value.clone(),
            impact,
            reason,
        });
    }

    let mut summary = BTreeMap::from([
        ("high".to_string(), 0),
        ("medium".to_string(), 0),
        ("low".to_string(), 0),
    ]);
    for i in &impacts {
        let key = match i.impact {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        };
        *summary.entry(key.to_string()).or_insert(0) += 1;
    }

    let mut warnings = Vec::new();
    if impacts.is_empty() {
        warnings.push("No deployments match the policy selector".to_string());
    }
    let high = summary.get("high").copied().unwrap_or_default();
    if high > 0 {
        warnings.push(format!("{} deployment(s) would see high-impact changes", high));
    }

    SimulationReport {
        policy_class: spec.availability_class,
        matched_deployments: impacts.len(),
        impacts,
        summary,
        warnings,
    }
}

/// Impact of moving from `current` to `projected`.
pub fn classify(
    has_pdb: bool,
    current: Option<AvailabilityClass>,
    projected: AvailabilityClass,
) -> (Impact, String) {
    if !has_pdb {
        return (Impact::Medium, "A new PodDisruptionBudget would be created".to_string());
    }
    let (Some(from), Some(to)) = (current.and_then(|c| c.order()), projected.order()) else {
        return (Impact::Medium, "Custom PDB configuration would be applied".to_string());
    };
    let delta = to - from;
    match delta {
        d if d < 0 => (Impact::High, "Availability class would be reduced".to_string()),
        0 => (Impact::Low, "Availability class unchanged".to_string()),
        1 => (Impact::Medium, "Availability class raised by one level".to_string()),
        d => (Impact::High, format!("Availability class raised by {} levels", d)),
    }
}
