//! Policy management: listing, creation (direct and intelligent) and
//! deployment annotation updates.

use super::{parse_args, scope};
use crate::cluster::{ClusterError, SharedCluster};
use crate::domain::class::ODA_ANNOTATION_PREFIX;
use crate::domain::selector::common_labels;
use crate::domain::workload;
use crate::domain::{
    AvailabilityClass, AvailabilityPolicy, AvailabilityPolicySpec, ComponentFunction,
    ComponentSelector, EnforcementMode, PdbConfig, AVAILABILITY_CLASS_ANNOTATION,
    COMPONENT_FUNCTION_ANNOTATION,
};
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const LIST_TOOL: &str = "list_availability_policies";
pub const CREATE_TOOL: &str = "create_availability_policy";
pub const ANNOTATE_TOOL: &str = "update_deployment_annotations";

const DEFAULT_NAME_PREFIX: &str = "auto";

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    #[serde(default)]
    namespace: Option<String>,
}

/// How intelligent creation partitions deployments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Auto,
    Class,
    Tier,
    Component,
}

#[derive(Debug, Default, Deserialize)]
struct CreateParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    availability_class: Option<AvailabilityClass>,
    #[serde(default)]
    enforcement: Option<EnforcementMode>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    component_selector: Option<ComponentSelector>,
    #[serde(default)]
    custom_pdb_config: Option<PdbConfig>,
    #[serde(default)]
    dry_run: bool,

    #[serde(default)]
    auto_detect: bool,
    #[serde(default)]
    group_by: Option<GroupBy>,
    #[serde(default)]
    target_deployments: Vec<String>,
    #[serde(default)]
    exclude_deployments: Vec<String>,
    #[serde(default)]
    create_multiple: bool,
    #[serde(default)]
    name_prefix: Option<String>,
}

impl CreateParams {
    fn is_intelligent(&self) -> bool {
        self.auto_detect || self.group_by.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateParams {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    #[serde(default)]
    remove_annotations: Vec<String>,
}

/// Reporting view of a stored policy.
#[derive(Debug, Serialize)]
pub struct PolicySummary {
    pub name: String,
    pub namespace: String,
    pub availability_class: AvailabilityClass,
    pub enforcement: EnforcementMode,
    pub priority: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub component_names: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&AvailabilityPolicy> for PolicySummary {
    fn from(policy: &AvailabilityPolicy) -> Self {
        Self {
            name: policy.metadata.name.clone().unwrap_or_default(),
            namespace: policy.metadata.namespace.clone().unwrap_or_default(),
            availability_class: policy.spec.availability_class,
            enforcement: policy.spec.enforcement,
            priority: policy.spec.priority,
            component_names: policy.spec.component_selector.component_names.clone(),
            match_labels: policy.spec.component_selector.match_labels.clone(),
            created_at: policy.metadata.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    let list_cluster = cluster.clone();
    registry.register_tool(
        ToolBuilder::new(LIST_TOOL)
            .description("List AvailabilityPolicies with their class, enforcement and priority")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "namespace": {
                        "type": "string",
                        "description": "Namespace to list (all namespaces if omitted)"
                    }
                }
            }))
            .build(move |_ctx, params| {
                let cluster = list_cluster.clone();
                async move { list_availability_policies(cluster, params).await }
            }),
    )?;

    let create_cluster = cluster.clone();
    registry.register_tool(
        ToolBuilder::new(CREATE_TOOL)
            .description(
                "Create an AvailabilityPolicy explicitly, or generate policies by grouping deployments",
            )
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Policy name (direct mode)"},
                    "namespace": {"type": "string", "description": "Target namespace"},
                    "availability_class": {
                        "type": "string",
                        "enum": ["non-critical", "standard", "high-availability", "mission-critical", "custom"]
                    },
                    "enforcement": {"type": "string", "enum": ["strict", "flexible", "advisory"]},
                    "priority": {"type": "integer"},
                    "component_selector": {"type": "object"},
                    "custom_pdb_config": {"type": "object"},
                    "dry_run": {"type": "boolean", "default": false},
                    "auto_detect": {"type": "boolean", "description": "Generate policies from deployments"},
                    "group_by": {"type": "string", "enum": ["auto", "class", "tier", "component"]},
                    "target_deployments": {"type": "array", "items": {"type": "string"}},
                    "exclude_deployments": {"type": "array", "items": {"type": "string"}},
                    "create_multiple": {"type": "boolean", "default": false},
                    "name_prefix": {"type": "string", "default": DEFAULT_NAME_PREFIX}
                },
                "required": ["namespace"]
            }))
            .build(move |_ctx, params| {
                let cluster = create_cluster.clone();
                async move { create_availability_policy(cluster, params).await }
            }),
    )?;

    registry.register_tool(
        ToolBuilder::new(ANNOTATE_TOOL)
            .description("Add or remove annotations on a deployment, validating ODA annotations")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "namespace": {"type": "string"},
                    "annotations": {
                        "type": "object",
                        "additionalProperties": {"type": "string"}
                    },
                    "remove_annotations": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["name", "namespace"]
            }))
            .build(move |_ctx, params| {
                let cluster = cluster.clone();
                async move { update_deployment_annotations(cluster, params).await }
            }),
    )
}

// ============================================================================
// list_availability_policies
// ============================================================================

async fn list_availability_policies(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: ListParams = parse_args(params)?;
    let mut policies = cluster.list_policies(scope(&params.namespace)).await?;
    policies.sort_by(|a, b| {
        (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name))
    });

    let summaries: Vec<PolicySummary> = policies.iter().map(PolicySummary::from).collect();
    let mut by_class: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_enforcement: BTreeMap<String, usize> = BTreeMap::new();
    for s in &summaries {
        *by_class.entry(s.availability_class.to_string()).or_default() += 1;
        *by_enforcement.entry(s.enforcement.to_string()).or_default() += 1;
    }

    Ok(ToolOutput::json(&json!({
        "total": summaries.len(),
        "by_class": by_class,
        "by_enforcement": by_enforcement,
        "policies": summaries,
    })))
}

// ============================================================================
// create_availability_policy
// ============================================================================

async fn create_availability_policy(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: CreateParams = parse_args(params)?;
    if params.is_intelligent() {
        create_intelligent(cluster, params).await
    } else {
        create_direct(cluster, params).await
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ToolError> {
    scope(value).ok_or_else(|| ToolError::Validation(format!("{} is required", field)))
}

async fn create_direct(cluster: SharedCluster, params: CreateParams) -> Result<ToolOutput, ToolError> {
    let name = required(&params.name, "name")?;
    let namespace = required(&params.namespace, "namespace")?;
    let class = params
        .availability_class
        .ok_or_else(|| ToolError::Validation("availability_class is required".to_string()))?;

    let mut spec = AvailabilityPolicySpec::new(class);
    spec.enforcement = params.enforcement.unwrap_or_default();
    spec.priority = params.priority.unwrap_or_else(|| class.default_priority());
    spec.component_selector = params.component_selector.unwrap_or_default();
    spec.custom_pdb_config = params.custom_pdb_config;
    spec.validate().map_err(ToolError::Validation)?;

    let policy = AvailabilityPolicy::namespaced(namespace, name, spec);
    if params.dry_run {
        return Ok(ToolOutput::json(&json!({
            "mode": "direct",
            "dry_run": true,
            "policy": policy,
        })));
    }

    let created = cluster.create_policy(&policy).await?;
    tracing::info!(policy = %created.key(), class = %class, "Created AvailabilityPolicy");
    Ok(ToolOutput::json(&json!({
        "mode": "direct",
        "dry_run": false,
        "created": PolicySummary::from(&created),
    })))
}

/// Policy generated for one deployment group.
#[derive(Debug, Serialize)]
pub struct PolicyPlan {
    pub group: String,
    pub policy_name: String,
    pub deployments: Vec<String>,
    pub average_replicas: f64,
    pub detected_class: AvailabilityClass,
    pub priority: i32,
    pub component_selector: ComponentSelector,
}

impl PolicyPlan {
    fn to_policy(&self, namespace: &str, enforcement: EnforcementMode) -> AvailabilityPolicy {
        let mut spec = AvailabilityPolicySpec::new(self.detected_class);
        spec.enforcement = enforcement;
        spec.priority = self.priority;
        spec.component_selector = self.component_selector.clone();
        AvailabilityPolicy::namespaced(namespace, &self.policy_name, spec)
    }
}

async fn create_intelligent(cluster: SharedCluster, params: CreateParams) -> Result<ToolOutput, ToolError> {
    let namespace = required(&params.namespace, "namespace")?;
    let group_by = params.group_by.unwrap_or_default();
    let prefix = params
        .name_prefix
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_NAME_PREFIX);
    let enforcement = params.enforcement.unwrap_or_default();

    let deployments = cluster.list_deployments(Some(namespace)).await?;
    let candidates = select_candidates(&deployments, &params.target_deployments, &params.exclude_deployments);
    let mut plans = plan_policies(&candidates, group_by, prefix);
    let total_groups = plans.len();
    if !params.create_multiple {
        plans.truncate(1);
    }

    let mut created = Vec::new();
    let mut errors = Vec::new();
    if !params.dry_run {
        for plan in &plans {
            let policy = plan.to_policy(namespace, enforcement);
            match cluster.create_policy(&policy).await {
                Ok(p) => {
                    tracing::info!(policy = %p.key(), group = %plan.group, "Created generated AvailabilityPolicy");
                    created.push(PolicySummary::from(&p));
                }
                Err(e) => {
                    tracing::warn!(policy = %plan.policy_name, error = %e, "Failed to create generated policy");
                    errors.push(json!({"policy": plan.policy_name, "error": e.to_string()}));
                }
            }
        }
    }

    let message = if candidates.is_empty() {
        "No deployments eligible for policy generation".to_string()
    } else if params.dry_run {
        format!("{} policy(ies) would be created", plans.len())
    } else {
        format!("{} policy(ies) created", created.len())
    };

    Ok(ToolOutput::json(&json!({
        "mode": "intelligent",
        "namespace": namespace,
        "group_by": group_by,
        "dry_run": params.dry_run,
        "analyzed_deployments": candidates.len(),
        "groups_found": total_groups,
        "plans": plans,
        "created": created,
        "errors": errors,
        "message": message,
    })))
}

/// Filter by target and exclude lists. Single-replica deployments are only
/// kept when explicitly targeted.
pub fn select_candidates<'a>(
    deployments: &'a [Deployment],
    targets: &[String],
    excludes: &[String],
) -> Vec<&'a Deployment> {
    deployments
        .iter()
        .filter(|d| {
            let name = workload::name(d);
            let targeted = targets.iter().any(|t| t == name);
            if !targets.is_empty() && !targeted {
                return false;
            }
            if excludes.iter().any(|e| e == name) {
                return false;
            }
            targeted || workload::replicas(d) > 1
        })
        .collect()
}

/// Group name for a deployment under `auto` grouping.
pub fn auto_group(deployment: &Deployment) -> &'static str {
    let rules: [(&[&str], &str); 7] = [
        (&["auth", "security"], "security"),
        (&["db", "database", "postgres", "mysql"], "database"),
        (&["frontend", "ui", "web"], "frontend"),
        (&["api", "gateway"], "api-gateway"),
        (&["backend", "service"], "backend"),
        (&["payment", "billing"], "financial"),
        (&["batch", "worker", "job"], "batch"),
    ];
    rules
        .iter()
        .find(|(patterns, _)| workload::name_contains_any(deployment, patterns))
        .map(|(_, group)| *group)
        .unwrap_or("general")
}

fn group_key(deployment: &Deployment, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Auto => auto_group(deployment).to_string(),
        GroupBy::Class => {
            let class = workload::class_annotation(deployment);
            let group = if class.is_empty() { "unclassified" } else { class };
            group.to_string()
        }
        GroupBy::Tier => workload::tier(deployment).unwrap_or("untiered").to_string(),
        GroupBy::Component => workload::component_label(deployment)
            .unwrap_or("unlabeled")
            .to_string(),
    }
}

pub fn plan_policies(candidates: &[&Deployment], group_by: GroupBy, prefix: &str) -> Vec<PolicyPlan> {
    let mut groups: BTreeMap<String, Vec<&Deployment>> = BTreeMap::new();
    for d in candidates {
        groups.entry(group_key(d, group_by)).or_default().push(*d);
    }

    groups
        .into_iter()
        .map(|(group, members)| {
            let average_replicas = members.iter().map(|d| workload::replicas(d) as f64).sum::<f64>()
                / members.len() as f64;
            let detected_class = detect_class(&group, &members, average_replicas);

            let labels = common_labels(&members);
            let component_selector = if labels.is_empty() {
                ComponentSelector {
                    component_names: members.iter().map(|d| workload::name(d).to_string()).collect(),
                    ..Default::default()
                }
            } else {
                ComponentSelector {
                    match_labels: labels,
                    ..Default::default()
                }
            };

            PolicyPlan {
                policy_name: format!("{}-{}-policy", prefix, dns_label(&group)),
                deployments: members.iter().map(|d| workload::name(d).to_string()).collect(),
                average_replicas: crate::domain::round2(average_replicas),
                detected_class,
                priority: detected_class.default_priority(),
                component_selector,
                group,
            }
        })
        .collect()
}

const CRITICAL_MARKERS: [&str; 3] = ["critical", "auth", "payment"];
const PRODUCTION_MARKERS: [&str; 2] = ["prod", "production"];

/// Class for a group from its markers and average replica count.
pub fn detect_class(group: &str, members: &[&Deployment], average_replicas: f64) -> AvailabilityClass {
    let mut haystack = vec![group.to_lowercase()];
    for d in members {
        haystack.push(workload::name(d).to_lowercase());
        haystack.push(workload::namespace(d).to_lowercase());
        haystack.extend(workload::labels(d).values().map(|v| v.to_lowercase()));
    }
    let has = |markers: &[&str]| haystack.iter().any(|h| markers.iter().any(|m| h.contains(m)));

    if has(&CRITICAL_MARKERS) || average_replicas >= 5.0 {
        AvailabilityClass::MissionCritical
    } else if has(&PRODUCTION_MARKERS) || average_replicas >= 3.0 {
        AvailabilityClass::HighAvailability
    } else if average_replicas >= 2.0 {
        AvailabilityClass::Standard
    } else {
        AvailabilityClass::NonCritical
    }
}

/// Lower-case DNS label from arbitrary text.
fn dns_label(raw: &str) -> String {
    let mapped: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = mapped.trim_matches('-');
    if trimmed.is_empty() {
        "group".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// update_deployment_annotations
// ============================================================================

/// Validate an annotation in the ODA namespace. Other keys pass through.
pub fn validate_annotation(key: &str, value: &str) -> Result<(), String> {
    if !key.starts_with(ODA_ANNOTATION_PREFIX) {
        return Ok(());
    }
    match key {
        AVAILABILITY_CLASS_ANNOTATION => value.parse::<AvailabilityClass>().map(|_| ()),
        COMPONENT_FUNCTION_ANNOTATION => value.parse::<ComponentFunction>().map(|_| ()),
        _ => Ok(()),
    }
}

async fn update_deployment_annotations(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: AnnotateParams = parse_args(params)?;
    let name = params.name.trim();
    let namespace = params.namespace.trim();
    if name.is_empty() || namespace.is_empty() {
        return Err(ToolError::Validation("name and namespace are required".to_string()));
    }
    for (key, value) in &params.annotations {
        validate_annotation(key, value).map_err(ToolError::Validation)?;
    }

    let mut deployment = cluster
        .get_deployment(namespace, name)
        .await?
        .ok_or_else(|| ToolError::from(ClusterError::not_found("Deployment", namespace, name)))?;

    let annotations = deployment.metadata.annotations.get_or_insert_with(BTreeMap::new);
    for (key, value) in &params.annotations {
        annotations.insert(key.clone(), value.clone());
    }
    let mut removed = Vec::new();
    for key in &params.remove_annotations {
        if annotations.remove(key).is_some() {
            removed.push(key.clone());
        }
    }

    let updated = cluster.update_deployment(&deployment).await?;
    tracing::info!(
        deployment = %workload::key(&updated),
        added = params.annotations.len(),
        removed = removed.len(),
        "Updated deployment annotations"
    );

    Ok(ToolOutput::json(&json!({
        "updated": true,
        "name": name,
        "namespace": namespace,
        "added": params.annotations,
        "removed": removed,
        "annotations": workload::annotations(&updated),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::DeploymentFixture;
    use crate::cluster::{ClusterApi, InMemoryCluster};
    use std::sync::Arc;

    fn json_of(output: ToolOutput) -> Value {
        match output {
            ToolOutput::Json(v) => v,
            other => panic!("expected json output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_direct_create_then_duplicate_fails() {
        let memory = Arc::new(InMemoryCluster::new());
        let cluster: SharedCluster = memory.clone();
        let params = json!({
            "name": "checkout",
            "namespace": "shop",
            "availability_class": "high-availability",
            "component_selector": {"component_names": ["checkout"]}
        });

        let out = json_of(create_availability_policy(cluster.clone(), params.clone()).await.unwrap());
        assert_eq!(out["created"]["priority"], 500);
        assert_eq!(out["created"]["enforcement"], "strict");

        let stored = memory.get_policy("shop", "checkout").await.unwrap().unwrap();
        assert_eq!(stored.spec.component_selector.component_names, vec!["checkout"]);

        let err = create_availability_policy(cluster, params).await.unwrap_err();
        assert!(matches!(err, ToolError::Cluster(ref e) if e.is_conflict()));
    }

    #[tokio::test]
    async fn test_custom_class_requires_config() {
        let cluster: SharedCluster = Arc::new(InMemoryCluster::new());
        let err = create_availability_policy(
            cluster.clone(),
            json!({"name": "c", "namespace": "ns", "availability_class": "custom"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));

        let ok = create_availability_policy(
            cluster,
            json!({
                "name": "c",
                "namespace": "ns",
                "availability_class": "custom",
                "custom_pdb_config": {"min_available": 2},
                "dry_run": true
            }),
        )
        .await
        .unwrap();
        assert_eq!(json_of(ok)["dry_run"], true);
    }

    #[tokio::test]
    async fn test_intelligent_dry_run_groups_by_name() {
        let cluster: SharedCluster = Arc::new(
            InMemoryCluster::new()
                .with_deployment(DeploymentFixture::new("shop", "auth-service", 3).build())
                .with_deployment(DeploymentFixture::new("shop", "orders-db", 2).build())
                .with_deployment(DeploymentFixture::new("shop", "cron-job", 1).build()),
        );

        let out = json_of(
            create_availability_policy(
                cluster.clone(),
                json!({"namespace": "shop", "auto_detect": true, "create_multiple": true, "dry_run": true}),
            )
            .await
            .unwrap(),
        );

        assert_eq!(out["analyzed_deployments"], 2);
        let plans = out["plans"].as_array().unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0]["group"], "database");
        assert_eq!(plans[0]["detected_class"], "standard");
        assert_eq!(plans[1]["group"], "security");
        assert_eq!(plans[1]["detected_class"], "mission-critical");
        assert_eq!(plans[1]["policy_name"], "auto-security-policy");
        assert!(cluster.list_policies(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_intelligent_creates_first_group_only_by_default() {
        let cluster: SharedCluster = Arc::new(
            InMemoryCluster::new()
                .with_deployment(DeploymentFixture::new("shop", "web", 2).label("team", "storefront").build())
                .with_deployment(DeploymentFixture::new("shop", "api", 2).build()),
        );

        let out = json_of(
            create_availability_policy(cluster.clone(), json!({"namespace": "shop", "group_by": "auto"}))
                .await
                .unwrap(),
        );
        assert_eq!(out["groups_found"], 2);
        assert_eq!(out["created"].as_array().unwrap().len(), 1);

        let policies = cluster.list_policies(Some("shop")).await.unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].metadata.name.as_deref(), Some("auto-api-gateway-policy"));
    }

    #[test]
    fn test_select_candidates_and_selector_fallback() {
        let deployments = vec![
            DeploymentFixture::new("ns", "single", 1).build(),
            DeploymentFixture::new("ns", "pair", 2).label("team", "a").build(),
            DeploymentFixture::new("ns", "skip", 2).build(),
        ];
        let picked = select_candidates(&deployments, &[], &["skip".to_string()]);
        assert_eq!(picked.len(), 1);

        let targeted = select_candidates(&deployments, &["single".to_string()], &[]);
        assert_eq!(targeted.len(), 1);

        let plans = plan_policies(&picked, GroupBy::Tier, "auto");
        assert_eq!(plans[0].group, "untiered");
        assert_eq!(plans[0].component_selector.match_labels.get("team").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_detect_class_markers() {
        let d = DeploymentFixture::new("ns", "x", 2).build();
        assert_eq!(detect_class("payment", &[&d], 2.0), AvailabilityClass::MissionCritical);
        assert_eq!(detect_class("general", &[&d], 6.0), AvailabilityClass::MissionCritical);
        assert_eq!(detect_class("general", &[&d], 3.0), AvailabilityClass::HighAvailability);
        assert_eq!(detect_class("general", &[&d], 1.0), AvailabilityClass::NonCritical);

        let prod = DeploymentFixture::new("production", "x", 2).build();
        assert_eq!(detect_class("general", &[&prod], 2.0), AvailabilityClass::HighAvailability);
    }

    #[tokio::test]
    async fn test_update_annotations_validates_oda_keys() {
        let memory = Arc::new(
            InMemoryCluster::new().with_deployment(
                DeploymentFixture::new("prod", "api", 2)
                    .annotation("owner", "team-a")
                    .build(),
            ),
        );
        let cluster: SharedCluster = memory.clone();

        let err = update_deployment_annotations(
            cluster.clone(),
            json!({
                "name": "api",
                "namespace": "prod",
                "annotations": {AVAILABILITY_CLASS_ANNOTATION: "ultra"}
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));

        let out = json_of(
            update_deployment_annotations(
                cluster.clone(),
                json!({
                    "name": "api",
                    "namespace": "prod",
                    "annotations": {
                        AVAILABILITY_CLASS_ANNOTATION: "high-availability",
                        COMPONENT_FUNCTION_ANNOTATION: "core"
                    },
                    "remove_annotations": ["owner", "missing"]
                }),
            )
            .await
            .unwrap(),
        );
        assert_eq!(out["removed"], json!(["owner"]));

        let stored = memory.get_deployment("prod", "api").await.unwrap().unwrap();
        assert_eq!(
            workload::availability_class(&stored),
            Some(AvailabilityClass::HighAvailability)
        );
        assert!(!workload::annotations(&stored).contains_key("owner"));

        let missing = update_deployment_annotations(cluster, json!({"name": "ghost", "namespace": "prod"}))
            .await
            .unwrap_err();
        assert!(matches!(missing, ToolError::Cluster(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_list_policies_sorted() {
        let cluster: SharedCluster = Arc::new(
            InMemoryCluster::new()
                .with_policy(AvailabilityPolicy::namespaced(
                    "b",
                    "z",
                    AvailabilityPolicySpec::new(AvailabilityClass::Standard),
                ))
                .with_policy(AvailabilityPolicy::namespaced(
                    "a",
                    "y",
                    AvailabilityPolicySpec::new(AvailabilityClass::MissionCritical),
                )),
        );
        let out = json_of(list_availability_policies(cluster, Value::Null).await.unwrap());
        assert_eq!(out["total"], 2);
        assert_eq!(out["policies"][0]["namespace"], "a");
        assert_eq!(out["by_class"]["standard"], 1);
    }
}
