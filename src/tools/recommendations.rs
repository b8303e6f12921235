//! `recommend_availability_classes`: heuristic class scoring.
//!
//! Each deployment is scored on up to six factors. A factor only counts
//! when it matches; the class comes from the average of the matched factor
//! scores and the confidence from how many factors matched.

use super::{parse_args, scope};
use crate::cluster::SharedCluster;
use crate::domain::workload;
use crate::domain::{round2, AvailabilityClass};
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const TOOL_NAME: &str = "recommend_availability_classes";

const FACTOR_COUNT: usize = 6;

const DATABASE_PATTERNS: [&str; 7] = ["db", "database", "postgres", "mysql", "redis", "mongo", "cassandra"];
const API_PATTERNS: [&str; 2] = ["api", "gateway"];

#[derive(Debug, Default, Deserialize)]
struct RecommendParams {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassRecommendation {
    pub name: String,
    pub namespace: String,
    pub current_class: Option<String>,
    pub recommended_class: AvailabilityClass,
    pub score: f64,
    pub confidence: f64,
    pub needs_change: bool,
    pub reasons: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationReport {
    pub total_deployments: usize,
    pub changes_recommended: usize,
    pub by_class: BTreeMap<String, usize>,
    pub recommendations: Vec<ClassRecommendation>,
}

/// Matched factor scores with their explanations.
#[derive(Debug, Default)]
struct Factors {
    scores: Vec<f64>,
    reasons: Vec<String>,
}

impl Factors {
    fn matched(&mut self, score: f64, reason: String) {
        self.scores.push(score);
        self.reasons.push(reason);
    }

    fn average(&self) -> f64 {
        if self.scores.is_empty() {
            0.0
        } else {
            self.scores.iter().sum::<f64>() / self.scores.len() as f64
        }
    }

    fn confidence(&self) -> f64 {
        self.scores.len() as f64 / FACTOR_COUNT as f64
    }
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    registry.register_tool(
        ToolBuilder::new(TOOL_NAME)
            .description("Recommend availability classes for deployments from workload characteristics")
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
                async move { recommend_availability_classes(cluster, params).await }
            }),
    )
}

async fn recommend_availability_classes(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: RecommendParams = parse_args(params)?;
    let deployments = cluster.list_deployments(scope(&params.namespace)).await?;
    Ok(ToolOutput::json(&recommend(&deployments)))
}

pub fn recommend(deployments: &[Deployment]) -> RecommendationReport {
    let mut recommendations: Vec<ClassRecommendation> = deployments.iter().map(recommend_one).collect();
    recommendations.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.namespace.cmp(&b.namespace))
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut by_class = BTreeMap::new();
    for rec in &recommendations {
        *by_class.entry(rec.recommended_class.to_string()).or_insert(0) += 1;
    }

    RecommendationReport {
        total_deployments: recommendations.len(),
        changes_recommended: recommendations.iter().filter(|r| r.needs_change).count(),
        by_class,
        recommendations,
    }
}

fn recommend_one(deployment: &Deployment) -> ClassRecommendation {
    let factors = score(deployment);
    let average = factors.average();
    let recommended = class_for_score(average);
    let current = workload::class_annotation(deployment);

    ClassRecommendation {
        name: workload::name(deployment).to_string(),
        namespace: workload::namespace(deployment).to_string(),
        current_class: (!current.is_empty()).then(|| current.to_string()),
        recommended_class: recommended,
        score: round2(average),
        confidence: round2(factors.confidence()),
        needs_change: current != recommended.as_str(),
        reasons: factors.reasons,
    }
}

/// Class for an average factor score.
pub fn class_for_score(score: f64) -> AvailabilityClass {
    if score >= 2.5 {
        AvailabilityClass::MissionCritical
    } else if score >= 1.8 {
        AvailabilityClass::HighAvailability
    } else if score >= 1.0 {
        AvailabilityClass::Standard
    } else {
        AvailabilityClass::NonCritical
    }
}

fn score(deployment: &Deployment) -> Factors {
    let mut factors = Factors::default();
    let name = workload::name(deployment).to_lowercase();
    let namespace = workload::namespace(deployment).to_lowercase();

    let function = workload::function_annotation(deployment).to_lowercase();
    let function_score = match function.as_str() {
        "security" | "database" => Some(3.0),
        "core" => Some(2.0),
        "management" => Some(1.5),
        _ => None,
    };
    if let Some(s) = function_score {
        factors.matched(s, format!("component function '{}'", function));
    }

    let replicas = workload::replicas(deployment);
    let replica_score = match replicas {
        r if r >= 5 => Some(3.0),
        r if r >= 3 => Some(2.0),
        2 => Some(1.5),
        1 => Some(0.5),
        _ => None,
    };
    if let Some(s) = replica_score {
        factors.matched(s, format!("{} replicas", replicas));
    }

    let environment = [&name, &namespace].iter().find_map(|s| {
        if s.contains("prod") {
            Some((2.5, "production"))
        } else if s.contains("staging") || s.contains("stage") {
            Some((1.5, "staging"))
        } else if s.contains("dev") || s.contains("test") {
            Some((0.5, "development"))
        } else {
            None
        }
    });
    if let Some((s, env)) = environment {
        factors.matched(s, format!("{} environment naming", env));
    }

    if let Some(tier) = workload::tier(deployment) {
        let tier_score = match tier.to_lowercase().as_str() {
            "critical" => Some(3.0),
            "gold" => Some(2.5),
            "standard" | "silver" => Some(1.5),
            "bronze" => Some(0.5),
            _ => None,
        };
        if let Some(s) = tier_score {
            factors.matched(s, format!("tier label '{}'", tier));
        }
    }

    if API_PATTERNS.iter().any(|p| name.contains(p)) {
        factors.matched(2.5, "API or gateway workload".to_string());
    }

    if DATABASE_PATTERNS.iter().any(|p| name.contains(p)) {
        factors.matched(3.0, "database workload".to_string());
    }

    factors
}
