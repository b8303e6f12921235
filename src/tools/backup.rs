//! `backup_policies` and `restore_policies`.
//!
//! Backups are a self-describing envelope:
//!
//! ```text
//! metadata:
//!   created_at, version, cluster_info{server_version, nodes, namespaces},
//!   backup_stats{policies_count, deployments_count, pdbs_count, namespaces_count, size_bytes}
//! availabilityPolicies: [...]
//! deployments: [...]            # include_deployments
//! podDisruptionBudgets: [...]   # include_pdbs
//! ```
//!
//! Restore reads the `availabilityPolicies` list from either JSON or YAML
//! and ignores the rest.

use super::parse_args;
use crate::cluster::SharedCluster;
use crate::domain::policy::POLICY_VERSION;
use crate::domain::AvailabilityPolicy;
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

pub const BACKUP_TOOL: &str = "backup_policies";
pub const RESTORE_TOOL: &str = "restore_policies";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    #[default]
    Skip,
    Overwrite,
    Merge,
}

#[derive(Debug, Default, Deserialize)]
struct BackupParams {
    #[serde(default)]
    namespaces: Vec<String>,
    #[serde(default)]
    include_deployments: bool,
    #[serde(default)]
    include_pdbs: bool,
    #[serde(default)]
    format: BackupFormat,
}

#[derive(Debug, Deserialize)]
struct RestoreParams {
    backup_data: Value,
    #[serde(default)]
    target_namespaces: Vec<String>,
    #[serde(default)]
    overwrite_mode: OverwriteMode,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct BackupEnvelope {
    pub metadata: BackupMetadata,
    #[serde(rename = "availabilityPolicies")]
    pub availability_policies: Vec<AvailabilityPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployments: Option<Vec<Deployment>>,
    #[serde(rename = "podDisruptionBudgets", skip_serializing_if = "Option::is_none")]
    pub pod_disruption_budgets: Option<Vec<PodDisruptionBudget>>,
}

#[derive(Debug, Serialize)]
pub struct BackupMetadata {
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub cluster_info: ClusterInfo,
    pub backup_stats: BackupStats,
}

#[derive(Debug, Serialize)]
pub struct ClusterInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    pub namespaces: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BackupStats {
    pub policies_count: usize,
    pub deployments_count: usize,
    pub pdbs_count: usize,
    pub namespaces_count: usize,
    pub size_bytes: usize,
}

/// The part of an envelope restore needs.
#[derive(Debug, Deserialize)]
struct RestoreEnvelope {
    #[serde(rename = "availabilityPolicies", default)]
    availability_policies: Vec<AvailabilityPolicy>,
}

#[derive(Debug, Serialize)]
pub struct RestoreEntry {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct RestoreSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct RestoreResult {
    pub created: Vec<RestoreEntry>,
    pub updated: Vec<RestoreEntry>,
    pub skipped: Vec<RestoreEntry>,
    pub errors: Vec<RestoreEntry>,
    pub summary: RestoreSummary,
    pub overwrite_mode: OverwriteMode,
    pub dry_run: bool,
    pub duration_ms: u64,
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    let backup_cluster = cluster.clone();
    registry.register_tool(
        ToolBuilder::new(BACKUP_TOOL)
            .description("Back up AvailabilityPolicies, optionally with deployments and PDBs")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "namespaces": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Namespaces to back up (all namespaces if empty)"
                    },
                    "include_deployments": {"type": "boolean", "default": false},
                    "include_pdbs": {"type": "boolean", "default": false},
                    "format": {"type": "string", "enum": ["json", "yaml"], "default": "json"}
                }
            }))
            .build(move |_ctx, params| {
                let cluster = backup_cluster.clone();
                async move { backup_policies(cluster, params).await }
            }),
    )?;

    registry.register_tool(
        ToolBuilder::new(RESTORE_TOOL)
            .description("Restore AvailabilityPolicies from a backup envelope")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "backup_data": {
                        "description": "Backup envelope as JSON/YAML text or a JSON object"
                    },
                    "target_namespaces": {"type": "array", "items": {"type": "string"}},
                    "overwrite_mode": {
                        "type": "string",
                        "enum": ["skip", "overwrite", "merge"],
                        "default": "skip"
                    },
                    "dry_run": {"type": "boolean", "default": false}
                },
                "required": ["backup_data"]
            }))
            .build(move |_ctx, params| {
                let cluster = cluster.clone();
                async move { restore_policies(cluster, params).await }
            }),
    )
}

// ============================================================================
// Backup
// ============================================================================

async fn backup_policies(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: BackupParams = parse_args(params)?;

    let scopes: Vec<Option<&str>> = if params.namespaces.is_empty() {
        vec![None]
    } else {
        params.namespaces.iter().map(|ns| Some(ns.as_str())).collect()
    };

    let mut policies = Vec::new();
    let mut deployments = Vec::new();
    let mut pdbs = Vec::new();
    for ns in &scopes {
        policies.extend(cluster.list_policies(*ns).await?);
        if params.include_deployments {
            deployments.extend(cluster.list_deployments(*ns).await?);
        }
        if params.include_pdbs {
            pdbs.extend(cluster.list_pdbs(*ns).await?);
        }
    }
    policies.sort_by(|a, b| {
        (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name))
    });

    let namespaces = if params.namespaces.is_empty() {
        cluster.list_namespaces().await?
    } else {
        params.namespaces.clone()
    };
    let cluster_info = ClusterInfo {
        server_version: cluster.server_version().await.ok(),
        nodes: cluster.list_nodes().await.ok().map(|n| n.len()),
        namespaces,
    };

    let envelope = BackupEnvelope {
        metadata: BackupMetadata {
            created_at: Utc::now(),
            version: POLICY_VERSION.to_string(),
            backup_stats: BackupStats {
                policies_count: policies.len(),
                deployments_count: deployments.len(),
                pdbs_count: pdbs.len(),
                namespaces_count: cluster_info.namespaces.len(),
                size_bytes: 0,
            },
            cluster_info,
        },
        availability_policies: policies,
        deployments: params.include_deployments.then_some(deployments),
        pod_disruption_budgets: params.include_pdbs.then_some(pdbs),
    };

    let text = render(envelope, params.format)?;
    tracing::info!(bytes = text.len(), format = ?params.format, "Created policy backup");
    Ok(ToolOutput::text(text))
}

/// Serialize the envelope, recording the size of the otherwise complete
/// document in `backup_stats.size_bytes`.
pub fn render(mut envelope: BackupEnvelope, format: BackupFormat) -> Result<String, ToolError> {
    let encode = |envelope: &BackupEnvelope| -> Result<String, ToolError> {
        match format {
            BackupFormat::Json => serde_json::to_string_pretty(envelope)
                .map_err(|e| ToolError::Serialization(e.to_string())),
            BackupFormat::Yaml => {
                serde_yaml::to_string(envelope).map_err(|e| ToolError::Serialization(e.to_string()))
            }
        }
    };
    envelope.metadata.backup_stats.size_bytes = encode(&envelope)?.len();
    encode(&envelope)
}

// ============================================================================
// Restore
// ============================================================================

/// Parse backup data given as an object, or as JSON or YAML text.
fn parse_backup(data: Value) -> Result<Vec<AvailabilityPolicy>, ToolError> {
    let envelope: RestoreEnvelope = match data {
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(json_err) => serde_yaml::from_str(&text).map_err(|yaml_err| {
                ToolError::InvalidParams(format!(
                    "backup_data is neither JSON ({}) nor YAML ({})",
                    json_err, yaml_err
                ))
            })?,
        },
        Value::Object(_) => serde_json::from_value(data)
            .map_err(|e| ToolError::InvalidParams(format!("invalid backup_data: {}", e)))?,
        _ => {
            return Err(ToolError::InvalidParams(
                "backup_data must be an object or a string".to_string(),
            ))
        }
    };
    Ok(envelope.availability_policies)
}

async fn restore_policies(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: RestoreParams = parse_args(params)?;
    let started = Instant::now();
    let policies = parse_backup(params.backup_data)?;

    let mut result = RestoreResult {
        overwrite_mode: params.overwrite_mode,
        dry_run: params.dry_run,
        ..Default::default()
    };

    for mut policy in policies {
        let namespace = policy.metadata.namespace.clone().unwrap_or_default();
        let name = policy.metadata.name.clone().unwrap_or_default();
        if !params.target_namespaces.is_empty() && !params.target_namespaces.contains(&namespace) {
            continue;
        }
        result.summary.total += 1;
        let entry = |reason: Option<String>, error: Option<String>| RestoreEntry {
            name: name.clone(),
            namespace: namespace.clone(),
            reason,
            error,
        };
        if name.is_empty() || namespace.is_empty() {
            result.errors.push(entry(None, Some("policy is missing name or namespace".to_string())));
            continue;
        }

        policy.clear_server_fields();
        let existing = match cluster.get_policy(&namespace, &name).await {
            Ok(existing) => existing,
            Err(e) => {
                result.errors.push(entry(None, Some(e.to_string())));
                continue;
            }
        };

        let Some(existing) = existing else {
            let outcome = if params.dry_run {
                Ok(())
            } else {
                cluster.create_policy(&policy).await.map(|_| ())
            };
            match outcome {
                Ok(()) => result.created.push(entry(None, None)),
                Err(e) => result.errors.push(entry(None, Some(e.to_string()))),
            }
            continue;
        };

        let replacement = match params.overwrite_mode {
            OverwriteMode::Skip => {
                result
                    .skipped
                    .push(entry(Some("policy already exists".to_string()), None));
                continue;
            }
            OverwriteMode::Overwrite => {
                policy.metadata.resource_version = existing.metadata.resource_version.clone();
                policy
            }
            OverwriteMode::Merge => {
                let mut merged = existing;
                merged.spec = policy.spec;
                merged.status = None;
                merged
            }
        };

        let outcome = if params.dry_run {
            Ok(())
        } else {
            cluster.update_policy(&replacement).await.map(|_| ())
        };
        match outcome {
            Ok(()) => result.updated.push(entry(None, None)),
            Err(e) => result.errors.push(entry(None, Some(e.to_string()))),
        }
    }

    result.summary.created = result.created.len();
    result.summary.updated = result.updated.len();
    result.summary.skipped = result.skipped.len();
    result.summary.errors = result.errors.len();
    result.duration_ms = started.elapsed().as_millis() as u64;

    tracing::info!(
        created = result.summary.created,
        updated = result.summary.updated,
        skipped = result.summary.skipped,
        errors = result.summary.errors,
        dry_run = result.dry_run,
        "Restored policies"
    );
    Ok(ToolOutput::json(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::{pdb, DeploymentFixture};
    use crate::cluster::{ClusterApi, InMemoryCluster};
    use crate::domain::{AvailabilityClass, AvailabilityPolicySpec};
    use std::sync::Arc;

    fn seeded() -> Arc<InMemoryCluster> {
        let mut labelled = AvailabilityPolicy::namespaced(
            "shop",
            "web",
            AvailabilityPolicySpec::new(AvailabilityClass::Standard),
        );
        labelled.metadata.labels = Some([("owner".to_string(), "team-a".to_string())].into());
        Arc::new(
            InMemoryCluster::new()
                .with_node("node-1")
                .with_policy(labelled)
                .with_policy(AvailabilityPolicy::namespaced(
                    "core",
                    "auth",
                    AvailabilityPolicySpec::new(AvailabilityClass::MissionCritical),
                ))
                .with_deployment(DeploymentFixture::new("shop", "web", 2).build())
                .with_pdb(pdb("shop", "web-pdb", None, None, &[])),
        )
    }

    fn text_of(output: ToolOutput) -> String {
        match output {
            ToolOutput::Text(t) => t,
            other => panic!("expected text output, got {:?}", other),
        }
    }

    fn json_of(output: ToolOutput) -> Value {
        match output {
            ToolOutput::Json(v) => v,
            other => panic!("expected json output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backup_envelope_is_sorted_and_sized() {
        let cluster: SharedCluster = seeded();
        let text = text_of(
            backup_policies(cluster, json!({"include_pdbs": true}))
                .await
                .unwrap(),
        );
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["metadata"]["version"], "v1alpha1");
        assert_eq!(doc["metadata"]["cluster_info"]["nodes"], 1);
        assert_eq!(doc["metadata"]["backup_stats"]["policies_count"], 2);
        assert_eq!(doc["metadata"]["backup_stats"]["pdbs_count"], 1);
        assert!(doc["metadata"]["backup_stats"]["size_bytes"].as_u64().unwrap() > 0);
        assert_eq!(doc["availabilityPolicies"][0]["metadata"]["namespace"], "core");
        assert!(doc.get("deployments").is_none());
        assert_eq!(doc["podDisruptionBudgets"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backup_rejects_unknown_format() {
        let cluster: SharedCluster = seeded();
        let err = backup_policies(cluster, json!({"format": "xml"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn test_dry_run_skip_round_trip() {
        let cluster: SharedCluster = seeded();
        let backup = text_of(backup_policies(cluster.clone(), Value::Null).await.unwrap());

        let out = json_of(
            restore_policies(
                cluster,
                json!({"backup_data": backup, "overwrite_mode": "skip", "dry_run": true}),
            )
            .await
            .unwrap(),
        );
        assert_eq!(out["summary"]["created"], 0);
        assert_eq!(out["summary"]["skipped"], 2);
        assert_eq!(out["skipped"][0]["reason"], "policy already exists");
    }

    #[tokio::test]
    async fn test_restore_yaml_into_empty_cluster() {
        let source: SharedCluster = seeded();
        let backup = text_of(backup_policies(source, json!({"format": "yaml"})).await.unwrap());
        assert!(backup.contains("availabilityPolicies:"));

        let target = Arc::new(InMemoryCluster::new());
        let out = json_of(
            restore_policies(
                target.clone(),
                json!({"backup_data": backup, "target_namespaces": ["shop"]}),
            )
            .await
            .unwrap(),
        );
        assert_eq!(out["summary"]["total"], 1);
        assert_eq!(out["summary"]["created"], 1);

        let restored = target.get_policy("shop", "web").await.unwrap().unwrap();
        assert_eq!(restored.spec.availability_class, AvailabilityClass::Standard);
        assert!(target.get_policy("core", "auth").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_and_merge() {
        let memory = seeded();
        let cluster: SharedCluster = memory.clone();

        let mut changed = AvailabilityPolicy::namespaced(
            "shop",
            "web",
            AvailabilityPolicySpec::new(AvailabilityClass::HighAvailability),
        );
        changed.metadata.resource_version = Some("999".into());
        let data = json!({"availabilityPolicies": [changed]});

        let out = json_of(
            restore_policies(cluster.clone(), json!({"backup_data": data.clone(), "overwrite_mode": "merge"}))
                .await
                .unwrap(),
        );
        assert_eq!(out["summary"]["updated"], 1);
        let merged = memory.get_policy("shop", "web").await.unwrap().unwrap();
        assert_eq!(merged.spec.availability_class, AvailabilityClass::HighAvailability);
        assert_eq!(
            merged.metadata.labels.as_ref().and_then(|l| l.get("owner")).map(String::as_str),
            Some("team-a")
        );

        let out = json_of(
            restore_policies(cluster, json!({"backup_data": data, "overwrite_mode": "overwrite"}))
                .await
                .unwrap(),
        );
        assert_eq!(out["summary"]["updated"], 1);
        let overwritten = memory.get_policy("shop", "web").await.unwrap().unwrap();
        assert!(overwritten.metadata.labels.is_none());
    }

    #[tokio::test]
    async fn test_restore_rejects_garbage() {
        let cluster: SharedCluster = seeded();
        let err = restore_policies(cluster.clone(), json!({"backup_data": 42})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));

        let err = restore_policies(cluster, json!({"backup_data": "availabilityPolicies: [unclosed"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
