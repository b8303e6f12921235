//! `monitor_pdb_events`: recent disruption-related events with context.

use super::parse_args;
use crate::cluster::SharedCluster;
use crate::domain::{pdb::PdbIndex, workload};
use crate::mcp::{McpRegistry, RegistryError, ToolBuilder, ToolError, ToolOutput};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const TOOL_NAME: &str = "monitor_pdb_events";

const PDB_KIND: &str = "PodDisruptionBudget";

/// Reason/message fragments marking an event as disruption-related.
const DISRUPTION_KEYWORDS: [&str; 6] = [
    "EvictionExecutor",
    "PodDisruptionBudget",
    "Evicted",
    "Evicting",
    "EvictionThresholdMet",
    "DisruptionTarget",
];

const CRITICAL_KEYWORDS: [&str; 5] = ["Failed", "Error", "Evicted", "OutOfMemory", "DiskPressure"];

fn default_time_range() -> String {
    "24h".to_string()
}

fn default_limit() -> usize {
    100
}

fn default_event_types() -> Vec<String> {
    vec!["Warning".to_string(), "Normal".to_string()]
}

#[derive(Debug, Deserialize)]
struct MonitorParams {
    #[serde(default)]
    namespaces: Vec<String>,
    #[serde(default = "default_time_range")]
    time_range: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default = "default_event_types")]
    event_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Serialize)]
pub struct PdbStatusView {
    pub current_healthy: i32,
    pub desired_healthy: i32,
    pub disruptions_allowed: i32,
    pub expected_pods: i32,
}

#[derive(Debug, Serialize)]
pub struct PodReadiness {
    pub phase: Option<String>,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct PdbEvent {
    pub namespace: String,
    pub kind: String,
    pub object: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
    pub count: i32,
    pub last_seen: DateTime<Utc>,
    pub severity: EventSeverity,
    pub related_deployments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdb_status: Option<PdbStatusView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_status: Option<PodReadiness>,
}

#[derive(Debug, Default, Serialize)]
pub struct EventSummary {
    pub total_events: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub eviction_events: usize,
    pub pdb_events: usize,
    pub pdb_warnings: usize,
    pub by_namespace: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub priority: &'static str,
    pub message: String,
}

pub fn register_tools(registry: &McpRegistry, cluster: SharedCluster) -> Result<(), RegistryError> {
    registry.register_tool(
        ToolBuilder::new(TOOL_NAME)
            .description("Report recent PodDisruptionBudget and eviction events with recommendations")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "namespaces": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Namespaces to watch (all namespaces if empty)"
                    },
                    "time_range": {
                        "type": "string",
                        "default": "24h",
                        "description": "Look-back window such as 30m, 24h or 7d"
                    },
                    "limit": {"type": "integer", "default": 100, "minimum": 1},
                    "event_types": {
                        "type": "array",
                        "items": {"type": "string", "enum": ["Warning", "Normal"]},
                        "default": ["Warning", "Normal"]
                    }
                }
            }))
            .build(move |_ctx, params| {
                let cluster = cluster.clone();
                async move { monitor_pdb_events(cluster, params).await }
            }),
    )
}

/// Parse a look-back window: a positive integer followed by `s`, `m`, `h`
/// or `d`.
pub fn parse_time_range(raw: &str) -> Result<Duration, ToolError> {
    let raw = raw.trim();
    let invalid = || ToolError::InvalidParams(format!("invalid time_range '{}': expected e.g. 30m, 24h, 7d", raw));
    let Some((split, _)) = raw.char_indices().last() else {
        return Err(invalid());
    };
    let (amount, unit) = raw.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }
    let window = match unit {
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => None,
    };
    window.ok_or_else(invalid)
}

/// Start of the look-back window ending at `now`.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>, ToolError> {
    now.checked_sub_signed(window).ok_or_else(|| {
        ToolError::InvalidParams(format!(
            "time_range of {} days reaches before the earliest representable time",
            window.num_days()
        ))
    })
}

fn last_seen(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

fn text_of(event: &Event) -> (&str, &str) {
    (
        event.reason.as_deref().unwrap_or_default(),
        event.message.as_deref().unwrap_or_default(),
    )
}

/// Whether the event concerns disruption budgets or evictions.
pub fn is_pdb_relevant(event: &Event) -> bool {
    match event.involved_object.kind.as_deref() {
        Some(PDB_KIND) => true,
        Some("Deployment") | Some("Pod") => {
            let (reason, message) = text_of(event);
            DISRUPTION_KEYWORDS
                .iter()
                .any(|k| reason.contains(k) || message.contains(k))
        }
        _ => false,
    }
}

pub fn severity_of(event: &Event) -> EventSeverity {
    let (_, message) = text_of(event);
    if CRITICAL_KEYWORDS.iter().any(|k| message.contains(k)) {
        EventSeverity::Critical
    } else if event.type_.as_deref() == Some("Warning") {
        EventSeverity::Warning
    } else {
        EventSeverity::Info
    }
}

fn mentions_eviction(reason: &str, message: &str) -> bool {
    reason.contains("Evict") || message.contains("Evict")
}

async fn monitor_pdb_events(cluster: SharedCluster, params: Value) -> Result<ToolOutput, ToolError> {
    let params: MonitorParams = parse_args(params)?;
    let window = parse_time_range(&params.time_range)?;
    let cutoff = window_start(Utc::now(), window)?;

    let targets: Vec<Option<String>> = if params.namespaces.is_empty() {
        vec![None]
    } else {
        params.namespaces.iter().cloned().map(Some).collect()
    };

    let mut events = Vec::new();
    let mut deployments = Vec::new();
    let mut pdbs = Vec::new();
    let mut pods = Vec::new();
    for ns in &targets {
        let ns = ns.as_deref();
        events.extend(cluster.list_events(ns).await?);
        deployments.extend(cluster.list_deployments(ns).await?);
        pdbs.extend(cluster.list_pdbs(ns).await?);
        pods.extend(cluster.list_pods(ns).await?);
    }

    let report = build_report(
        &events,
        &deployments,
        &pdbs,
        &pods,
        &params.event_types,
        cutoff,
        params.limit,
    );
    tracing::debug!(
        events = report.0.len(),
        window = %params.time_range,
        "Collected PDB events"
    );

    let (events, summary, recommendations) = report;
    Ok(ToolOutput::json(&json!({
        "time_range": params.time_range,
        "since": cutoff,
        "summary": summary,
        "events": events,
        "recommendations": recommendations,
    })))
}

pub fn build_report(
    events: &[Event],
    deployments: &[Deployment],
    pdbs: &[PodDisruptionBudget],
    pods: &[Pod],
    event_types: &[String],
    cutoff: DateTime<Utc>,
    limit: usize,
) -> (Vec<PdbEvent>, EventSummary, Vec<Recommendation>) {
    let index = PdbIndex::new(pdbs);

    let mut selected: Vec<(DateTime<Utc>, &Event)> = events
        .iter()
        .filter(|e| {
            let event_type = e.type_.as_deref().unwrap_or("Normal");
            event_types.iter().any(|t| t == event_type)
        })
        .filter(|e| is_pdb_relevant(e))
        .filter_map(|e| last_seen(e).filter(|ts| *ts >= cutoff).map(|ts| (ts, e)))
        .collect();
    selected.sort_by(|a, b| b.0.cmp(&a.0));
    selected.truncate(limit);

    let rows: Vec<PdbEvent> = selected
        .into_iter()
        .map(|(ts, e)| enrich(e, ts, deployments, &index, pods))
        .collect();

    let summary = summarize(&rows);
    let recommendations = recommend(&summary);
    (rows, summary, recommendations)
}

fn enrich(
    event: &Event,
    last_seen: DateTime<Utc>,
    deployments: &[Deployment],
    index: &PdbIndex<'_>,
    pods: &[Pod],
) -> PdbEvent {
    let namespace = event
        .involved_object
        .namespace
        .clone()
        .or_else(|| event.metadata.namespace.clone())
        .unwrap_or_default();
    let kind = event.involved_object.kind.clone().unwrap_or_default();
    let object = event.involved_object.name.clone().unwrap_or_default();
    let (reason, message) = text_of(event);

    let related_deployments = deployments
        .iter()
        .filter(|d| workload::namespace(d) == namespace)
        .filter(|d| {
            let name = workload::name(d);
            match kind.as_str() {
                "Pod" => object.starts_with(&format!("{}-", name)),
                PDB_KIND => object == crate::domain::pdb::expected_pdb_name(name),
                _ => object == name,
            }
        })
        .map(|d| workload::name(d).to_string())
        .collect();

    let pdb_status = (kind == PDB_KIND)
        .then(|| index.get(&namespace, &object))
        .flatten()
        .and_then(|p| p.status.as_ref())
        .map(|s| PdbStatusView {
            current_healthy: s.current_healthy,
            desired_healthy: s.desired_healthy,
            disruptions_allowed: s.disruptions_allowed,
            expected_pods: s.expected_pods,
        });

    let pod_status = (kind == "Pod")
        .then(|| {
            pods.iter().find(|p| {
                p.metadata.namespace.as_deref() == Some(namespace.as_str())
                    && p.metadata.name.as_deref() == Some(object.as_str())
            })
        })
        .flatten()
        .map(pod_readiness);

    PdbEvent {
        severity: severity_of(event),
        event_type: event.type_.clone().unwrap_or_else(|| "Normal".to_string()),
        reason: reason.to_string(),
        message: message.to_string(),
        count: event.count.unwrap_or(1),
        last_seen,
        related_deployments,
        pdb_status,
        pod_status,
        namespace,
        kind,
        object,
    }
}

fn pod_readiness(pod: &Pod) -> PodReadiness {
    let status = pod.status.as_ref();
    let ready = status
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|cs| !cs.is_empty() && cs.iter().all(|c| c.ready));
    PodReadiness {
        phase: status.and_then(|s| s.phase.clone()),
        ready,
    }
}

fn summarize(rows: &[PdbEvent]) -> EventSummary {
    let mut summary = EventSummary {
        total_events: rows.len(),
        ..Default::default()
    };
    for row in rows {
        match row.severity {
            EventSeverity::Critical => summary.critical += 1,
            EventSeverity::Warning => summary.warning += 1,
            EventSeverity::Info => summary.info += 1,
        }
        if mentions_eviction(&row.reason, &row.message) {
            summary.eviction_events += 1;
        }
        if row.kind == PDB_KIND {
            summary.pdb_events += 1;
            if row.event_type == "Warning" {
                summary.pdb_warnings += 1;
            }
        }
        *summary.by_namespace.entry(row.namespace.clone()).or_default() += 1;
    }
    summary
}

fn recommend(summary: &EventSummary) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if summary.total_events == 0 {
        out.push(Recommendation {
            kind: "info",
            priority: "low",
            message: "No PDB-related events in the selected window; disruption budgets look healthy"
                .to_string(),
        });
        return out;
    }
    if summary.critical > 5 {
        out.push(Recommendation {
            kind: "stability",
            priority: "high",
            message: format!(
                "{} critical events detected; review workload stability and node health",
                summary.critical
            ),
        });
    }
    if summary.eviction_events > 3 {
        out.push(Recommendation {
            kind: "resource-pressure",
            priority: "medium",
            message: format!(
                "{} eviction events detected; check node resource pressure and pod requests",
                summary.eviction_events
            ),
        });
    }
    if summary.pdb_warnings > 0 {
        out.push(Recommendation {
            kind: "configuration-review",
            priority: "medium",
            message: format!(
                "{} PodDisruptionBudget warnings; review PDB settings against replica counts",
                summary.pdb_warnings
            ),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::{event, pdb, pod, DeploymentFixture};
    use crate::cluster::InMemoryCluster;
    use std::sync::Arc;

    #[test]
    fn test_parse_time_range() {
        assert_eq!(parse_time_range("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_time_range("24h").unwrap(), Duration::hours(24));
        assert_eq!(parse_time_range("7d").unwrap(), Duration::days(7));
        assert!(parse_time_range("").is_err());
        assert!(parse_time_range("h").is_err());
        assert!(parse_time_range("0h").is_err());
        assert!(parse_time_range("5w").is_err());
    }

    #[test]
    fn test_out_of_range_windows_are_invalid_params() {
        assert!(matches!(
            parse_time_range("999999999999999d"),
            Err(ToolError::InvalidParams(_))
        ));
        assert!(matches!(
            parse_time_range("9223372036854775807s"),
            Err(ToolError::InvalidParams(_))
        ));

        let window = parse_time_range("100000000d").unwrap();
        assert!(matches!(
            window_start(Utc::now(), window),
            Err(ToolError::InvalidParams(_))
        ));

        let now = Utc::now();
        assert_eq!(
            window_start(now, Duration::hours(1)).unwrap(),
            now - Duration::hours(1)
        );
    }

    #[test]
    fn test_relevance_and_severity() {
        let now = Utc::now();
        let evicted = event("prod", "Pod", "api-7d9-x", "Warning", "Evicted", "The node was low on memory", now);
        let pulled = event("prod", "Pod", "api-7d9-x", "Normal", "Pulled", "Image pulled", now);
        let budget = event("prod", PDB_KIND, "api-pdb", "Normal", "NoPods", "No matching pods", now);

        assert!(is_pdb_relevant(&evicted));
        assert!(!is_pdb_relevant(&pulled));
        assert!(is_pdb_relevant(&budget));
        assert_eq!(severity_of(&evicted), EventSeverity::Warning);
        assert_eq!(severity_of(&budget), EventSeverity::Info);
        assert!(mentions_eviction("Evicted", ""));
        assert!(!mentions_eviction("Pulled", "Image pulled"));

        let oom = event("prod", "Pod", "x", "Warning", "Evicted", "Pod Evicted: OutOfMemory", now);
        assert_eq!(severity_of(&oom), EventSeverity::Critical);
    }

    #[test]
    fn test_report_filters_sorts_and_enriches() {
        let now = Utc::now();
        let events = vec![
            event("prod", "Pod", "api-7d9-x", "Warning", "Evicted", "Pod was Evicted", now - Duration::minutes(5)),
            event("prod", PDB_KIND, "api-pdb", "Warning", "CalculateExpectedPodCountFailed", "bad selector", now - Duration::minutes(1)),
            event("prod", "Pod", "api-7d9-y", "Warning", "Evicted", "old", now - Duration::days(3)),
            event("prod", "Pod", "api-7d9-z", "Normal", "Evicting", "EvictionExecutor", now - Duration::minutes(2)),
        ];
        let deployments = vec![DeploymentFixture::new("prod", "api", 3).build()];
        let pdbs = vec![pdb("prod", "api-pdb", None, None, &[])];
        let pods = vec![pod("prod", "api-7d9-x", false)];

        let (rows, summary, recs) = build_report(
            &events,
            &deployments,
            &pdbs,
            &pods,
            &["Warning".to_string()],
            now - Duration::hours(24),
            10,
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, PDB_KIND);
        assert!(rows[0].pdb_status.is_some());
        assert_eq!(rows[0].related_deployments, vec!["api".to_string()]);

        assert_eq!(rows[1].object, "api-7d9-x");
        assert_eq!(rows[1].severity, EventSeverity::Critical);
        assert!(!rows[1].pod_status.as_ref().unwrap().ready);

        assert_eq!(summary.pdb_warnings, 1);
        assert!(recs.iter().any(|r| r.kind == "configuration-review"));
    }

    #[test]
    fn test_limit_and_empty_recommendation() {
        let now = Utc::now();
        let events: Vec<Event> = (0..5)
            .map(|i| event("ns", "Pod", &format!("w-{}", i), "Warning", "Evicted", "Evicted", now - Duration::minutes(i)))
            .collect();
        let (rows, summary, recs) = build_report(&events, &[], &[], &[], &default_event_types(), now - Duration::hours(1), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].object, "w-0");
        assert_eq!(summary.total_events, 2);
        assert!(recs.is_empty());

        let (_, _, recs) = build_report(&[], &[], &[], &[], &default_event_types(), now, 10);
        assert_eq!(recs[0].kind, "info");
    }

    #[tokio::test]
    async fn test_tool_rejects_bad_window() {
        let cluster: SharedCluster = Arc::new(InMemoryCluster::new());
        let err = monitor_pdb_events(cluster, json!({"time_range": "soon"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
    }
}
