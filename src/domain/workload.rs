//! Read-only views over Kubernetes workload objects.

use super::class::{
    AvailabilityClass, ComponentFunction, AVAILABILITY_CLASS_ANNOTATION,
    COMPONENT_FUNCTION_ANNOTATION,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use std::collections::BTreeMap;

/// Label used for tier grouping and scoring.
pub const TIER_LABEL: &str = "tier";

/// Labels consulted, in order, for the component name.
pub const COMPONENT_LABELS: [&str; 2] = ["component", "app.kubernetes.io/component"];

static EMPTY: BTreeMap<String, String> = BTreeMap::new();

pub fn name(d: &Deployment) -> &str {
    d.metadata.name.as_deref().unwrap_or_default()
}

pub fn namespace(d: &Deployment) -> &str {
    d.metadata.namespace.as_deref().unwrap_or_default()
}

/// `namespace/name`.
pub fn key(d: &Deployment) -> String {
    format!("{}/{}", namespace(d), name(d))
}

/// Desired replicas, defaulting to 1 like the API server does.
pub fn replicas(d: &Deployment) -> i32 {
    d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
}

pub fn labels(d: &Deployment) -> &BTreeMap<String, String> {
    d.metadata.labels.as_ref().unwrap_or(&EMPTY)
}

pub fn annotations(d: &Deployment) -> &BTreeMap<String, String> {
    d.metadata.annotations.as_ref().unwrap_or(&EMPTY)
}

/// `match_labels` of the deployment's pod selector.
pub fn selector_labels(d: &Deployment) -> &BTreeMap<String, String> {
    d.spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.as_ref())
        .unwrap_or(&EMPTY)
}

/// Raw availability-class annotation, empty when absent.
pub fn class_annotation(d: &Deployment) -> &str {
    annotations(d)
        .get(AVAILABILITY_CLASS_ANNOTATION)
        .map(String::as_str)
        .unwrap_or_default()
}

/// Parsed availability class, `None` when absent or unparsable.
pub fn availability_class(d: &Deployment) -> Option<AvailabilityClass> {
    class_annotation(d).parse().ok()
}

/// Raw component-function annotation, empty when absent.
pub fn function_annotation(d: &Deployment) -> &str {
    annotations(d)
        .get(COMPONENT_FUNCTION_ANNOTATION)
        .map(String::as_str)
        .unwrap_or_default()
}

pub fn component_function(d: &Deployment) -> Option<ComponentFunction> {
    function_annotation(d).parse().ok()
}

pub fn tier(d: &Deployment) -> Option<&str> {
    labels(d).get(TIER_LABEL).map(String::as_str)
}

pub fn component_label(d: &Deployment) -> Option<&str> {
    COMPONENT_LABELS
        .iter()
        .find_map(|k| labels(d).get(*k))
        .map(String::as_str)
}

fn containers(d: &Deployment) -> &[Container] {
    d.spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| p.containers.as_slice())
        .unwrap_or_default()
}

/// Pod template declares required or preferred pod anti-affinity.
pub fn has_anti_affinity(d: &Deployment) -> bool {
    d.spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.affinity.as_ref())
        .and_then(|a| a.pod_anti_affinity.as_ref())
        .is_some_and(|anti| {
            anti.required_during_scheduling_ignored_during_execution
                .as_ref()
                .is_some_and(|r| !r.is_empty())
                || anti
                    .preferred_during_scheduling_ignored_during_execution
                    .as_ref()
                    .is_some_and(|p| !p.is_empty())
        })
}

/// Some container lacks CPU or memory requests.
pub fn missing_requests(d: &Deployment) -> bool {
    let containers = containers(d);
    !containers.is_empty()
        && containers.iter().any(|c| {
            let requests = c.resources.as_ref().and_then(|r| r.requests.as_ref());
            !requests.is_some_and(|r| r.contains_key("cpu") && r.contains_key("memory"))
        })
}

/// Some container lacks CPU or memory limits.
pub fn missing_limits(d: &Deployment) -> bool {
    let containers = containers(d);
    !containers.is_empty()
        && containers.iter().any(|c| {
            let limits = c.resources.as_ref().and_then(|r| r.limits.as_ref());
            !limits.is_some_and(|l| l.contains_key("cpu") && l.contains_key("memory"))
        })
}

/// Lower-cased name with any matching substring from `patterns`.
pub fn name_contains_any(d: &Deployment, patterns: &[&str]) -> bool {
    let lower = name(d).to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}
