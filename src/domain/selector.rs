//! Label-selector helpers.
//!
//! These use a *subset* heuristic, not the Kubernetes selector engine:
//! `match_expressions` are never evaluated, and an empty selector matches
//! everything.

use super::policy::{AvailabilityPolicy, AvailabilityPolicySpec, ComponentSelector};
use super::workload;
use k8s_openapi::api::apps::v1::Deployment;
use std::collections::BTreeMap;

/// Every key of `selector` is present in `labels` with an equal value.
pub fn labels_subset(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}

/// Selector with neither names nor labels applies to every component.
pub fn is_catch_all(selector: &ComponentSelector) -> bool {
    selector.component_names.is_empty() && selector.match_labels.is_empty()
}

/// Whether `selector` applies to the deployment.
///
/// Applies when the deployment is named in `component_names`, when any
/// `match_labels` entry equals the deployment's label, or when the selector
/// is a catch-all. A non-empty `namespaces` list additionally restricts the
/// match to those namespaces.
pub fn selector_matches(selector: &ComponentSelector, deployment: &Deployment) -> bool {
    if !selector.namespaces.is_empty()
        && !selector
            .namespaces
            .iter()
            .any(|ns| ns == workload::namespace(deployment))
    {
        return false;
    }

    if is_catch_all(selector) {
        return true;
    }

    let name = workload::name(deployment);
    if selector.component_names.iter().any(|n| n == name) {
        return true;
    }

    let labels = workload::labels(deployment);
    selector
        .match_labels
        .iter()
        .any(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
}

pub fn spec_matches(spec: &AvailabilityPolicySpec, deployment: &Deployment) -> bool {
    selector_matches(&spec.component_selector, deployment)
}

/// Policies applying to the deployment. A policy whose selector lists
/// `namespaces` reaches exactly those; otherwise it applies only inside its
/// own namespace.
pub fn applicable_policies<'a>(
    policies: &'a [AvailabilityPolicy],
    deployment: &Deployment,
) -> Vec<&'a AvailabilityPolicy> {
    policies
        .iter()
        .filter(|p| {
            !p.spec.component_selector.namespaces.is_empty()
                || p.metadata.namespace.as_deref() == Some(workload::namespace(deployment))
        })
        .filter(|p| spec_matches(&p.spec, deployment))
        .collect()
}

/// Highest-priority policy; ties keep the earliest in input order.
pub fn highest_priority<'a>(policies: &[&'a AvailabilityPolicy]) -> Option<&'a AvailabilityPolicy> {
    policies.iter().copied().reduce(|best, candidate| {
        if candidate.spec.priority > best.spec.priority {
            candidate
        } else {
            best
        }
    })
}

/// Labels shared, with equal values, by every deployment. Kubernetes
/// recommended labels (`app.kubernetes.io/*`) and `version` are excluded.
pub fn common_labels(deployments: &[&Deployment]) -> BTreeMap<String, String> {
    let Some((first, rest)) = deployments.split_first() else {
        return BTreeMap::new();
    };
    workload::labels(first)
        .iter()
        .filter(|(k, _)| !k.starts_with("app.kubernetes.io/") && k.as_str() != "version")
        .filter(|(k, v)| {
            rest.iter()
                .all(|d| workload::labels(d).get(*k).is_some_and(|other| other == *v))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::DeploymentFixture;
    use crate::domain::class::AvailabilityClass;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_labels_subset() {
        let labels = map(&[("app", "api"), ("tier", "gold")]);
        assert!(labels_subset(&map(&[("app", "api")]), &labels));
        assert!(labels_subset(&BTreeMap::new(), &labels));
        assert!(!labels_subset(&map(&[("app", "web")]), &labels));
        assert!(!labels_subset(&map(&[("app", "api"), ("zone", "a")]), &labels));
    }

    #[test]
    fn test_selector_by_name_label_and_catch_all() {
        let d = DeploymentFixture::new("prod", "api", 2)
            .label("tier", "gold")
            .build();

        let by_name = ComponentSelector {
            component_names: vec!["api".into()],
            ..Default::default()
        };
        assert!(selector_matches(&by_name, &d));

        let by_label = ComponentSelector {
            match_labels: map(&[("tier", "gold"), ("zone", "x")]),
            ..Default::default()
        };
        assert!(selector_matches(&by_label, &d));

        let miss = ComponentSelector {
            match_labels: map(&[("tier", "bronze")]),
            component_names: vec!["web".into()],
            ..Default::default()
        };
        assert!(!selector_matches(&miss, &d));

        assert!(selector_matches(&ComponentSelector::default(), &d));
    }

    #[test]
    fn test_selector_namespace_gate() {
        let d = DeploymentFixture::new("prod", "api", 2).build();
        let selector = ComponentSelector {
            namespaces: vec!["staging".into()],
            ..Default::default()
        };
        assert!(!selector_matches(&selector, &d));
    }

    #[test]
    fn test_highest_priority_policy() {
        let d = DeploymentFixture::new("prod", "api", 2).build();
        let mut low = AvailabilityPolicySpec::new(AvailabilityClass::Standard);
        low.priority = 10;
        let mut high = AvailabilityPolicySpec::new(AvailabilityClass::MissionCritical);
        high.priority = 100;
        let policies = vec![
            AvailabilityPolicy::namespaced("prod", "low", low),
            AvailabilityPolicy::namespaced("prod", "high", high),
            AvailabilityPolicy::namespaced(
                "other",
                "elsewhere",
                AvailabilityPolicySpec::new(AvailabilityClass::NonCritical),
            ),
        ];

        let applicable = applicable_policies(&policies, &d);
        assert_eq!(applicable.len(), 2);
        let best = highest_priority(&applicable).unwrap();
        assert_eq!(best.metadata.name.as_deref(), Some("high"));
    }

    #[test]
    fn test_namespaces_selector_reaches_other_namespaces() {
        let d = DeploymentFixture::new("prod", "api", 2).build();
        let mut spec = AvailabilityPolicySpec::new(AvailabilityClass::HighAvailability);
        spec.component_selector.namespaces = vec!["prod".into()];
        let mut narrowed = AvailabilityPolicySpec::new(AvailabilityClass::Standard);
        narrowed.component_selector.namespaces = vec!["staging".into()];
        let policies = vec![
            AvailabilityPolicy::namespaced("ops", "prod-wide", spec),
            AvailabilityPolicy::namespaced("ops", "staging-only", narrowed),
            AvailabilityPolicy::namespaced(
                "ops",
                "ops-default",
                AvailabilityPolicySpec::new(AvailabilityClass::NonCritical),
            ),
        ];

        let names: Vec<_> = applicable_policies(&policies, &d)
            .iter()
            .filter_map(|p| p.metadata.name.as_deref())
            .collect();
        assert_eq!(names, vec!["prod-wide"]);
    }

    #[test]
    fn test_common_labels_skip_recommended_and_version() {
        let a = DeploymentFixture::new("prod", "a", 2)
            .label("team", "billing")
            .label("app.kubernetes.io/part-of", "shop")
            .label("version", "v1")
            .label("zone", "a")
            .build();
        let b = DeploymentFixture::new("prod", "b", 2)
            .label("team", "billing")
            .label("app.kubernetes.io/part-of", "shop")
            .label("version", "v1")
            .label("zone", "b")
            .build();

        assert_eq!(common_labels(&[&a, &b]), map(&[("team", "billing")]));
        assert!(common_labels(&[]).is_empty());
    }
}
