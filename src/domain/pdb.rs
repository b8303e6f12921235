//! PodDisruptionBudget lookup and value helpers.

use super::class::AvailabilityClass;
use super::policy::{AvailabilityPolicySpec, PdbConfig};
use super::selector::labels_subset;
use super::workload;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::HashMap;

/// Name of the PDB managed for a deployment.
pub fn expected_pdb_name(deployment_name: &str) -> String {
    format!("{}-pdb", deployment_name)
}

pub fn min_available(pdb: &PodDisruptionBudget) -> Option<&IntOrString> {
    pdb.spec.as_ref().and_then(|s| s.min_available.as_ref())
}

pub fn max_unavailable(pdb: &PodDisruptionBudget) -> Option<&IntOrString> {
    pdb.spec.as_ref().and_then(|s| s.max_unavailable.as_ref())
}

/// Render `2` or `"50%"` as plain text.
pub fn format_value(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(i) => i.to_string(),
        IntOrString::String(s) => s.clone(),
    }
}

pub fn format_opt(value: Option<&IntOrString>) -> Option<String> {
    value.map(format_value)
}

/// Parse `"2"` or `"50%"` into the matching variant.
pub fn parse_value(raw: &str) -> IntOrString {
    let trimmed = raw.trim();
    match trimmed.parse::<i32>() {
        Ok(i) => IntOrString::Int(i),
        Err(_) => IntOrString::String(trimmed.to_string()),
    }
}

/// Percentage of `value`, if it is one.
pub fn percent(value: &IntOrString) -> Option<u32> {
    match value {
        IntOrString::String(s) => s.trim().strip_suffix('%')?.trim().parse().ok(),
        IntOrString::Int(_) => None,
    }
}

/// Pods that must stay available for `value` over `replicas`, rounding up.
pub fn resolve_pods(value: &IntOrString, replicas: i32) -> i32 {
    match value {
        IntOrString::Int(i) => *i,
        IntOrString::String(_) => match percent(value) {
            Some(p) => {
                let replicas = replicas.max(0) as i64;
                ((replicas * p as i64 + 99) / 100) as i32
            }
            None => 0,
        },
    }
}

/// Class whose canonical `min_available` best describes a PDB's current
/// `min_available` over `replicas`.
pub fn infer_class(min_available: &IntOrString, replicas: i32) -> AvailabilityClass {
    let pct = match percent(min_available) {
        Some(p) => p,
        None if replicas > 0 => {
            let pods = resolve_pods(min_available, replicas).clamp(0, replicas);
            (pods as u32 * 100) / replicas as u32
        }
        None => 0,
    };
    match pct {
        p if p >= 90 => AvailabilityClass::MissionCritical,
        p if p >= 75 => AvailabilityClass::HighAvailability,
        p if p >= 50 => AvailabilityClass::Standard,
        _ => AvailabilityClass::NonCritical,
    }
}

/// PDB values a policy expects. `None` for a custom class without config.
pub fn expected_config(spec: &AvailabilityPolicySpec) -> Option<PdbConfig> {
    match spec.availability_class.default_min_available() {
        Some(min) => Some(PdbConfig {
            min_available: Some(IntOrString::String(min.to_string())),
            ..Default::default()
        }),
        None => spec.custom_pdb_config.clone(),
    }
}

/// Disruption budgets indexed by `namespace/name` and by namespace.
#[derive(Default)]
pub struct PdbIndex<'a> {
    by_key: HashMap<String, &'a PodDisruptionBudget>,
    by_namespace: HashMap<String, Vec<&'a PodDisruptionBudget>>,
}

impl<'a> PdbIndex<'a> {
    pub fn new(pdbs: &'a [PodDisruptionBudget]) -> Self {
        let mut index = Self::default();
        for pdb in pdbs {
            let ns = pdb.metadata.namespace.clone().unwrap_or_default();
            let name = pdb.metadata.name.clone().unwrap_or_default();
            index.by_key.insert(format!("{}/{}", ns, name), pdb);
            index.by_namespace.entry(ns).or_default().push(pdb);
        }
        index
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&'a PodDisruptionBudget> {
        self.by_key.get(&format!("{}/{}", namespace, name)).copied()
    }

    /// PDB named for the deployment only.
    pub fn managed_for(&self, deployment: &Deployment) -> Option<&'a PodDisruptionBudget> {
        self.get(
            workload::namespace(deployment),
            &expected_pdb_name(workload::name(deployment)),
        )
    }

    /// PDB covering the deployment: the managed `<name>-pdb`, else any PDB in
    /// the namespace whose `match_labels` are a subset of the deployment
    /// selector's `match_labels`. A PDB with an empty selector covers every
    /// deployment in its namespace; one without a selector covers none.
    pub fn covering(&self, deployment: &Deployment) -> Option<&'a PodDisruptionBudget> {
        if let Some(pdb) = self.managed_for(deployment) {
            return Some(pdb);
        }
        let selector = workload::selector_labels(deployment);
        self.by_namespace
            .get(workload::namespace(deployment))?
            .iter()
            .copied()
            .find(|pdb| {
                pdb.spec
                    .as_ref()
                    .and_then(|s| s.selector.as_ref())
                    .is_some_and(|s| {
                        s.match_labels
                            .as_ref()
                            .map_or(true, |labels| labels_subset(labels, selector))
                    })
            })
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::{pdb, DeploymentFixture};

    #[test]
    fn test_percent_and_resolve() {
        let half = IntOrString::String("50%".into());
        assert_eq!(percent(&half), Some(50));
        assert_eq!(resolve_pods(&half, 3), 2);
        assert_eq!(resolve_pods(&IntOrString::Int(1), 3), 1);
        assert_eq!(percent(&IntOrString::Int(1)), None);
        assert_eq!(parse_value("2"), IntOrString::Int(2));
        assert_eq!(parse_value(" 75% "), IntOrString::String("75%".into()));
    }

    #[test]
    fn test_infer_class() {
        assert_eq!(
            infer_class(&IntOrString::String("90%".into()), 3),
            AvailabilityClass::MissionCritical
        );
        assert_eq!(
            infer_class(&IntOrString::String("60%".into()), 3),
            AvailabilityClass::Standard
        );
        assert_eq!(infer_class(&IntOrString::Int(3), 4), AvailabilityClass::HighAvailability);
        assert_eq!(infer_class(&IntOrString::Int(1), 5), AvailabilityClass::NonCritical);
    }

    #[test]
    fn test_expected_config() {
        let spec = AvailabilityPolicySpec::new(AvailabilityClass::HighAvailability);
        assert_eq!(
            expected_config(&spec).unwrap().min_available,
            Some(IntOrString::String("75%".into()))
        );
        let custom = AvailabilityPolicySpec::new(AvailabilityClass::Custom);
        assert!(expected_config(&custom).is_none());
    }

    #[test]
    fn test_covering_by_name_then_selector_subset() {
        let pdbs = vec![
            pdb("default", "a-pdb", Some(IntOrString::String("50%".into())), None, &[]),
            pdb("default", "shared", None, Some(IntOrString::Int(1)), &[("app", "web")]),
            pdb("other", "b-pdb", None, None, &[]),
        ];
        let index = PdbIndex::new(&pdbs);
        assert_eq!(index.len(), 3);

        let a = DeploymentFixture::new("default", "a", 3).build();
        assert_eq!(
            index.covering(&a).and_then(|p| p.metadata.name.as_deref()),
            Some("a-pdb")
        );

        let web = DeploymentFixture::new("default", "frontend", 2)
            .selector("app", "web")
            .selector("track", "stable")
            .build();
        assert_eq!(
            index.covering(&web).and_then(|p| p.metadata.name.as_deref()),
            Some("shared")
        );
        assert!(index.managed_for(&web).is_none());

        let b = DeploymentFixture::new("default", "b", 2).build();
        assert!(index.covering(&b).is_none());
    }

    #[test]
    fn test_empty_match_labels_cover_whole_namespace() {
        let mut all = pdb("default", "all-pdb", Some(IntOrString::Int(1)), None, &[("x", "y")]);
        if let Some(selector) = all.spec.as_mut().and_then(|s| s.selector.as_mut()) {
            selector.match_labels = Some(Default::default());
        }
        let pdbs = vec![all];
        let index = PdbIndex::new(&pdbs);

        let web = DeploymentFixture::new("default", "web", 2).build();
        assert_eq!(
            index.covering(&web).and_then(|p| p.metadata.name.as_deref()),
            Some("all-pdb")
        );

        let elsewhere = DeploymentFixture::new("prod", "web", 2).build();
        assert!(index.covering(&elsewhere).is_none());
    }
}
