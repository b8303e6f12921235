//! Object builders for seeding [`super::InMemoryCluster`].

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerStatus, Event, ObjectReference, Pod, PodAffinityTerm,
    PodAntiAffinity, PodSpec, PodStatus, PodTemplateSpec, ResourceRequirements,
};
use k8s_openapi::api::policy::v1::{
    PodDisruptionBudget, PodDisruptionBudgetSpec, PodDisruptionBudgetStatus,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, Time};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Fluent [`Deployment`] builder.
pub struct DeploymentFixture {
    deployment: Deployment,
}

impl DeploymentFixture {
    /// Deployment selecting `app=<name>`.
    pub fn new(namespace: &str, name: &str, replicas: i32) -> Self {
        let deployment = Deployment {
            metadata: meta(namespace, name),
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                selector: LabelSelector {
                    match_labels: Some(string_map(&[("app", name)])),
                    ..Default::default()
                },
                template: PodTemplateSpec::default(),
                ..Default::default()
            }),
            ..Default::default()
        };
        Self { deployment }
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.deployment
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.deployment
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Add a selector `match_labels` entry.
    pub fn selector(mut self, key: &str, value: &str) -> Self {
        if let Some(spec) = self.deployment.spec.as_mut() {
            spec.selector
                .match_labels
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
        }
        self
    }

    fn pod_spec(&mut self) -> Option<&mut PodSpec> {
        self.deployment
            .spec
            .as_mut()
            .map(|s| s.template.spec.get_or_insert_with(PodSpec::default))
    }

    /// Container without resource requests or limits.
    pub fn container(mut self) -> Self {
        if let Some(pod) = self.pod_spec() {
            pod.containers.push(Container {
                name: "main".to_string(),
                ..Default::default()
            });
        }
        self
    }

    /// Container with CPU and memory requests and limits.
    pub fn container_with_resources(mut self) -> Self {
        let quantities = |cpu: &str, mem: &str| {
            BTreeMap::from([
                ("cpu".to_string(), Quantity(cpu.to_string())),
                ("memory".to_string(), Quantity(mem.to_string())),
            ])
        };
        if let Some(pod) = self.pod_spec() {
            pod.containers.push(Container {
                name: "main".to_string(),
                resources: Some(ResourceRequirements {
                    requests: Some(quantities("100m", "128Mi")),
                    limits: Some(quantities("500m", "512Mi")),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        self
    }

    /// Required pod anti-affinity on the hostname topology.
    pub fn anti_affinity(mut self) -> Self {
        let name = self.deployment.metadata.name.clone().unwrap_or_default();
        if let Some(pod) = self.pod_spec() {
            pod.affinity = Some(Affinity {
                pod_anti_affinity: Some(PodAntiAffinity {
                    required_during_scheduling_ignored_during_execution: Some(vec![
                        PodAffinityTerm {
                            label_selector: Some(LabelSelector {
                                match_labels: Some(string_map(&[("app", name.as_str())])),
                                ..Default::default()
                            }),
                            topology_key: "kubernetes.io/hostname".to_string(),
                            ..Default::default()
                        },
                    ]),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        self
    }

    pub fn build(self) -> Deployment {
        self.deployment
    }
}

/// PDB with optional budgets. An empty `match_labels` slice leaves the
/// selector unset, so the budget is only found by its `<name>-pdb` name.
pub fn pdb(
    namespace: &str,
    name: &str,
    min_available: Option<IntOrString>,
    max_unavailable: Option<IntOrString>,
    match_labels: &[(&str, &str)],
) -> PodDisruptionBudget {
    PodDisruptionBudget {
        metadata: meta(namespace, name),
        spec: Some(PodDisruptionBudgetSpec {
            min_available,
            max_unavailable,
            selector: (!match_labels.is_empty()).then(|| LabelSelector {
                match_labels: Some(string_map(match_labels)),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: Some(PodDisruptionBudgetStatus {
            current_healthy: 0,
            desired_healthy: 0,
            disruptions_allowed: 0,
            expected_pods: 0,
            ..Default::default()
        }),
    }
}

/// Core event about `kind/object` in `namespace`.
pub fn event(
    namespace: &str,
    kind: &str,
    object: &str,
    event_type: &str,
    reason: &str,
    message: &str,
    last_seen: DateTime<Utc>,
) -> Event {
    Event {
        metadata: ObjectMeta {
            name: Some(format!("{}.{}", object, last_seen.timestamp_millis())),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some(kind.to_string()),
            name: Some(object.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some(event_type.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_timestamp: Some(Time(last_seen)),
        count: Some(1),
        ..Default::default()
    }
}

/// Pod whose single container reports `ready`.
pub fn pod(namespace: &str, name: &str, ready: bool) -> Pod {
    Pod {
        metadata: meta(namespace, name),
        spec: None,
        status: Some(PodStatus {
            phase: Some(if ready { "Running" } else { "Pending" }.to_string()),
            container_statuses: Some(vec![ContainerStatus {
                name: "main".to_string(),
                ready,
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}
