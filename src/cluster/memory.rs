use super::{ClusterApi, ClusterError};
use crate::domain::AvailabilityPolicy;
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::Resource;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

type Key = (String, String);

#[derive(Default)]
struct State {
    version: String,
    version_latency: Option<Duration>,
    deployments: BTreeMap<Key, Deployment>,
    pdbs: BTreeMap<Key, PodDisruptionBudget>,
    events: Vec<Event>,
    pods: BTreeMap<Key, Pod>,
    nodes: Vec<Node>,
    namespaces: BTreeSet<String>,
    policies: BTreeMap<Key, AvailabilityPolicy>,
    next_version: u64,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

/// In-process cluster for tests. Objects are
/// kept sorted by `(namespace, name)`; writes stamp resource versions the
/// way the API server does.
pub struct InMemoryCluster {
    state: RwLock<State>,
}

fn key_of<K: Resource>(obj: &K) -> Key {
    let meta = obj.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn in_scope(key: &Key, namespace: Option<&str>) -> bool {
    namespace.map_or(true, |ns| key.0 == ns)
}

fn scoped<T: Clone>(map: &BTreeMap<Key, T>, namespace: Option<&str>) -> Vec<T> {
    map.iter()
        .filter(|(k, _)| in_scope(k, namespace))
        .map(|(_, v)| v.clone())
        .collect()
}

impl InMemoryCluster {
    pub fn new() -> Self {
        let state = State {
            version: "v1.28.0".to_string(),
            ..Default::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, ClusterError> {
        self.state
            .read()
            .map_err(|_| ClusterError::Client("cluster state lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, ClusterError> {
        self.state
            .write()
            .map_err(|_| ClusterError::Client("cluster state lock poisoned".to_string()))
    }

    fn seed(self, f: impl FnOnce(&mut State)) -> Self {
        if let Ok(mut state) = self.state.write() {
            f(&mut state);
        }
        self
    }

    pub fn with_version(self, version: &str) -> Self {
        self.seed(|s| s.version = version.to_string())
    }

    /// Delay every `server_version` answer, as a slow API server would.
    pub fn with_version_latency(self, latency: Duration) -> Self {
        self.seed(|s| s.version_latency = Some(latency))
    }

    pub fn with_deployment(self, deployment: Deployment) -> Self {
        self.seed(|s| {
            let key = key_of(&deployment);
            s.namespaces.insert(key.0.clone());
            s.deployments.insert(key, deployment);
        })
    }

    pub fn with_pdb(self, pdb: PodDisruptionBudget) -> Self {
        self.seed(|s| {
            let key = key_of(&pdb);
            s.namespaces.insert(key.0.clone());
            s.pdbs.insert(key, pdb);
        })
    }

    pub fn with_policy(self, mut policy: AvailabilityPolicy) -> Self {
        self.seed(|s| {
            let key = key_of(&policy);
            if policy.metadata.resource_version.is_none() {
                policy.metadata.resource_version = Some(s.bump());
            }
            s.namespaces.insert(key.0.clone());
            s.policies.insert(key, policy);
        })
    }

    pub fn with_event(self, event: Event) -> Self {
        self.seed(|s| {
            if let Some(ns) = &event.metadata.namespace {
                s.namespaces.insert(ns.clone());
            }
            s.events.push(event);
        })
    }

    pub fn with_pod(self, pod: Pod) -> Self {
        self.seed(|s| {
            let key = key_of(&pod);
            s.namespaces.insert(key.0.clone());
            s.pods.insert(key, pod);
        })
    }

    pub fn with_node(self, name: &str) -> Self {
        let node = Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.seed(|s| s.nodes.push(node))
    }

    pub fn with_namespace(self, namespace: &str) -> Self {
        self.seed(|s| {
            s.namespaces.insert(namespace.to_string());
        })
    }
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterApi for InMemoryCluster {
    async fn server_version(&self) -> Result<String, ClusterError> {
        let (version, latency) = {
            let state = self.read()?;
            (state.version.clone(), state.version_latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(version)
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>, ClusterError> {
        Ok(scoped(&self.read()?.deployments, namespace))
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.read()?.deployments.get(&key).cloned())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let key = key_of(deployment);
        let mut state = self.write()?;
        let version = state.bump();
        let Some(stored) = state.deployments.get_mut(&key) else {
            return Err(ClusterError::not_found("Deployment", &key.0, &key.1));
        };
        let mut updated = deployment.clone();
        updated.metadata.resource_version = Some(version);
        *stored = updated.clone();
        Ok(updated)
    }

    async fn list_pdbs(&self, namespace: Option<&str>) -> Result<Vec<PodDisruptionBudget>, ClusterError> {
        Ok(scoped(&self.read()?.pdbs, namespace))
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>, ClusterError> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| namespace.map_or(true, |ns| e.metadata.namespace.as_deref() == Some(ns)))
            .cloned()
            .collect())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterError> {
        Ok(scoped(&self.read()?.pods, namespace))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        Ok(self.read()?.nodes.clone())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.read()?.namespaces.iter().cloned().collect())
    }

    async fn list_policies(&self, namespace: Option<&str>) -> Result<Vec<AvailabilityPolicy>, ClusterError> {
        Ok(scoped(&self.read()?.policies, namespace))
    }

    async fn get_policy(&self, namespace: &str, name: &str) -> Result<Option<AvailabilityPolicy>, ClusterError> {
        let key = (namespace.to_string(), name.to_string());
        Ok(self.read()?.policies.get(&key).cloned())
    }

    async fn create_policy(&self, policy: &AvailabilityPolicy) -> Result<AvailabilityPolicy, ClusterError> {
        let key = key_of(policy);
        if key.0.is_empty() || key.1.is_empty() {
            return Err(ClusterError::Invalid(
                "AvailabilityPolicy requires metadata.name and metadata.namespace".to_string(),
            ));
        }
        let mut state = self.write()?;
        if state.policies.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind: "AvailabilityPolicy",
                namespace: key.0,
                name: key.1,
            });
        }
        let mut created = policy.clone();
        created.metadata.resource_version = Some(state.bump());
        created.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        created.metadata.generation = Some(1);
        created.metadata.creation_timestamp = Some(Time(Utc::now()));
        state.namespaces.insert(key.0.clone());
        state.policies.insert(key, created.clone());
        Ok(created)
    }

    async fn update_policy(&self, policy: &AvailabilityPolicy) -> Result<AvailabilityPolicy, ClusterError> {
        let key = key_of(policy);
        let mut state = self.write()?;
        let version = state.bump();
        let Some(stored) = state.policies.get_mut(&key) else {
            return Err(ClusterError::not_found("AvailabilityPolicy", &key.0, &key.1));
        };
        if let Some(expected) = &policy.metadata.resource_version {
            if stored.metadata.resource_version.as_ref() != Some(expected) {
                return Err(ClusterError::Conflict {
                    kind: "AvailabilityPolicy",
                    namespace: key.0,
                    name: key.1,
                });
            }
        }
        let mut updated = policy.clone();
        updated.metadata.resource_version = Some(version);
        updated.metadata.uid = stored.metadata.uid.clone();
        updated.metadata.creation_timestamp = stored.metadata.creation_timestamp.clone();
        updated.metadata.generation = Some(stored.metadata.generation.unwrap_or(1) + 1);
        *stored = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::fixtures::DeploymentFixture;
    use crate::domain::{AvailabilityClass, AvailabilityPolicySpec};

    fn policy(ns: &str, name: &str) -> AvailabilityPolicy {
        AvailabilityPolicy::namespaced(ns, name, AvailabilityPolicySpec::new(AvailabilityClass::Standard))
    }

    #[tokio::test]
    async fn test_list_scoping_and_namespaces() {
        let cluster = InMemoryCluster::new()
            .with_deployment(DeploymentFixture::new("prod", "api", 3).build())
            .with_deployment(DeploymentFixture::new("dev", "api", 1).build())
            .with_namespace("empty");

        assert_eq!(cluster.list_deployments(None).await.unwrap().len(), 2);
        assert_eq!(cluster.list_deployments(Some("prod")).await.unwrap().len(), 1);
        assert_eq!(
            cluster.list_namespaces().await.unwrap(),
            vec!["dev".to_string(), "empty".to_string(), "prod".to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_policy_stamps_server_fields_and_rejects_duplicates() {
        let cluster = InMemoryCluster::new();
        let created = cluster.create_policy(&policy("prod", "p")).await.unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());

        let err = cluster.create_policy(&policy("prod", "p")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_policy_checks_resource_version() {
        let cluster = InMemoryCluster::new();
        let created = cluster.create_policy(&policy("prod", "p")).await.unwrap();

        let mut stale = created.clone();
        stale.metadata.resource_version = Some("stale".into());
        assert!(cluster.update_policy(&stale).await.unwrap_err().is_conflict());

        let mut fresh = created.clone();
        fresh.spec.priority = 7;
        let updated = cluster.update_policy(&fresh).await.unwrap();
        assert_eq!(updated.spec.priority, 7);
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);

        let missing = cluster.update_policy(&policy("prod", "ghost")).await.unwrap_err();
        assert!(missing.is_not_found());
    }
}
