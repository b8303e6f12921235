use super::{ClusterApi, ClusterError};
use crate::domain::AvailabilityPolicy;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// [`ClusterApi`] over a live API server.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client from the in-cluster service account or the local kubeconfig.
    pub async fn try_default() -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

async fn list<K>(api: Api<K>) -> Result<Vec<K>, ClusterError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    Ok(api.list(&ListParams::default()).await?.items)
}

fn require_namespace<K: Resource>(obj: &K, kind: &str) -> Result<(String, String), ClusterError> {
    let name = obj.meta().name.clone().unwrap_or_default();
    let ns = obj.meta().namespace.clone().unwrap_or_default();
    if name.is_empty() || ns.is_empty() {
        return Err(ClusterError::Invalid(format!(
            "{} requires metadata.name and metadata.namespace",
            kind
        )));
    }
    Ok((ns, name))
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn server_version(&self) -> Result<String, ClusterError> {
        Ok(self.client.apiserver_version().await?.git_version)
    }

    async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>, ClusterError> {
        list(self.scoped::<Deployment>(namespace)).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let (ns, name) = require_namespace(deployment, "Deployment")?;
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &ns);
        Ok(api.replace(&name, &PostParams::default(), deployment).await?)
    }

    async fn list_pdbs(&self, namespace: Option<&str>) -> Result<Vec<PodDisruptionBudget>, ClusterError> {
        list(self.scoped::<PodDisruptionBudget>(namespace)).await
    }

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>, ClusterError> {
        list(self.scoped::<Event>(namespace)).await
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterError> {
        list(self.scoped::<Pod>(namespace)).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        list(Api::<Node>::all(self.client.clone())).await
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError> {
        let namespaces = list(Api::<Namespace>::all(self.client.clone())).await?;
        Ok(namespaces.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_policies(&self, namespace: Option<&str>) -> Result<Vec<AvailabilityPolicy>, ClusterError> {
        list(self.scoped::<AvailabilityPolicy>(namespace)).await
    }

    async fn get_policy(&self, namespace: &str, name: &str) -> Result<Option<AvailabilityPolicy>, ClusterError> {
        let api: Api<AvailabilityPolicy> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_policy(&self, policy: &AvailabilityPolicy) -> Result<AvailabilityPolicy, ClusterError> {
        let (ns, _) = require_namespace(policy, "AvailabilityPolicy")?;
        let api: Api<AvailabilityPolicy> = Api::namespaced(self.client.clone(), &ns);
        Ok(api.create(&PostParams::default(), policy).await?)
    }

    async fn update_policy(&self, policy: &AvailabilityPolicy) -> Result<AvailabilityPolicy, ClusterError> {
        let (ns, name) = require_namespace(policy, "AvailabilityPolicy")?;
        let api: Api<AvailabilityPolicy> = Api::namespaced(self.client.clone(), &ns);
        Ok(api.replace(&name, &PostParams::default(), policy).await?)
    }
}
