//! Kubernetes collaborator.
//!
//! The tools only talk to the cluster through [`ClusterApi`]. Production uses
//! [`KubeCluster`] over kube-rs. Tests use `InMemoryCluster` and the
//! object builders in `fixtures`, both compiled only for unit tests or with
//! the `test-util` feature.

mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;
mod kube_client;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use error::ClusterError;
pub use kube_client::KubeCluster;
#[cfg(any(test, feature = "test-util"))]
pub use memory::InMemoryCluster;

use crate::domain::AvailabilityPolicy;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use std::sync::Arc;

/// Operations the tools need from the control plane. `namespace: None`
/// lists across all namespaces.
#[async_trait]
pub trait ClusterApi: Send + Sync + 'static {
    /// API server version string, e.g. `v1.28.3`.
    async fn server_version(&self) -> Result<String, ClusterError>;

    async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>, ClusterError>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>, ClusterError>;

    async fn update_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;

    async fn list_pdbs(&self, namespace: Option<&str>) -> Result<Vec<PodDisruptionBudget>, ClusterError>;

    async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>, ClusterError>;

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, ClusterError>;

    async fn list_policies(&self, namespace: Option<&str>) -> Result<Vec<AvailabilityPolicy>, ClusterError>;

    async fn get_policy(&self, namespace: &str, name: &str) -> Result<Option<AvailabilityPolicy>, ClusterError>;

    async fn create_policy(&self, policy: &AvailabilityPolicy) -> Result<AvailabilityPolicy, ClusterError>;

    /// Replace an existing policy. The object's resource version, when set,
    /// must match the stored one.
    async fn update_policy(&self, policy: &AvailabilityPolicy) -> Result<AvailabilityPolicy, ClusterError>;
}

pub type SharedCluster = Arc<dyn ClusterApi>;

/// Best-effort reachability probe used by `/health`.
pub async fn probe(cluster: &dyn ClusterApi) -> bool {
    match cluster.server_version().await {
        Ok(version) => {
            tracing::trace!(version = %version, "Kubernetes probe ok");
            true
        }
        Err(e) => {
            tracing::debug!(error = %e, "Kubernetes probe failed");
            false
        }
    }
}
