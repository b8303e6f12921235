//! Kubernetes collaborator configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Connect to the cluster at startup (in-cluster config or kubeconfig)
    pub enabled: bool,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
