use thiserror::Error;

/// Errors from the Kubernetes collaborator.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("conflict updating {kind} {namespace}/{name}: resource version changed")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("kubernetes API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("kubernetes client error: {0}")]
    Client(String),

    #[error("invalid object: {0}")]
    Invalid(String),
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => ClusterError::Api {
                code: resp.code,
                message: resp.message,
            },
            other => ClusterError::Client(other.to_string()),
        }
    }
}

impl ClusterError {
    pub fn not_found(kind: &'static str, namespace: &str, name: &str) -> Self {
        ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
            || matches!(self, ClusterError::Api { code: 404, .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ClusterError::AlreadyExists { .. } | ClusterError::Conflict { .. }
        ) || matches!(self, ClusterError::Api { code: 409, .. })
    }
}
