//! Error types for opkit-kube

use thiserror::Error;

/// Result type for opkit-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while installing, removing or querying an operator
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// The deployment archive or one of its manifests could not be decoded
    #[error("failed to process operator deployment: {0}")]
    Processing(#[from] opkit_core::CoreError),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// The cluster refused a create, delete or get call
    #[error("cluster rejected {operation} of {kind} '{name}' ({code}): {message}")]
    Rejected {
        operation: String,
        kind: String,
        name: String,
        code: u16,
        message: String,
    },

    /// The workload asked for a namespace the agent may not deploy into
    #[error(
        "service for workload '{workload}' cannot be deployed into namespace '{namespace}': the agent's namespace is '{node_namespace}' and it restricts all services to that namespace"
    )]
    NamespaceConflict {
        workload: String,
        namespace: String,
        node_namespace: String,
    },

    /// An object the operation depends on is absent
    #[error("{kind} not found: {message}")]
    NotFound { kind: String, message: String },

    /// A lower layer returned a payload of an unexpected shape
    #[error("unexpected {expected} payload: {message}")]
    TypeMismatch { expected: String, message: String },

    /// The environment config map for a workload could not be created
    #[error("failed to create environment config map for '{workload}': {source}")]
    ConfigCreation {
        workload: String,
        #[source]
        source: Box<KubeError>,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Timeout
    #[error("operation timed out after {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// HTTP status the cluster answered with, if this is a cluster error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            KubeError::Api(kube::Error::Api(resp)) => Some(resp.code),
            KubeError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }

    /// Whether the target platform itself rejected the call
    pub fn is_cluster_error(&self) -> bool {
        matches!(self, KubeError::Api(_) | KubeError::Rejected { .. })
    }
}
