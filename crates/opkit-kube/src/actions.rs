//! Request and option types for install, uninstall and status operations

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// What to operate on: one operator archive for one workload instance
#[derive(Debug, Clone, Default)]
pub struct DeploymentRequest {
    /// Base64 text of a gzip-compressed tar of manifest files
    pub archive: String,

    /// Deployment metadata supplied alongside the archive
    ///
    /// A string `namespace` key declares the workload's namespace.
    pub metadata: HashMap<String, JsonValue>,

    /// Agreement or workload instance identifier
    pub workload_id: String,

    /// Namespace requested by the caller; empty for none
    pub namespace: String,
}

impl DeploymentRequest {
    pub fn new(archive: impl Into<String>, workload_id: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            workload_id: workload_id.into(),
            ..Default::default()
        }
    }

    /// Request a namespace explicitly
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Attach deployment metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set a single metadata entry
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Options for install operation
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Environment variables for the workload's containers
    pub env_vars: BTreeMap<String, String>,

    /// How long a CustomResourceDefinition may take to be established
    ///
    /// Falls back to the agent configuration when unset.
    pub cr_install_timeout: Option<Duration>,
}

impl InstallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_vars(mut self, env_vars: BTreeMap<String, String>) -> Self {
        self.env_vars = env_vars;
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(name.into(), value.into());
        self
    }

    pub fn with_cr_install_timeout(mut self, timeout: Duration) -> Self {
        self.cr_install_timeout = Some(timeout);
        self
    }
}
