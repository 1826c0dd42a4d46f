//! Agent configuration
//!
//! Stored in `~/.config/opkit/agent.yaml`. Every field is optional; the
//! `AGENT_NAMESPACE` environment variable overrides the node namespace.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::ENV_CONFIG_PREFIX;
use crate::error::{KubeError, Result};
use opkit_core::DEFAULT_AGENT_NAMESPACE;

/// Environment variable naming the node's own namespace
pub const NAMESPACE_ENV_VAR: &str = "AGENT_NAMESPACE";

/// Settings of the agent running the deployment pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Namespace the agent itself runs in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Seconds to wait for a CustomResourceDefinition to be established
    #[serde(default = "default_cr_install_timeout")]
    pub cr_install_timeout_secs: u64,

    /// Prefix of per-workload environment config map names
    #[serde(default = "default_env_config_prefix")]
    pub env_config_prefix: String,
}

fn default_namespace() -> String {
    DEFAULT_AGENT_NAMESPACE.to_string()
}

fn default_cr_install_timeout() -> u64 {
    180
}

fn default_env_config_prefix() -> String {
    ENV_CONFIG_PREFIX.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            cr_install_timeout_secs: default_cr_install_timeout(),
            env_config_prefix: default_env_config_prefix(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from default location, then apply the environment
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Ok(Self::load_from(&path)?.with_env())
        } else {
            Ok(Self::from_env())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with the environment applied
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides
    pub fn with_env(self) -> Self {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(namespace) = lookup(NAMESPACE_ENV_VAR).filter(|ns| !ns.is_empty()) {
            self.namespace = namespace;
        }
        self
    }

    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            KubeError::InvalidConfig("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("opkit").join("agent.yaml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(KubeError::InvalidConfig(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.env_config_prefix.is_empty() {
            return Err(KubeError::InvalidConfig(
                "envConfigPrefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the agent confines every workload to its own namespace
    ///
    /// Only an agent running in the reserved default namespace may deploy
    /// services elsewhere.
    pub fn restricts_namespaces(&self) -> bool {
        self.namespace != DEFAULT_AGENT_NAMESPACE
    }

    pub fn cr_install_timeout(&self) -> Duration {
        Duration::from_secs(self.cr_install_timeout_secs)
    }
}
