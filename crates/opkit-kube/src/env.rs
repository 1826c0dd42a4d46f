//! Workload environment injection
//!
//! Caller-supplied environment variables are stored in one config map per
//! workload, named `{prefix}-{workload_id}`. Containers of the workload's
//! Deployment get a single extra variable, [`ENV_REFERENCE_VAR`], whose value
//! is the config map's name. Consumers resolve the reference when the
//! container starts.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar};
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

use crate::cluster::{ClusterApi, gvk_for, to_dynamic};
use crate::error::{KubeError, Result};

/// Default prefix of environment config map names
pub const ENV_CONFIG_PREFIX: &str = "hzn-env-vars";

/// Variable added to every container, pointing at the config map
pub const ENV_REFERENCE_VAR: &str = "HZN_ENV_VARS";

/// Environment variables bound to one workload instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvBinding {
    pub vars: BTreeMap<String, String>,
    pub workload_id: String,
    pub prefix: String,
}

impl EnvBinding {
    pub fn new(vars: BTreeMap<String, String>, workload_id: impl Into<String>) -> Self {
        Self {
            vars,
            workload_id: workload_id.into(),
            prefix: ENV_CONFIG_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Name of the config map backing this binding
    pub fn config_name(&self) -> String {
        env_config_name(&self.prefix, &self.workload_id)
    }
}

/// Config map name for a workload
pub fn env_config_name(prefix: &str, workload_id: &str) -> String {
    format!("{}-{}", prefix, workload_id)
}

/// Drop entries whose name is empty
pub fn sanitize_env_vars(vars: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    vars.iter()
        .filter(|(name, value)| {
            if name.is_empty() {
                tracing::warn!(value = %value, "omitting environment variable with empty name");
                false
            } else {
                true
            }
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Build the config map holding a workload's environment
pub fn env_config_map(name: &str, vars: BTreeMap<String, String>) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(vars),
        ..Default::default()
    }
}

/// Create the environment config map for a workload
///
/// Returns the config map name, or `None` when no variables remain after
/// empty names are dropped. Any cluster failure, including a name
/// collision with an earlier install, is a [`KubeError::ConfigCreation`].
pub async fn create_env_config<C: ClusterApi + ?Sized>(
    cluster: &C,
    vars: &BTreeMap<String, String>,
    workload_id: &str,
    namespace: &str,
    prefix: &str,
) -> Result<Option<String>> {
    let vars = sanitize_env_vars(vars);
    if vars.is_empty() {
        return Ok(None);
    }

    let name = env_config_name(prefix, workload_id);
    let object = to_dynamic(&env_config_map(&name, vars))?;

    cluster
        .create(Some(namespace), &object)
        .await
        .map_err(|e| KubeError::ConfigCreation {
            workload: workload_id.to_string(),
            source: Box::new(e),
        })?;

    tracing::debug!(name = %name, namespace = %namespace, workload = %workload_id, "created environment config map");
    Ok(Some(name))
}

/// Append the config map reference to every container of a Deployment
pub fn inject_env_reference(deployment: &mut Deployment, config_name: &str) {
    let containers = deployment
        .spec
        .iter_mut()
        .filter_map(|spec| spec.template.spec.as_mut())
        .flat_map(|pod| pod.containers.iter_mut());

    for container in containers {
        container.env.get_or_insert_with(Vec::new).push(EnvVar {
            name: ENV_REFERENCE_VAR.to_string(),
            value: Some(config_name.to_string()),
            ..Default::default()
        });
    }
}

/// Remove a workload's environment config map
///
/// A missing config map is not an error.
pub async fn delete_env_config<C: ClusterApi + ?Sized>(
    cluster: &C,
    workload_id: &str,
    namespace: &str,
    prefix: &str,
) -> Result<()> {
    let name = env_config_name(prefix, workload_id);
    match cluster
        .delete(&gvk_for::<ConfigMap>(), Some(namespace), &name)
        .await
    {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
