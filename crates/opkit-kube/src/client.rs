//! High-level client for operator deployments
//!
//! Ties the pipeline together: decode the archive, resolve the namespace,
//! then drive per-object install, uninstall or status calls through a
//! [`ClusterApi`] implementation.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::actions::{DeploymentRequest, InstallOptions};
use crate::cluster::ClusterApi;
use crate::config::AgentConfig;
use crate::env::EnvBinding;
use crate::error::{KubeError, Result};
use crate::plan::DeploymentPlan;
use crate::resources::{
    InstallReport, InstalledObject, ObjectOutcome, OperatorObject, UninstallReport,
    UninstallResult,
};
use crate::status::{ContainerStatus, aggregate_status};
use opkit_core::BaseKind;

/// Deploys, removes and reports on packaged operators
pub struct OperatorClient<C: ClusterApi> {
    cluster: C,
    config: AgentConfig,
}

impl<C: ClusterApi> OperatorClient<C> {
    pub fn new(cluster: C, config: AgentConfig) -> Self {
        Self { cluster, config }
    }

    /// Get the cluster implementation
    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Decode a request's archive and resolve its namespace
    pub fn plan(
        &self,
        request: &DeploymentRequest,
        env_vars: BTreeMap<String, String>,
        options: Option<&InstallOptions>,
    ) -> Result<(DeploymentPlan, String)> {
        let env = EnvBinding::new(env_vars, request.workload_id.clone())
            .with_prefix(self.config.env_config_prefix.clone());
        let timeout = options
            .and_then(|o| o.cr_install_timeout)
            .unwrap_or_else(|| self.config.cr_install_timeout());

        let plan = DeploymentPlan::prepare(&request.archive, &request.metadata, &env, timeout)?;
        let namespace = opkit_core::resolve_namespace(
            &request.namespace,
            plan.declared_namespace(),
            &self.config.namespace,
        );

        Ok((plan, namespace))
    }

    // ========== Install ==========

    /// Create every object of the archive
    ///
    /// Stops at the first failure. Objects created before it are left in
    /// place; call [`uninstall`](Self::uninstall) to remove them.
    pub async fn install(
        &self,
        request: &DeploymentRequest,
        options: &InstallOptions,
    ) -> Result<InstallReport> {
        let (mut plan, namespace) = self.plan(request, options.env_vars.clone(), Some(options))?;
        let node_namespace = &self.config.namespace;

        if namespace != *node_namespace && self.config.restricts_namespaces() {
            return Err(KubeError::NamespaceConflict {
                workload: request.workload_id.clone(),
                namespace,
                node_namespace: node_namespace.clone(),
            });
        }

        let synthesized_namespace =
            !plan.has_kind(BaseKind::Namespace) && namespace != *node_namespace;
        if synthesized_namespace {
            plan.add_namespace(&namespace);
        }

        let mut installed = Vec::with_capacity(plan.len());
        for object in plan.install_sequence() {
            object.install(&self.cluster, &namespace).await?;

            let name = object.target_name(&namespace);
            tracing::info!(kind = object.kind(), name, namespace = %namespace, "successfully installed");
            installed.push(InstalledObject {
                kind: object.kind().to_string(),
                name: name.to_string(),
            });
        }

        tracing::debug!(
            workload = %request.workload_id,
            count = installed.len(),
            "all operator objects installed"
        );

        Ok(InstallReport {
            namespace,
            installed,
            synthesized_namespace,
            skipped: plan.skipped().to_vec(),
        })
    }

    // ========== Uninstall ==========

    /// Delete every object of the archive, best-effort
    ///
    /// Fails only if the archive cannot be decoded. Per-object failures are
    /// logged, recorded in the report, and never stop the sequence.
    pub async fn uninstall(&self, request: &DeploymentRequest) -> Result<UninstallReport> {
        let (plan, namespace) = self.plan(request, BTreeMap::new(), None)?;

        let mut outcomes = Vec::with_capacity(plan.len());
        for object in plan.uninstall_sequence() {
            let name = object.target_name(&namespace);
            tracing::info!(kind = object.kind(), name, "attempting to uninstall");

            let result = if self.is_node_namespace(object, &namespace) {
                UninstallResult::Skipped("agent namespace is never deleted".to_string())
            } else {
                object.uninstall(&self.cluster, &namespace).await
            };

            match &result {
                UninstallResult::Failed(message) => {
                    tracing::warn!(kind = object.kind(), name, error = %message, "failed to uninstall")
                }
                UninstallResult::Skipped(reason) => {
                    tracing::debug!(kind = object.kind(), name, reason = %reason, "skipped")
                }
                UninstallResult::Deleted => {}
            }

            outcomes.push(ObjectOutcome {
                kind: object.kind().to_string(),
                name: name.to_string(),
                result,
            });
        }

        tracing::debug!(workload = %request.workload_id, "completed removal of all operator objects");

        Ok(UninstallReport {
            namespace,
            outcomes,
        })
    }

    fn is_node_namespace(&self, object: &OperatorObject, namespace: &str) -> bool {
        matches!(object, OperatorObject::Namespace(_)) && namespace == self.config.namespace
    }

    // ========== Status ==========

    /// Raw status payload of the operator's first Deployment
    pub async fn operator_status(&self, request: &DeploymentRequest) -> Result<JsonValue> {
        let (plan, namespace) = self.plan(request, BTreeMap::new(), None)?;

        let deployment = plan.first_deployment().ok_or_else(|| KubeError::NotFound {
            kind: "Deployment".to_string(),
            message: "failed to find operator deployment object".to_string(),
        })?;

        deployment.status(&self.cluster, &namespace).await
    }

    /// Container statuses of the operator's first pod
    pub async fn status(&self, request: &DeploymentRequest) -> Result<Vec<ContainerStatus>> {
        let payload = self.operator_status(request).await?;
        aggregate_status(&payload)
    }
}
