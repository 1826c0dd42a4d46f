//! Per-kind object adapters
//!
//! [`OperatorObject`] is the closed set of things an operator archive can
//! ask the pipeline to create. Each variant knows how to install itself
//! into a namespace, how to remove itself, and which name to report.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use opkit_core::{BaseKind, SkippedDocument, UnstructuredObject};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::cluster::{ClusterApi, gvk_for, gvk_from_type_meta, selector_string, to_dynamic};
use crate::env::{self, EnvBinding};
use crate::error::{KubeError, Result};
use crate::status::pod_list_payload;

/// A Deployment together with the environment bound to its workload
#[derive(Debug, Clone)]
pub struct DeploymentObject {
    pub deployment: Deployment,
    pub env: EnvBinding,
}

impl DeploymentObject {
    /// Label selector matching the pods this Deployment manages
    ///
    /// Empty when the Deployment has no spec; an empty selector lists no pods.
    pub fn pod_selector(&self) -> LabelSelector {
        self.deployment
            .spec
            .as_ref()
            .map(|spec| spec.selector.clone())
            .unwrap_or_default()
    }

    /// Pods backing this Deployment, as a `PodList` payload
    pub async fn status<C: ClusterApi + ?Sized>(
        &self,
        cluster: &C,
        namespace: &str,
    ) -> Result<JsonValue> {
        let selector = self.pod_selector();
        tracing::debug!(
            deployment = self.deployment.metadata.name.as_deref().unwrap_or_default(),
            selector = %selector_string(&selector),
            "listing operator pods"
        );
        let pods = cluster.list_pods(namespace, &selector).await?;
        pod_list_payload(&pods)
    }

    async fn install<C: ClusterApi + ?Sized>(&self, cluster: &C, namespace: &str) -> Result<()> {
        let mut deployment = self.deployment.clone();

        if let Some(config_name) = env::create_env_config(
            cluster,
            &self.env.vars,
            &self.env.workload_id,
            namespace,
            &self.env.prefix,
        )
        .await?
        {
            env::inject_env_reference(&mut deployment, &config_name);
        }

        cluster
            .create(Some(namespace), &to_dynamic(&deployment)?)
            .await
    }

    async fn uninstall<C: ClusterApi + ?Sized>(&self, cluster: &C, namespace: &str) -> Result<()> {
        let name = self.deployment.metadata.name.as_deref().unwrap_or_default();
        let result = cluster
            .delete(&gvk_for::<Deployment>(), Some(namespace), name)
            .await;

        if !self.env.workload_id.is_empty() {
            if let Err(e) =
                env::delete_env_config(cluster, &self.env.workload_id, namespace, &self.env.prefix)
                    .await
            {
                tracing::warn!(
                    workload = %self.env.workload_id,
                    error = %e,
                    "failed to remove environment config map"
                );
            }
        }

        result
    }
}

/// A CustomResourceDefinition and how long to wait for it to be established
#[derive(Debug, Clone)]
pub struct CrdObject {
    pub crd: CustomResourceDefinition,
    pub install_timeout: Duration,
}

/// An object the pipeline can install, remove and report on
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum OperatorObject {
    Namespace(Namespace),
    Role(Role),
    RoleBinding(RoleBinding),
    Deployment(DeploymentObject),
    ServiceAccount(ServiceAccount),
    CustomResourceDefinition(CrdObject),
    Unstructured(UnstructuredObject),
}

impl OperatorObject {
    /// Namespace object named after the namespace it creates
    pub fn namespace(name: &str) -> Self {
        OperatorObject::Namespace(Namespace {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Base kind of this object, `None` for unstructured objects
    pub fn base_kind(&self) -> Option<BaseKind> {
        Some(match self {
            OperatorObject::Namespace(_) => BaseKind::Namespace,
            OperatorObject::Role(_) => BaseKind::Role,
            OperatorObject::RoleBinding(_) => BaseKind::RoleBinding,
            OperatorObject::Deployment(_) => BaseKind::Deployment,
            OperatorObject::ServiceAccount(_) => BaseKind::ServiceAccount,
            OperatorObject::CustomResourceDefinition(_) => BaseKind::CustomResourceDefinition,
            OperatorObject::Unstructured(_) => return None,
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            OperatorObject::Unstructured(object) => object.kind(),
            other => other.base_kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }

    pub fn name(&self) -> &str {
        let name = match self {
            OperatorObject::Namespace(o) => &o.metadata.name,
            OperatorObject::Role(o) => &o.metadata.name,
            OperatorObject::RoleBinding(o) => &o.metadata.name,
            OperatorObject::Deployment(o) => &o.deployment.metadata.name,
            OperatorObject::ServiceAccount(o) => &o.metadata.name,
            OperatorObject::CustomResourceDefinition(o) => &o.crd.metadata.name,
            OperatorObject::Unstructured(o) => return o.name(),
        };
        name.as_deref().unwrap_or_default()
    }

    /// Name the object is created under in `namespace`
    ///
    /// A Namespace object always creates the namespace the workload is
    /// deployed into.
    pub fn target_name<'a>(&'a self, namespace: &'a str) -> &'a str {
        match self {
            OperatorObject::Namespace(_) => namespace,
            other => other.name(),
        }
    }

    /// Create the object; fails if the cluster rejects it
    pub async fn install<C: ClusterApi + ?Sized>(&self, cluster: &C, namespace: &str) -> Result<()> {
        match self {
            OperatorObject::Namespace(ns) => {
                let mut ns = ns.clone();
                ns.metadata.name = Some(namespace.to_string());
                match cluster.create(None, &to_dynamic(&ns)?).await {
                    Err(e) if e.is_conflict() => {
                        tracing::debug!(namespace = %namespace, "namespace already exists");
                        Ok(())
                    }
                    other => other,
                }
            }
            OperatorObject::Role(role) => create_in(cluster, namespace, role).await,
            OperatorObject::RoleBinding(binding) => create_in(cluster, namespace, binding).await,
            OperatorObject::Deployment(deployment) => deployment.install(cluster, namespace).await,
            OperatorObject::ServiceAccount(sa) => create_in(cluster, namespace, sa).await,
            OperatorObject::CustomResourceDefinition(crd) => {
                cluster.create(None, &to_dynamic(&crd.crd)?).await?;
                let name = crd.crd.metadata.name.as_deref().unwrap_or_default();
                cluster.wait_for_crd(name, crd.install_timeout).await
            }
            OperatorObject::Unstructured(object) => {
                let dynamic: DynamicObject = serde_json::from_value(object.to_value())?;
                cluster.create(Some(namespace), &dynamic).await
            }
        }
    }

    /// Delete the object and report what happened
    ///
    /// Never fails: cluster errors become [`UninstallResult::Failed`] and a
    /// missing object becomes [`UninstallResult::Skipped`].
    pub async fn uninstall<C: ClusterApi + ?Sized>(
        &self,
        cluster: &C,
        namespace: &str,
    ) -> UninstallResult {
        let result = match self {
            OperatorObject::Deployment(deployment) => deployment.uninstall(cluster, namespace).await,
            other => match other.gvk() {
                Ok(gvk) => {
                    let target = if other.is_cluster_scoped() {
                        None
                    } else {
                        Some(namespace)
                    };
                    cluster
                        .delete(&gvk, target, other.target_name(namespace))
                        .await
                }
                Err(e) => Err(e),
            },
        };

        match result {
            Ok(()) => UninstallResult::Deleted,
            Err(e) if e.is_not_found() => UninstallResult::Skipped("not found".to_string()),
            Err(e) => UninstallResult::Failed(e.to_string()),
        }
    }

    fn gvk(&self) -> Result<GroupVersionKind> {
        Ok(match self {
            OperatorObject::Namespace(_) => gvk_for::<Namespace>(),
            OperatorObject::Role(_) => gvk_for::<Role>(),
            OperatorObject::RoleBinding(_) => gvk_for::<RoleBinding>(),
            OperatorObject::Deployment(_) => gvk_for::<Deployment>(),
            OperatorObject::ServiceAccount(_) => gvk_for::<ServiceAccount>(),
            OperatorObject::CustomResourceDefinition(_) => gvk_for::<CustomResourceDefinition>(),
            OperatorObject::Unstructured(object) => {
                if object.api_version().is_empty() || object.kind().is_empty() {
                    return Err(KubeError::InvalidConfig(format!(
                        "object '{}' has no apiVersion or kind",
                        object.name()
                    )));
                }
                gvk_from_type_meta(&kube::core::TypeMeta {
                    api_version: object.api_version().to_string(),
                    kind: object.kind().to_string(),
                })
            }
        })
    }

    fn is_cluster_scoped(&self) -> bool {
        matches!(
            self,
            OperatorObject::Namespace(_) | OperatorObject::CustomResourceDefinition(_)
        )
    }
}

async fn create_in<C, K>(cluster: &C, namespace: &str, object: &K) -> Result<()>
where
    C: ClusterApi + ?Sized,
    K: Serialize,
{
    cluster.create(Some(namespace), &to_dynamic(object)?).await
}

/// An object created by an install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledObject {
    pub kind: String,
    pub name: String,
}

/// Result of an install
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    /// Namespace the workload was deployed into
    pub namespace: String,
    /// Objects created, in creation order
    pub installed: Vec<InstalledObject>,
    /// Whether a Namespace object was added because the archive had none
    pub synthesized_namespace: bool,
    /// Documents left out of the install
    pub skipped: Vec<SkippedDocument>,
}

/// What happened to one object during uninstall
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "reason", rename_all = "lowercase")]
pub enum UninstallResult {
    Deleted,
    Skipped(String),
    Failed(String),
}

/// Uninstall outcome of one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectOutcome {
    pub kind: String,
    pub name: String,
    #[serde(flatten)]
    pub result: UninstallResult,
}

impl ObjectOutcome {
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

/// Result of an uninstall, one outcome per attempted object
#[derive(Debug, Clone, Default, Serialize)]
pub struct UninstallReport {
    pub namespace: String,
    pub outcomes: Vec<ObjectOutcome>,
}

impl UninstallReport {
    /// Check if every object was deleted or skipped
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ObjectOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, UninstallResult::Failed(_)))
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let (mut deleted, mut skipped, mut failed) = (0, 0, 0);
        for outcome in &self.outcomes {
            match outcome.result {
                UninstallResult::Deleted => deleted += 1,
                UninstallResult::Skipped(_) => skipped += 1,
                UninstallResult::Failed(_) => failed += 1,
            }
        }

        let mut parts = Vec::with_capacity(3);
        if deleted > 0 {
            parts.push(format!("{} deleted", deleted));
        }
        if failed > 0 {
            parts.push(format!("{} failed", failed));
        }
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }
        if parts.is_empty() {
            "No resources processed".to_string()
        } else {
            parts.join(", ")
        }
    }
}
