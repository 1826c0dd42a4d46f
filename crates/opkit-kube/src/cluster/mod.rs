//! Cluster access
//!
//! Every object-level install, uninstall and status call goes through the
//! [`ClusterApi`] trait. Two implementations ship with the crate:
//! - **KubeCluster**: talks to a real API server through `kube`
//! - **MockCluster**: in-memory, records every call for assertions

mod kube_cluster;
mod mock;

pub use kube_cluster::KubeCluster;
pub use mock::{ClusterCall, MockCluster};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::DynamicObject;
use kube::core::{GroupVersionKind, TypeMeta};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{KubeError, Result};

/// Primitive cluster operations the pipeline is built on
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create an object; fails if it already exists
    ///
    /// `namespace` is the target for namespaced kinds and `None` for
    /// cluster-scoped ones.
    async fn create(&self, namespace: Option<&str>, object: &DynamicObject) -> Result<()>;

    /// Delete an object by kind and name
    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()>;

    /// List pods in a namespace matching a label selector
    ///
    /// A selector without labels or expressions selects no pods.
    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>>;

    /// Wait until a CustomResourceDefinition reports `Established`
    ///
    /// A zero timeout returns immediately.
    async fn wait_for_crd(&self, name: &str, timeout: Duration) -> Result<()>;
}

/// Convert a typed object into a `DynamicObject`
pub fn to_dynamic<K: Serialize>(object: &K) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// GroupVersionKind of a typed Kubernetes resource
pub fn gvk_for<K: k8s_openapi::Resource>() -> GroupVersionKind {
    GroupVersionKind::gvk(K::GROUP, K::VERSION, K::KIND)
}

/// GroupVersionKind declared by a dynamic object
pub fn gvk_of(object: &DynamicObject) -> Result<GroupVersionKind> {
    let type_meta = object.types.as_ref().ok_or_else(|| {
        KubeError::InvalidConfig("object has no apiVersion or kind".to_string())
    })?;
    Ok(gvk_from_type_meta(type_meta))
}

/// Split an `apiVersion` into group and version
///
/// Core kinds carry a bare version (`v1`) and map to the empty group.
pub fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = tm
        .api_version
        .rsplit_once('/')
        .unwrap_or(("", tm.api_version.as_str()));

    GroupVersionKind::gvk(group, version, &tm.kind)
}

/// Whether a selector names no label at all
pub fn selector_is_empty(selector: &LabelSelector) -> bool {
    selector.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
        && selector.match_expressions.as_ref().is_none_or(Vec::is_empty)
}

/// Render a label selector in `kubectl` syntax
pub fn selector_string(selector: &LabelSelector) -> String {
    let labels = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(key, value)| format!("{}={}", key, value));
    let expressions = selector.match_expressions.iter().flatten().map(|req| {
        let values = req.values.as_deref().unwrap_or_default().join(",");
        match req.operator.as_str() {
            "In" => format!("{} in ({})", req.key, values),
            "NotIn" => format!("{} notin ({})", req.key, values),
            "Exists" => req.key.clone(),
            "DoesNotExist" => format!("!{}", req.key),
            other => format!("{} {} ({})", req.key, other, values),
        }
    });

    labels.chain(expressions).collect::<Vec<_>>().join(",")
}

/// Match a label set against a selector
///
/// Both `matchLabels` and `matchExpressions` must hold. An empty selector
/// matches nothing. Unknown operators never match.
pub fn selector_matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if selector_is_empty(selector) {
        return false;
    }

    let labels_match = selector
        .match_labels
        .iter()
        .flatten()
        .all(|(key, value)| labels.get(key) == Some(value));

    let expressions_match = selector.match_expressions.iter().flatten().all(|req| {
        let values = req.values.as_deref().unwrap_or_default();
        let current = labels.get(&req.key);
        match req.operator.as_str() {
            "In" => current.is_some_and(|v| values.contains(v)),
            "NotIn" => !current.is_some_and(|v| values.contains(v)),
            "Exists" => current.is_some(),
            "DoesNotExist" => current.is_none(),
            _ => false,
        }
    });

    labels_match && expressions_match
}
