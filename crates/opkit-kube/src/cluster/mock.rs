//! Mock cluster for testing
//!
//! Objects are kept in memory and every call is recorded, so tests can
//! assert both the resulting cluster state and the exact call order
//! without a Kubernetes cluster.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use super::{ClusterApi, gvk_of, selector_matches, selector_string};
use crate::error::{KubeError, Result};

/// One call made against the mock, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    Create {
        kind: String,
        name: String,
        namespace: Option<String>,
    },
    Delete {
        kind: String,
        name: String,
        namespace: Option<String>,
    },
    ListPods {
        namespace: String,
        selector: String,
    },
    WaitForCrd {
        name: String,
        timeout: Duration,
    },
}

impl ClusterCall {
    /// `(kind, name)` of a create or delete call
    pub fn object(&self) -> Option<(&str, &str)> {
        match self {
            ClusterCall::Create { kind, name, .. } | ClusterCall::Delete { kind, name, .. } => {
                Some((kind, name))
            }
            _ => None,
        }
    }
}

/// Key of a stored object: kind, namespace, name
type ObjectKey = (String, Option<String>, String);

#[derive(Default)]
struct MockState {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    pods: BTreeMap<String, Vec<Pod>>,
    calls: Vec<ClusterCall>,
    failing_creates: HashSet<(String, String)>,
    failing_deletes: HashSet<(String, String)>,
}

/// In-memory cluster for testing
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<RwLock<MockState>>,
}

impl MockCluster {
    /// Create a new empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate pods returned by `list_pods`
    pub fn with_pods(self, namespace: &str, pods: Vec<Pod>) -> Self {
        self.write()
            .pods
            .entry(namespace.to_string())
            .or_default()
            .extend(pods);
        self
    }

    /// Make every create of `kind`/`name` fail with a server error
    pub fn fail_create_of(self, kind: &str, name: &str) -> Self {
        self.write()
            .failing_creates
            .insert((kind.to_string(), name.to_string()));
        self
    }

    /// Make every delete of `kind`/`name` fail with a server error
    pub fn fail_delete_of(self, kind: &str, name: &str) -> Self {
        self.write()
            .failing_deletes
            .insert((kind.to_string(), name.to_string()));
        self
    }

    /// Store an object as if it had been created earlier
    pub fn insert(&self, namespace: Option<&str>, object: DynamicObject) -> Result<()> {
        let key = Self::key_of(namespace, &object)?;
        self.write().objects.insert(key, object);
        Ok(())
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.read().calls.clone()
    }

    /// Create calls made so far, as `(kind, name)`
    pub fn created(&self) -> Vec<(String, String)> {
        self.read()
            .calls
            .iter()
            .filter_map(|call| match call {
                ClusterCall::Create { kind, name, .. } => Some((kind.clone(), name.clone())),
                _ => None,
            })
            .collect()
    }

    /// Delete calls made so far, as `(kind, name)`
    pub fn deleted(&self) -> Vec<(String, String)> {
        self.read()
            .calls
            .iter()
            .filter_map(|call| match call {
                ClusterCall::Delete { kind, name, .. } => Some((kind.clone(), name.clone())),
                _ => None,
            })
            .collect()
    }

    /// Fetch a stored object
    pub fn get(&self, kind: &str, namespace: Option<&str>, name: &str) -> Option<DynamicObject> {
        let key = (
            kind.to_string(),
            namespace.map(str::to_string),
            name.to_string(),
        );
        self.read().objects.get(&key).cloned()
    }

    /// Whether an object is stored
    pub fn contains(&self, kind: &str, namespace: Option<&str>, name: &str) -> bool {
        self.get(kind, namespace, name).is_some()
    }

    /// Number of stored objects
    pub fn object_count(&self) -> usize {
        self.read().objects.len()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        self.write().calls.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_of(namespace: Option<&str>, object: &DynamicObject) -> Result<ObjectKey> {
        let gvk = gvk_of(object)?;
        let name = object.metadata.name.clone().ok_or_else(|| {
            KubeError::InvalidConfig(format!("{} missing metadata.name", gvk.kind))
        })?;
        Ok((gvk.kind, namespace.map(str::to_string), name))
    }

    fn rejected(operation: &str, kind: &str, name: &str, code: u16, message: &str) -> KubeError {
        KubeError::Rejected {
            operation: operation.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            code,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn create(&self, namespace: Option<&str>, object: &DynamicObject) -> Result<()> {
        let key = Self::key_of(namespace, object)?;
        let mut state = self.write();
        state.calls.push(ClusterCall::Create {
            kind: key.0.clone(),
            name: key.2.clone(),
            namespace: key.1.clone(),
        });

        if state
            .failing_creates
            .contains(&(key.0.clone(), key.2.clone()))
        {
            return Err(Self::rejected("create", &key.0, &key.2, 500, "injected failure"));
        }
        if state.objects.contains_key(&key) {
            return Err(Self::rejected("create", &key.0, &key.2, 409, "already exists"));
        }

        let mut stored = object.clone();
        stored.metadata.namespace = namespace.map(str::to_string);
        state.objects.insert(key, stored);
        Ok(())
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let key = (
            gvk.kind.clone(),
            namespace.map(str::to_string),
            name.to_string(),
        );
        let mut state = self.write();
        state.calls.push(ClusterCall::Delete {
            kind: key.0.clone(),
            name: key.2.clone(),
            namespace: key.1.clone(),
        });

        if state
            .failing_deletes
            .contains(&(key.0.clone(), key.2.clone()))
        {
            return Err(Self::rejected("delete", &key.0, name, 500, "injected failure"));
        }

        match state.objects.remove(&key) {
            Some(_) => Ok(()),
            None => Err(Self::rejected("delete", &key.0, name, 404, "not found")),
        }
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>> {
        let mut state = self.write();
        state.calls.push(ClusterCall::ListPods {
            namespace: namespace.to_string(),
            selector: selector_string(selector),
        });

        let empty = BTreeMap::new();
        Ok(state
            .pods
            .get(namespace)
            .map(|pods| {
                pods.iter()
                    .filter(|pod| {
                        selector_matches(selector, pod.metadata.labels.as_ref().unwrap_or(&empty))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn wait_for_crd(&self, name: &str, timeout: Duration) -> Result<()> {
        let mut state = self.write();
        state.calls.push(ClusterCall::WaitForCrd {
            name: name.to_string(),
            timeout,
        });

        if timeout.is_zero() {
            return Ok(());
        }

        let key = (
            "CustomResourceDefinition".to_string(),
            None,
            name.to_string(),
        );
        if state.objects.contains_key(&key) {
            Ok(())
        } else {
            Err(KubeError::Timeout(format!(
                "{:?} waiting for CRD {} to be established",
                timeout, name
            )))
        }
    }
}
