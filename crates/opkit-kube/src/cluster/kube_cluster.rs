//! Cluster access backed by a live Kubernetes API server

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, ListParams, PostParams},
    core::{GroupVersionKind, Selector},
    discovery::{self, Scope},
};
use std::time::Duration;
use tokio::time::{Instant, sleep};

use super::{ClusterApi, gvk_of, selector_is_empty};
use crate::error::{KubeError, Result};

const CRD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`ClusterApi`] implementation talking to a real cluster
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the default kubeconfig or in-cluster environment
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    /// Resolve a kind to its API endpoint
    ///
    /// Kinds are pinned one at a time so that custom resources whose CRD
    /// was created moments earlier in the same install resolve correctly.
    async fn api_for(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> Result<(Api<DynamicObject>, Scope)> {
        let (resource, capabilities) = discovery::pinned_kind(&self.client, gvk).await?;

        let api = match (&capabilities.scope, namespace) {
            (Scope::Namespaced, Some(ns)) => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            (Scope::Namespaced, None) => Api::default_namespaced_with(self.client.clone(), &resource),
            (Scope::Cluster, _) => Api::all_with(self.client.clone(), &resource),
        };
        Ok((api, capabilities.scope))
    }

    fn crd_api(&self) -> Api<CustomResourceDefinition> {
        Api::all(self.client.clone())
    }
}

/// Whether a CRD reports the `Established` condition as true
fn is_established(crd: &CustomResourceDefinition) -> bool {
    crd.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Established" && c.status == "True")
        })
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn create(&self, namespace: Option<&str>, object: &DynamicObject) -> Result<()> {
        let gvk = gvk_of(object)?;
        let (api, scope) = self.api_for(&gvk, namespace).await?;

        let mut object = object.clone();
        object.metadata.namespace = match scope {
            Scope::Namespaced => namespace.map(str::to_string),
            Scope::Cluster => None,
        };

        api.create(&PostParams::default(), &object).await?;
        Ok(())
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let (api, _) = self.api_for(gvk, namespace).await?;
        api.delete(name, &DeleteParams::background()).await?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>> {
        if selector_is_empty(selector) {
            return Ok(Vec::new());
        }

        let selector = Selector::try_from(selector.clone())
            .map_err(|e| KubeError::InvalidConfig(format!("invalid pod selector: {}", e)))?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&ListParams::default().labels(&selector.to_string()))
            .await?;
        Ok(pods.items)
    }

    async fn wait_for_crd(&self, name: &str, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Ok(());
        }

        let api = self.crd_api();
        let deadline = Instant::now() + timeout;

        loop {
            match api.get_opt(name).await? {
                Some(crd) if is_established(&crd) => return Ok(()),
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(KubeError::Timeout(format!(
                    "{:?} waiting for CRD {} to be established",
                    timeout, name
                )));
            }
            sleep(CRD_POLL_INTERVAL).await;
        }
    }
}
