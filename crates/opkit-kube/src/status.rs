//! Container status aggregation
//!
//! Normalizes the pod list a Deployment reports into one entry per
//! container of the first pod, in the order the platform lists them.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerState as K8sContainerState, Pod};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{KubeError, Result};

/// Lifecycle state of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "PascalCase")]
pub enum ContainerState {
    Running {
        #[serde(rename = "startedAt")]
        started_at: Option<DateTime<Utc>>,
    },
    Terminated {
        #[serde(rename = "startedAt")]
        started_at: Option<DateTime<Utc>>,
    },
    Waiting,
}

impl ContainerState {
    fn from_k8s(state: Option<&K8sContainerState>) -> Self {
        let Some(state) = state else {
            return ContainerState::Waiting;
        };

        if let Some(running) = &state.running {
            ContainerState::Running {
                started_at: running.started_at.as_ref().map(|t| t.0),
            }
        } else if let Some(terminated) = &state.terminated {
            ContainerState::Terminated {
                started_at: terminated.started_at.as_ref().map(|t| t.0),
            }
        } else {
            ContainerState::Waiting
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Running { .. } => "Running",
            ContainerState::Terminated { .. } => "Terminated",
            ContainerState::Waiting => "Waiting",
        }
    }

    /// Start time, when the state carries one
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ContainerState::Running { started_at } | ContainerState::Terminated { started_at } => {
                *started_at
            }
            ContainerState::Waiting => None,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one container of the workload's pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub image: String,
    #[serde(flatten)]
    pub state: ContainerState,
}

impl ContainerStatus {
    /// Start time as Unix seconds, 0 when not started
    pub fn created_time(&self) -> i64 {
        self.state.started_at().map(|t| t.timestamp()).unwrap_or(0)
    }
}

/// Container statuses of a single pod, in platform order
pub fn container_statuses(pod: &Pod) -> Vec<ContainerStatus> {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .map(|statuses| {
            statuses
                .iter()
                .map(|status| ContainerStatus {
                    name: status.name.clone(),
                    image: status.image.clone(),
                    state: ContainerState::from_k8s(status.state.as_ref()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize a Deployment status payload
///
/// The payload must be a `PodList`-shaped object with an `items` array.
/// An empty list yields an empty result; only the first pod is reported.
pub fn aggregate_status(payload: &JsonValue) -> Result<Vec<ContainerStatus>> {
    let items = payload
        .as_object()
        .filter(|object| {
            object
                .get("kind")
                .and_then(JsonValue::as_str)
                .is_none_or(|kind| kind == "PodList")
        })
        .and_then(|object| object.get("items"))
        .and_then(JsonValue::as_array)
        .ok_or_else(|| KubeError::TypeMismatch {
            expected: "PodList".to_string(),
            message: "deployment status returned unexpected type".to_string(),
        })?;

    let Some(first) = items.first() else {
        return Ok(Vec::new());
    };

    let pod: Pod = serde_json::from_value(first.clone()).map_err(|e| KubeError::TypeMismatch {
        expected: "Pod".to_string(),
        message: e.to_string(),
    })?;

    Ok(container_statuses(&pod))
}

/// Build the status payload for a list of pods
pub fn pod_list_payload(pods: &[Pod]) -> Result<JsonValue> {
    Ok(serde_json::json!({
        "apiVersion": "v1",
        "kind": "PodList",
        "items": serde_json::to_value(pods)?,
    }))
}
