//! opkit Kube - Cluster-facing stages of the operator deployment pipeline
//!
//! This crate provides:
//! - **Cluster Access**: the `ClusterApi` trait, a `kube`-backed implementation and an in-memory mock
//! - **Object Adapters**: per-kind install, uninstall and status behaviour
//! - **Orchestration**: ordered install, best-effort uninstall, status queries
//! - **Environment Injection**: per-workload config maps referenced from every container
//! - **Status Aggregation**: container lifecycle states of the operator's pod
//! - **Agent Configuration**: node namespace and timeouts

pub mod actions;
pub mod client;
pub mod cluster;
pub mod config;
pub mod env;
pub mod error;
pub mod plan;
pub mod resources;
pub mod status;

pub use actions::{DeploymentRequest, InstallOptions};
pub use client::OperatorClient;
pub use cluster::{ClusterApi, ClusterCall, KubeCluster, MockCluster};
pub use config::AgentConfig;
pub use env::{ENV_CONFIG_PREFIX, ENV_REFERENCE_VAR, EnvBinding};
pub use error::{KubeError, Result};
pub use plan::DeploymentPlan;
pub use resources::{
    CrdObject, DeploymentObject, InstallReport, InstalledObject, ObjectOutcome, OperatorObject,
    UninstallReport, UninstallResult,
};
pub use status::{ContainerState, ContainerStatus, aggregate_status};
