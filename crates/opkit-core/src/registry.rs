//! Known kind/version table
//!
//! Documents whose `(apiVersion, kind)` appear here decode successfully;
//! everything else is treated as a custom resource candidate. Of the known
//! kinds, a fixed set of *base kinds* keeps a typed representation and a
//! small set of *danger kinds* is skipped outright.

use std::fmt;

/// Kinds handled explicitly with a typed representation
///
/// The declaration order is the install order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseKind {
    Namespace,
    Role,
    RoleBinding,
    Deployment,
    ServiceAccount,
    CustomResourceDefinition,
}

impl BaseKind {
    /// Install order for base kinds
    pub const INSTALL_ORDER: [BaseKind; 6] = [
        BaseKind::Namespace,
        BaseKind::Role,
        BaseKind::RoleBinding,
        BaseKind::Deployment,
        BaseKind::ServiceAccount,
        BaseKind::CustomResourceDefinition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseKind::Namespace => "Namespace",
            BaseKind::Role => "Role",
            BaseKind::RoleBinding => "RoleBinding",
            BaseKind::Deployment => "Deployment",
            BaseKind::ServiceAccount => "ServiceAccount",
            BaseKind::CustomResourceDefinition => "CustomResourceDefinition",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::INSTALL_ORDER
            .into_iter()
            .find(|base| base.as_str() == kind)
    }

    /// Base kinds in reverse install order
    pub fn uninstall_order() -> impl Iterator<Item = BaseKind> {
        Self::INSTALL_ORDER.into_iter().rev()
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered apiVersions and the kinds each one serves
///
/// Only the GA versions served by current clusters are listed. Retired betas
/// such as `apiextensions.k8s.io/v1beta1` or `rbac.authorization.k8s.io/v1beta1`
/// are not registered, so those documents go through the custom resource path
/// and reach the cluster unchanged.
const REGISTERED: &[(&str, &[&str])] = &[
    (
        "v1",
        &[
            "Namespace",
            "ServiceAccount",
            "ConfigMap",
            "Secret",
            "Service",
            "Pod",
            "PersistentVolume",
            "PersistentVolumeClaim",
            "ResourceQuota",
            "LimitRange",
            "Endpoints",
            "ReplicationController",
        ],
    ),
    (
        "apps/v1",
        &[
            "Deployment",
            "StatefulSet",
            "DaemonSet",
            "ReplicaSet",
            "ControllerRevision",
        ],
    ),
    ("batch/v1", &["Job", "CronJob"]),
    (
        "rbac.authorization.k8s.io/v1",
        &["Role", "RoleBinding", "ClusterRole", "ClusterRoleBinding"],
    ),
    (
        "networking.k8s.io/v1",
        &["Ingress", "IngressClass", "NetworkPolicy"],
    ),
    ("policy/v1", &["PodDisruptionBudget"]),
    ("autoscaling/v1", &["HorizontalPodAutoscaler"]),
    ("autoscaling/v2", &["HorizontalPodAutoscaler"]),
    (
        "storage.k8s.io/v1",
        &["StorageClass", "VolumeAttachment", "CSIDriver"],
    ),
    ("scheduling.k8s.io/v1", &["PriorityClass"]),
    ("apiextensions.k8s.io/v1", &["CustomResourceDefinition"]),
    (
        "operators.coreos.com/v1",
        &["OperatorGroup", "OperatorCondition"],
    ),
    (
        "operators.coreos.com/v1alpha1",
        &[
            "Subscription",
            "ClusterServiceVersion",
            "CatalogSource",
            "InstallPlan",
        ],
    ),
];

/// Kinds the registry recognizes but that cannot be converted to a
/// generic object safely
const DANGER_KINDS: &[&str] = &["OperatorGroup"];

/// Whether a `(apiVersion, kind)` pair decodes against the registry
pub fn is_registered(api_version: &str, kind: &str) -> bool {
    REGISTERED
        .iter()
        .any(|(version, kinds)| *version == api_version && kinds.contains(&kind))
}

pub fn is_base_kind(kind: &str) -> bool {
    BaseKind::from_kind(kind).is_some()
}

pub fn is_danger_kind(kind: &str) -> bool {
    DANGER_KINDS.contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_order() {
        let names: Vec<_> = BaseKind::INSTALL_ORDER.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Namespace",
                "Role",
                "RoleBinding",
                "Deployment",
                "ServiceAccount",
                "CustomResourceDefinition"
            ]
        );
    }

    #[test]
    fn test_uninstall_order_is_reversed() {
        let order: Vec<_> = BaseKind::uninstall_order().collect();
        assert_eq!(order.first(), Some(&BaseKind::CustomResourceDefinition));
        assert_eq!(order.last(), Some(&BaseKind::Namespace));
    }

    #[test]
    fn test_from_kind_roundtrip() {
        for kind in BaseKind::INSTALL_ORDER {
            assert_eq!(BaseKind::from_kind(kind.as_str()), Some(kind));
        }
        assert_eq!(BaseKind::from_kind("ConfigMap"), None);
        assert_eq!(BaseKind::from_kind("deployment"), None);
    }

    #[test]
    fn test_registered_pairs() {
        assert!(is_registered("apps/v1", "Deployment"));
        assert!(is_registered("v1", "ConfigMap"));
        assert!(is_registered("operators.coreos.com/v1", "OperatorGroup"));
        // Right kind, wrong group
        assert!(!is_registered("v1", "Deployment"));
        assert!(!is_registered("example.com/v1", "Widget"));
    }

    #[test]
    fn test_retired_beta_versions_are_not_registered() {
        assert!(!is_registered(
            "apiextensions.k8s.io/v1beta1",
            "CustomResourceDefinition"
        ));
        assert!(!is_registered("rbac.authorization.k8s.io/v1beta1", "Role"));
        assert!(!is_registered("extensions/v1beta1", "Deployment"));
    }

    #[test]
    fn test_danger_kinds() {
        assert!(is_danger_kind("OperatorGroup"));
        assert!(!is_danger_kind("Subscription"));
        assert!(!is_base_kind("OperatorGroup"));
    }
}
