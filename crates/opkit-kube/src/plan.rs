//! Deployment plans
//!
//! A plan is the decoded archive turned into [`OperatorObject`]s, grouped
//! by kind, with the install and uninstall sequences derived from it.

use indexmap::IndexMap;
use opkit_core::{BaseKind, Classification, SkippedDocument, TypedObject};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

use crate::env::EnvBinding;
use crate::error::Result;
use crate::resources::{CrdObject, DeploymentObject, OperatorObject};

/// Objects of one archive, ready to be installed or removed
#[derive(Debug, Clone, Default)]
pub struct DeploymentPlan {
    typed: IndexMap<BaseKind, Vec<OperatorObject>>,
    unstructured: Vec<OperatorObject>,
    skipped: Vec<SkippedDocument>,
    declared_namespace: String,
}

impl DeploymentPlan {
    /// Decode an archive and build its plan
    pub fn prepare(
        archive: &str,
        metadata: &HashMap<String, JsonValue>,
        env: &EnvBinding,
        cr_install_timeout: Duration,
    ) -> Result<Self> {
        let documents = opkit_core::extract_documents(archive)?;
        let classification = opkit_core::classify(&documents)?;
        Ok(Self::build(classification, metadata, env, cr_install_timeout))
    }

    /// Build a plan from classified objects
    pub fn build(
        classification: Classification,
        metadata: &HashMap<String, JsonValue>,
        env: &EnvBinding,
        cr_install_timeout: Duration,
    ) -> Self {
        let declared_namespace =
            opkit_core::declared_namespace(metadata, classification.groups.archive_namespace());
        let (typed_groups, unstructured) = classification.groups.into_parts();

        let mut typed: IndexMap<BaseKind, Vec<OperatorObject>> = IndexMap::new();
        for (kind, objects) in typed_groups {
            let converted = objects
                .into_iter()
                .map(|object| match object {
                    TypedObject::Namespace(ns) => OperatorObject::Namespace(ns),
                    TypedObject::Role(role) => OperatorObject::Role(role),
                    TypedObject::RoleBinding(binding) => OperatorObject::RoleBinding(binding),
                    TypedObject::Deployment(deployment) => {
                        OperatorObject::Deployment(DeploymentObject {
                            deployment,
                            env: env.clone(),
                        })
                    }
                    TypedObject::ServiceAccount(sa) => OperatorObject::ServiceAccount(sa),
                    TypedObject::CustomResourceDefinition(crd) => {
                        OperatorObject::CustomResourceDefinition(CrdObject {
                            crd,
                            install_timeout: cr_install_timeout,
                        })
                    }
                })
                .collect();
            typed.insert(kind, converted);
        }

        Self {
            typed,
            unstructured: unstructured
                .into_iter()
                .map(OperatorObject::Unstructured)
                .collect(),
            skipped: classification.skipped,
            declared_namespace,
        }
    }

    /// Objects of one base kind, in manifest order
    pub fn objects(&self, kind: BaseKind) -> &[OperatorObject] {
        self.typed.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_kind(&self, kind: BaseKind) -> bool {
        !self.objects(kind).is_empty()
    }

    pub fn unstructured(&self) -> &[OperatorObject] {
        &self.unstructured
    }

    /// Documents dropped during classification
    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    /// Namespace declared by the workload, empty when none
    pub fn declared_namespace(&self) -> &str {
        &self.declared_namespace
    }

    /// Add a Namespace object for `name`
    pub fn add_namespace(&mut self, name: &str) {
        self.typed
            .entry(BaseKind::Namespace)
            .or_default()
            .push(OperatorObject::namespace(name));
    }

    /// First Deployment of the archive
    pub fn first_deployment(&self) -> Option<&DeploymentObject> {
        self.objects(BaseKind::Deployment)
            .iter()
            .find_map(|object| match object {
                OperatorObject::Deployment(deployment) => Some(deployment),
                _ => None,
            })
    }

    /// Objects in creation order
    ///
    /// Base kinds follow [`BaseKind::INSTALL_ORDER`]; unstructured objects
    /// come last, in manifest order.
    pub fn install_sequence(&self) -> impl Iterator<Item = &OperatorObject> {
        BaseKind::INSTALL_ORDER
            .into_iter()
            .flat_map(|kind| self.objects(kind))
            .chain(&self.unstructured)
    }

    /// Objects in removal order
    ///
    /// CustomResourceDefinitions go first so their custom resources are
    /// cascaded away, then the remaining base kinds in reverse install
    /// order, then unstructured objects in manifest order.
    pub fn uninstall_sequence(&self) -> impl Iterator<Item = &OperatorObject> {
        let crds = self.objects(BaseKind::CustomResourceDefinition).iter();
        let rest = BaseKind::uninstall_order()
            .filter(|kind| *kind != BaseKind::CustomResourceDefinition)
            .flat_map(|kind| self.objects(kind));

        crds.chain(rest).chain(&self.unstructured)
    }

    pub fn len(&self) -> usize {
        self.typed.values().map(Vec::len).sum::<usize>() + self.unstructured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opkit_core::RawDocument;
    use serde_json::json;

    const BUNDLE: &str = r#"apiVersion: example.com/v1
kind: Widget
metadata:
  name: my-widget
---
apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: widgets.example.com
spec:
  group: example.com
  names:
    kind: Widget
    plural: widgets
  scope: Namespaced
  versions: []
---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: op-sa
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: op
spec:
  selector:
    matchLabels:
      app: op
  template:
    spec:
      containers:
        - name: operator
          image: example/operator:1.0
---
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: op-binding
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: op-role
---
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: op-role
---
apiVersion: v1
kind: Namespace
metadata:
  name: op-ns
"#;

    fn plan() -> DeploymentPlan {
        let classification = opkit_core::classify(&[RawDocument::new("bundle.yaml", BUNDLE)])
            .expect("bundle classifies");
        DeploymentPlan::build(
            classification,
            &HashMap::new(),
            &EnvBinding::new(Default::default(), "ag-1"),
            Duration::from_secs(10),
        )
    }

    fn kinds<'a>(objects: impl Iterator<Item = &'a OperatorObject>) -> Vec<&'a str> {
        objects.map(OperatorObject::kind).collect()
    }

    #[test]
    fn test_install_sequence() {
        assert_eq!(
            kinds(plan().install_sequence()),
            vec![
                "Namespace",
                "Role",
                "RoleBinding",
                "Deployment",
                "ServiceAccount",
                "CustomResourceDefinition",
                "Widget"
            ]
        );
    }

    #[test]
    fn test_uninstall_sequence() {
        assert_eq!(
            kinds(plan().uninstall_sequence()),
            vec![
                "CustomResourceDefinition",
                "ServiceAccount",
                "Deployment",
                "RoleBinding",
                "Role",
                "Namespace",
                "Widget"
            ]
        );
    }

    #[test]
    fn test_declared_namespace_from_archive() {
        assert_eq!(plan().declared_namespace(), "op-ns");
    }

    #[test]
    fn test_declared_namespace_from_metadata() {
        let classification =
            opkit_core::classify(&[RawDocument::new("bundle.yaml", BUNDLE)]).unwrap();
        let metadata = HashMap::from([("namespace".to_string(), json!("meta-ns"))]);
        let plan = DeploymentPlan::build(
            classification,
            &metadata,
            &EnvBinding::default(),
            Duration::ZERO,
        );
        assert_eq!(plan.declared_namespace(), "meta-ns");
    }

    #[test]
    fn test_objects_carry_install_context() {
        let plan = plan();
        let deployment = plan.first_deployment().unwrap();
        assert_eq!(deployment.env.workload_id, "ag-1");

        match &plan.objects(BaseKind::CustomResourceDefinition)[0] {
            OperatorObject::CustomResourceDefinition(crd) => {
                assert_eq!(crd.install_timeout, Duration::from_secs(10))
            }
            other => panic!("unexpected object: {other:?}"),
        }
    }

    #[test]
    fn test_add_namespace() {
        let mut plan = DeploymentPlan::default();
        assert!(!plan.has_kind(BaseKind::Namespace));

        plan.add_namespace("synth");
        assert_eq!(plan.objects(BaseKind::Namespace)[0].name(), "synth");
        assert_eq!(plan.len(), 1);
    }
}
