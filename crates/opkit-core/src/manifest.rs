//! Manifest decoding and classification
//!
//! Raw documents are split on `---` separator lines, then each unit is
//! decoded against the kind registry and lands in exactly one place:
//!
//! 1. **Unknown kind** (or a document the registry cannot decode): parsed
//!    later as a generic tree; a parse failure here is fatal.
//! 2. **Base kind**: kept typed, grouped under its own kind.
//! 3. **Danger kind**: dropped with a diagnostic.
//! 4. **Any other registered kind**: converted to a generic tree and put in
//!    the unstructured group.

use indexmap::IndexMap;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;
use std::fmt;

use crate::archive::RawDocument;
use crate::error::{CoreError, Result};
use crate::registry::{self, BaseKind};
use crate::value::{normalize_yaml, parse_generic};

/// Resolved apiVersion and kind of a decoded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindDescriptor {
    pub api_version: String,
    pub kind: String,
}

impl KindDescriptor {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for KindDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// A base-kind object with its typed representation
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum TypedObject {
    Namespace(Namespace),
    Role(Role),
    RoleBinding(RoleBinding),
    Deployment(Deployment),
    ServiceAccount(ServiceAccount),
    CustomResourceDefinition(CustomResourceDefinition),
}

impl TypedObject {
    pub fn base_kind(&self) -> BaseKind {
        match self {
            TypedObject::Namespace(_) => BaseKind::Namespace,
            TypedObject::Role(_) => BaseKind::Role,
            TypedObject::RoleBinding(_) => BaseKind::RoleBinding,
            TypedObject::Deployment(_) => BaseKind::Deployment,
            TypedObject::ServiceAccount(_) => BaseKind::ServiceAccount,
            TypedObject::CustomResourceDefinition(_) => BaseKind::CustomResourceDefinition,
        }
    }

    pub fn name(&self) -> &str {
        let name = match self {
            TypedObject::Namespace(o) => &o.metadata.name,
            TypedObject::Role(o) => &o.metadata.name,
            TypedObject::RoleBinding(o) => &o.metadata.name,
            TypedObject::Deployment(o) => &o.metadata.name,
            TypedObject::ServiceAccount(o) => &o.metadata.name,
            TypedObject::CustomResourceDefinition(o) => &o.metadata.name,
        };
        name.as_deref().unwrap_or_default()
    }

    pub fn descriptor(&self) -> KindDescriptor {
        let api_version = match self {
            TypedObject::Namespace(_) | TypedObject::ServiceAccount(_) => "v1",
            TypedObject::Role(_) | TypedObject::RoleBinding(_) => "rbac.authorization.k8s.io/v1",
            TypedObject::Deployment(_) => "apps/v1",
            TypedObject::CustomResourceDefinition(_) => "apiextensions.k8s.io/v1",
        };
        KindDescriptor::new(api_version, self.base_kind().as_str())
    }

    fn decode(kind: BaseKind, value: YamlValue) -> std::result::Result<Self, serde_yaml::Error> {
        Ok(match kind {
            BaseKind::Namespace => TypedObject::Namespace(serde_yaml::from_value(value)?),
            BaseKind::Role => TypedObject::Role(serde_yaml::from_value(value)?),
            BaseKind::RoleBinding => TypedObject::RoleBinding(serde_yaml::from_value(value)?),
            BaseKind::Deployment => TypedObject::Deployment(serde_yaml::from_value(value)?),
            BaseKind::ServiceAccount => {
                TypedObject::ServiceAccount(serde_yaml::from_value(value)?)
            }
            BaseKind::CustomResourceDefinition => {
                TypedObject::CustomResourceDefinition(serde_yaml::from_value(value)?)
            }
        })
    }
}

/// How a document ended up in the unstructured group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnstructuredOrigin {
    /// Kind unknown to the registry, typically an operator's custom resource
    CustomResource,
    /// Registered kind without a typed representation here
    Converted,
}

/// An object carried as a generic string-keyed tree
#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredObject {
    origin: UnstructuredOrigin,
    object: Map<String, JsonValue>,
}

impl UnstructuredObject {
    pub fn new(origin: UnstructuredOrigin, object: Map<String, JsonValue>) -> Self {
        Self { origin, object }
    }

    pub fn origin(&self) -> UnstructuredOrigin {
        self.origin
    }

    pub fn api_version(&self) -> &str {
        self.str_field("apiVersion")
    }

    pub fn kind(&self) -> &str {
        self.str_field("kind")
    }

    pub fn name(&self) -> &str {
        self.metadata_field("name")
    }

    /// Namespace written in the object's own metadata, if any
    pub fn namespace(&self) -> Option<&str> {
        Some(self.metadata_field("namespace")).filter(|ns| !ns.is_empty())
    }

    pub fn descriptor(&self) -> KindDescriptor {
        KindDescriptor::new(self.api_version(), self.kind())
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.object
    }

    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.object.clone())
    }

    fn str_field(&self, key: &str) -> &str {
        self.object
            .get(key)
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }

    fn metadata_field(&self, key: &str) -> &str {
        self.object
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }
}

/// A decoded document, either typed or generic
#[derive(Debug, Clone)]
pub enum ClassifiedObject {
    Typed(TypedObject),
    Unstructured(UnstructuredObject),
}

impl ClassifiedObject {
    pub fn descriptor(&self) -> KindDescriptor {
        match self {
            ClassifiedObject::Typed(o) => o.descriptor(),
            ClassifiedObject::Unstructured(o) => o.descriptor(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ClassifiedObject::Typed(o) => o.name(),
            ClassifiedObject::Unstructured(o) => o.name(),
        }
    }
}

/// Classified objects grouped by kind
///
/// Base kinds are keyed by kind; every other object sits in the
/// unstructured group. Within a group, manifest order is kept.
#[derive(Debug, Clone, Default)]
pub struct ObjectGroups {
    typed: IndexMap<BaseKind, Vec<TypedObject>>,
    unstructured: Vec<UnstructuredObject>,
}

impl ObjectGroups {
    pub fn insert(&mut self, object: ClassifiedObject) {
        match object {
            ClassifiedObject::Typed(typed) => {
                self.typed.entry(typed.base_kind()).or_default().push(typed)
            }
            ClassifiedObject::Unstructured(unstructured) => self.unstructured.push(unstructured),
        }
    }

    /// Objects of one base kind, in manifest order
    pub fn typed(&self, kind: BaseKind) -> &[TypedObject] {
        self.typed.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_kind(&self, kind: BaseKind) -> bool {
        !self.typed(kind).is_empty()
    }

    pub fn unstructured(&self) -> &[UnstructuredObject] {
        &self.unstructured
    }

    /// Custom resources keyed by their declared kind, in first-seen order
    pub fn custom_resources_by_kind(&self) -> IndexMap<&str, Vec<&UnstructuredObject>> {
        let mut by_kind: IndexMap<&str, Vec<&UnstructuredObject>> = IndexMap::new();
        for object in &self.unstructured {
            if object.origin() == UnstructuredOrigin::CustomResource {
                by_kind.entry(object.kind()).or_default().push(object);
            }
        }
        by_kind
    }

    /// Name of the first Namespace object shipped in the archive
    pub fn archive_namespace(&self) -> Option<&str> {
        self.typed(BaseKind::Namespace)
            .first()
            .map(TypedObject::name)
            .filter(|name| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.typed.values().map(Vec::len).sum::<usize>() + self.unstructured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> (IndexMap<BaseKind, Vec<TypedObject>>, Vec<UnstructuredObject>) {
        (self.typed, self.unstructured)
    }
}

/// Why a document was dropped during classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Registered kind that cannot be converted to a generic object
    UnsupportedKind,
    /// Blank or comment-only document
    Empty,
}

/// A document that was dropped without failing the operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub source: Option<String>,
    pub kind: Option<String>,
    pub reason: SkipReason,
}

/// Result of classifying an archive's documents
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub groups: ObjectGroups,
    pub skipped: Vec<SkippedDocument>,
}

/// Split multi-document bodies on `---` separator lines
///
/// Bodies holding a single document are passed through untouched. Each
/// part of a multi-document body is trimmed; blank and comment-only parts
/// are dropped. Relative order is preserved.
pub fn split_documents(documents: &[RawDocument]) -> Vec<RawDocument> {
    let mut units = Vec::with_capacity(documents.len());

    for document in documents {
        let parts = split_on_separators(&document.body);
        if parts.len() > 1 {
            units.extend(
                parts
                    .into_iter()
                    .map(str::trim)
                    .filter(|part| !is_blank(part))
                    .map(|part| RawDocument {
                        name: document.name.clone(),
                        body: part.to_string(),
                    }),
            );
        } else {
            units.push(document.clone());
        }
    }

    units
}

/// Decode and classify raw documents into object groups
///
/// Fails only when a document that the registry could not decode is not
/// even valid generic YAML; unsupported kinds are skipped.
pub fn classify(documents: &[RawDocument]) -> Result<Classification> {
    enum Slot {
        Decoded(ClassifiedObject),
        Candidate(RawDocument),
    }

    let mut slots = Vec::new();
    let mut skipped = Vec::new();

    for unit in split_documents(documents) {
        if is_blank(&unit.body) {
            skipped.push(SkippedDocument {
                source: unit.name.clone(),
                kind: None,
                reason: SkipReason::Empty,
            });
            continue;
        }

        match decode(&unit) {
            Decoded::Unknown => slots.push(Slot::Candidate(unit)),
            Decoded::Typed(typed) => slots.push(Slot::Decoded(ClassifiedObject::Typed(typed))),
            Decoded::Danger(descriptor) => {
                tracing::warn!(
                    kind = %descriptor.kind,
                    source = unit.display_name(),
                    "skipping unsupported kind"
                );
                skipped.push(SkippedDocument {
                    source: unit.name.clone(),
                    kind: Some(descriptor.kind),
                    reason: SkipReason::UnsupportedKind,
                });
            }
            Decoded::Generic(object) => slots.push(Slot::Decoded(ClassifiedObject::Unstructured(
                UnstructuredObject::new(UnstructuredOrigin::Converted, object),
            ))),
        }
    }

    // Custom resource candidates are parsed only once every document has
    // been through the registry.
    let mut groups = ObjectGroups::default();
    for slot in slots {
        let object = match slot {
            Slot::Decoded(object) => object,
            Slot::Candidate(unit) => ClassifiedObject::Unstructured(custom_resource(&unit)?),
        };
        groups.insert(object);
    }

    Ok(Classification { groups, skipped })
}

enum Decoded {
    Unknown,
    Typed(TypedObject),
    Danger(KindDescriptor),
    Generic(Map<String, JsonValue>),
}

fn decode(unit: &RawDocument) -> Decoded {
    let Ok(mut value) = serde_yaml::from_str::<YamlValue>(&unit.body) else {
        return Decoded::Unknown;
    };
    if value.apply_merge().is_err() {
        return Decoded::Unknown;
    }
    let Some(descriptor) = type_meta(&value) else {
        return Decoded::Unknown;
    };
    if !registry::is_registered(&descriptor.api_version, &descriptor.kind) {
        return Decoded::Unknown;
    }

    if let Some(base) = BaseKind::from_kind(&descriptor.kind) {
        if base == BaseKind::Deployment {
            quote_quantities(&mut value);
        }
        match TypedObject::decode(base, value) {
            Ok(typed) => Decoded::Typed(typed),
            Err(e) => {
                tracing::warn!(
                    kind = %descriptor,
                    source = unit.display_name(),
                    error = %e,
                    "typed decode failed, treating as custom resource"
                );
                Decoded::Unknown
            }
        }
    } else if registry::is_danger_kind(&descriptor.kind) {
        Decoded::Danger(descriptor)
    } else {
        match normalize_yaml(value) {
            JsonValue::Object(object) => Decoded::Generic(object),
            _ => Decoded::Unknown,
        }
    }
}

/// Keys whose mapping values are resource quantities
const QUANTITY_MAPS: &[&str] = &["limits", "requests", "overhead"];

/// Keys holding a single resource quantity
const QUANTITY_SCALARS: &[&str] = &["sizeLimit"];

/// Rewrite numeric resource quantities as strings
///
/// The typed API only accepts quantities as strings (`"500m"`, `"1Gi"`),
/// while manifests routinely write bare numbers (`cpu: 1`, `memory: 512`).
fn quote_quantities(value: &mut YamlValue) {
    match value {
        YamlValue::Mapping(mapping) => {
            for (key, child) in mapping.iter_mut() {
                match key.as_str() {
                    Some(k) if QUANTITY_MAPS.contains(&k) => {
                        if let YamlValue::Mapping(quantities) = child {
                            quantities.iter_mut().for_each(|(_, q)| quote_number(q));
                        }
                    }
                    Some(k) if QUANTITY_SCALARS.contains(&k) => quote_number(child),
                    _ => quote_quantities(child),
                }
            }
        }
        YamlValue::Sequence(items) => items.iter_mut().for_each(quote_quantities),
        YamlValue::Tagged(tagged) => quote_quantities(&mut tagged.value),
        _ => {}
    }
}

fn quote_number(value: &mut YamlValue) {
    if let YamlValue::Number(n) = value {
        *value = YamlValue::String(n.to_string());
    }
}

fn custom_resource(unit: &RawDocument) -> Result<UnstructuredObject> {
    let object = parse_generic(&unit.body, unit.name.as_deref())?;
    let resource = UnstructuredObject::new(UnstructuredOrigin::CustomResource, object);

    if resource.kind().is_empty() || resource.api_version().is_empty() {
        return Err(CoreError::manifest(
            unit.name.as_deref(),
            "document has no apiVersion or kind",
        ));
    }

    Ok(resource)
}

fn type_meta(value: &YamlValue) -> Option<KindDescriptor> {
    let api_version = value.get("apiVersion")?.as_str()?;
    let kind = value.get("kind")?.as_str()?;
    Some(KindDescriptor::new(api_version, kind))
}

fn split_on_separators(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        if is_separator(line) {
            parts.push(&body[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    parts.push(&body[start..]);

    parts
}

/// A `---` line, optionally followed by a trailing comment
fn is_separator(line: &str) -> bool {
    match line.trim_end().strip_prefix("---") {
        Some("") => true,
        Some(rest) => rest.starts_with(char::is_whitespace) && rest.trim_start().starts_with('#'),
        None => false,
    }
}

fn is_blank(body: &str) -> bool {
    body.lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#'))
}
