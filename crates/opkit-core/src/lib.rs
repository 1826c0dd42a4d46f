//! opkit Core - Cluster-free stages of the operator deployment pipeline
//!
//! This crate provides the pieces that never talk to a cluster:
//! - `archive`: base64 + gzip + tar decoding into raw manifest documents
//! - `manifest`: document splitting and four-way kind classification
//! - `registry`: the known kind/version table, base kinds and danger kinds
//! - `value`: generic attribute trees with string-keyed mappings
//! - `namespace`: effective namespace precedence

pub mod archive;
pub mod error;
pub mod manifest;
pub mod namespace;
pub mod registry;
pub mod value;

pub use archive::{RawDocument, create_archive, extract_documents, pack_directory};
pub use error::{CoreError, Result};
pub use manifest::{
    Classification, ClassifiedObject, KindDescriptor, ObjectGroups, SkipReason, SkippedDocument,
    TypedObject, UnstructuredObject, UnstructuredOrigin, classify, split_documents,
};
pub use namespace::{DEFAULT_AGENT_NAMESPACE, declared_namespace, resolve_namespace};
pub use registry::{BaseKind, is_base_kind, is_danger_kind, is_registered};
pub use value::{normalize_yaml, parse_generic};
