//! Effective namespace resolution

use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Namespace an agent runs in when it is allowed to deploy services
/// into namespaces other than its own
pub const DEFAULT_AGENT_NAMESPACE: &str = "openhorizon-agent";

/// Namespace a workload is deployed into
///
/// The caller's requested namespace wins when non-empty, then the namespace
/// declared by the workload, then the node's own namespace.
pub fn resolve_namespace(requested: &str, declared: &str, node: &str) -> String {
    [requested, declared]
        .into_iter()
        .find(|ns| !ns.is_empty())
        .unwrap_or(node)
        .to_string()
}

/// Namespace declared by the workload's deployment metadata
///
/// Reads the `namespace` key of the caller-supplied metadata map and falls
/// back to `archive_namespace`, the name of a Namespace object shipped in
/// the archive. Returns an empty string when neither is set.
pub fn declared_namespace(
    metadata: &HashMap<String, JsonValue>,
    archive_namespace: Option<&str>,
) -> String {
    metadata
        .get("namespace")
        .and_then(JsonValue::as_str)
        .filter(|ns| !ns.is_empty())
        .or(archive_namespace)
        .unwrap_or_default()
        .to_string()
}
