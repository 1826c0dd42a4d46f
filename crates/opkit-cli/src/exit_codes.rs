//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Processing error - the archive or a manifest could not be decoded
pub const PROCESSING_ERROR: i32 = 2;

/// Cluster error - the cluster rejected a call or could not be reached
pub const CLUSTER_ERROR: i32 = 3;

/// Namespace conflict - the agent may not deploy into the requested namespace
pub const NAMESPACE_CONFLICT: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Not found - the archive has no operator Deployment
pub const NOT_FOUND: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Configuration error (following sysexits.h convention)
pub const CONFIG_ERROR: i32 = 78;
