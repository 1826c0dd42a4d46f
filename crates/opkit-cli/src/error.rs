//! CLI error types with exit code handling
//!
//! Every failure the CLI can report is mapped to one variant, and every
//! variant to an exit code.

use miette::Diagnostic;
use opkit_kube::KubeError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The archive or one of its manifests could not be decoded
    #[error("Processing failed: {message}")]
    #[diagnostic(
        code(opkit::cli::processing),
        help("check that the archive is base64 text of a gzip-compressed tar of YAML files")
    )]
    Processing { message: String },

    /// The cluster rejected a call or could not be reached
    #[error("Cluster error: {message}")]
    #[diagnostic(code(opkit::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cross-namespace deployment refused
    #[error("{message}")]
    #[diagnostic(
        code(opkit::cli::namespace),
        help("deploy into the agent's own namespace, or run the agent in the default namespace")
    )]
    NamespaceConflict { message: String },

    /// Something the command needs is absent
    #[error("{message}")]
    #[diagnostic(code(opkit::cli::not_found))]
    NotFound { message: String },

    /// Invalid agent configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(opkit::cli::config))]
    Config { message: String },

    /// Invalid command line input
    #[error("Invalid input: {message}")]
    #[diagnostic(code(opkit::cli::usage))]
    Usage { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(opkit::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(opkit::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Processing { .. } => exit_codes::PROCESSING_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::NamespaceConflict { .. } => exit_codes::NAMESPACE_CONFLICT,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an input error (user provided invalid input)
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<opkit_core::CoreError> for CliError {
    fn from(err: opkit_core::CoreError) -> Self {
        CliError::Processing {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(err.to_string())
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::Processing(core) => core.into(),
            KubeError::NamespaceConflict { .. } => CliError::NamespaceConflict { message },
            KubeError::NotFound { .. } => CliError::NotFound { message },
            KubeError::InvalidConfig(_) => CliError::Config { message },
            KubeError::Io(e) => e.into(),
            KubeError::ConfigCreation { .. } => CliError::Cluster {
                message,
                help: Some(
                    "an environment config map for this workload already exists; uninstall it first"
                        .to_string(),
                ),
            },
            e if e.is_cluster_error() || matches!(e, KubeError::Timeout(_)) => CliError::Cluster {
                message,
                help: None,
            },
            _ => CliError::Internal { message },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
