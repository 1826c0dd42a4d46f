//! CLI commands

pub mod inspect;
pub mod pack;

// Cluster commands
pub mod install;
pub mod operator_status;
pub mod status;
pub mod uninstall;

use clap::Args;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};
use opkit_kube::{AgentConfig, DeploymentRequest, KubeCluster, OperatorClient};

/// Archive and workload a cluster command acts on
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// File holding the base64 archive text
    pub archive: PathBuf,

    /// Workload identifier
    #[arg(short, long)]
    pub workload: String,

    /// Requested namespace (empty: use the archive's, then the agent's)
    #[arg(short, long, default_value = "")]
    pub namespace: String,

    /// YAML or JSON file with deployment metadata
    #[arg(long)]
    pub metadata: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Environment variable for the operator containers (KEY=VALUE)
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// File of KEY=VALUE lines
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Seconds to wait for each CRD to become established (0: do not wait)
    #[arg(long, value_name = "SECONDS")]
    pub cr_timeout: Option<u64>,

    /// Output the install report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Read an archive file, trimming surrounding whitespace
pub fn read_archive(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::Io {
        message: format!("failed to read archive {}: {}", path.display(), e),
    })?;
    Ok(text.trim().to_string())
}

fn read_metadata(path: &Path) -> Result<HashMap<String, JsonValue>> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_yaml::from_str(&text).map_err(|e| {
        CliError::usage(format!("invalid metadata file {}: {}", path.display(), e))
    })
}

/// Build a deployment request from command line targets
pub fn load_request(target: &TargetArgs) -> Result<DeploymentRequest> {
    let archive = read_archive(&target.archive)?;
    let mut request =
        DeploymentRequest::new(archive, target.workload.clone()).with_namespace(&target.namespace);

    if let Some(path) = &target.metadata {
        request = request.with_metadata(read_metadata(path)?);
    }

    Ok(request)
}

/// Parse a single KEY=VALUE pair
pub fn parse_env(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::usage(format!(
            "invalid environment variable '{}': expected KEY=VALUE",
            pair
        ))),
    }
}

/// Collect environment variables from an optional file, then flags
///
/// Flags win over file entries with the same key.
pub fn collect_env(pairs: &[String], file: Option<&Path>) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();

    if let Some(path) = file {
        let text = std::fs::read_to_string(path)?;
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = parse_env(line)?;
            vars.insert(key, value);
        }
    }

    for pair in pairs {
        let (key, value) = parse_env(pair)?;
        vars.insert(key, value);
    }

    Ok(vars)
}

/// Connect to the cluster from the default kubeconfig
pub async fn connect(config: AgentConfig) -> Result<OperatorClient<KubeCluster>> {
    let cluster = KubeCluster::try_default().await.map_err(|e| CliError::Cluster {
        message: e.to_string(),
        help: Some("check your kubeconfig or in-cluster service account".to_string()),
    })?;
    Ok(OperatorClient::new(cluster, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env() {
        assert_eq!(
            parse_env("LOG_LEVEL=debug").unwrap(),
            ("LOG_LEVEL".to_string(), "debug".to_string())
        );
        assert_eq!(
            parse_env("URL=http://x?a=b").unwrap(),
            ("URL".to_string(), "http://x?a=b".to_string())
        );
        assert_eq!(parse_env("EMPTY=").unwrap().1, "");
        assert!(parse_env("novalue").is_err());
        assert!(parse_env("=value").is_err());
    }

    #[test]
    fn test_collect_env_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env");
        std::fs::write(&path, "# comment\nA=file\n\nB=file\n").unwrap();

        let vars = collect_env(&["A=flag".to_string()], Some(&path)).unwrap();
        assert_eq!(vars["A"], "flag");
        assert_eq!(vars["B"], "file");
    }

    #[test]
    fn test_load_request_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive.b64");
        let metadata = dir.path().join("meta.yaml");
        std::fs::write(&archive, "  H4sIAAAA\n").unwrap();
        std::fs::write(&metadata, "namespace: widgets\nreplicas: 2\n").unwrap();

        let target = TargetArgs {
            archive,
            workload: "wl-1".to_string(),
            namespace: String::new(),
            metadata: Some(metadata),
        };
        let request = load_request(&target).unwrap();

        assert_eq!(request.archive, "H4sIAAAA");
        assert_eq!(request.workload_id, "wl-1");
        assert_eq!(request.metadata["namespace"], "widgets");
        assert_eq!(request.metadata["replicas"], 2);
    }
}
