//! opkit CLI - Install, remove and inspect packaged Kubernetes operators

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;

use commands::{InstallArgs, TargetArgs};
use error::{CliError, Result};
use opkit_kube::AgentConfig;

#[derive(Parser)]
#[command(name = "opkit")]
#[command(author = "opkit Contributors")]
#[command(version)]
#[command(about = "Install, remove and inspect packaged Kubernetes operators", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Agent configuration file (default: ~/.config/opkit/agent.yaml)
    #[arg(long, global = true, env = "OPKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace the agent runs in
    #[arg(long, global = true)]
    agent_namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install an operator archive into the cluster
    Install(InstallArgs),

    /// Remove every object of an operator archive from the cluster
    Uninstall {
        #[command(flatten)]
        target: TargetArgs,

        /// Output the uninstall report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show container statuses of the operator's pod
    Status {
        #[command(flatten)]
        target: TargetArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the raw status payload of the operator's Deployment
    OperatorStatus {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Decode and classify an archive without touching the cluster
    Inspect {
        /// File holding the base64 archive text
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build an archive from a directory of manifests
    Pack {
        /// Directory holding .yaml/.yml manifests
        dir: PathBuf,

        /// Output file (if not set, outputs to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Defaults, then the config file, then the environment, then flags
fn load_config(path: Option<&PathBuf>, agent_namespace: Option<String>) -> Result<AgentConfig> {
    let loaded = match path {
        Some(path) => AgentConfig::load_from(path).map(AgentConfig::with_env),
        None => AgentConfig::load(),
    };
    let mut config = loaded.map_err(|e| CliError::Config {
        message: e.to_string(),
    })?;

    if let Some(namespace) = agent_namespace {
        config.namespace = namespace;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install(args) => {
            let config = load_config(cli.config.as_ref(), cli.agent_namespace)?;
            commands::install::run(&args, config).await
        }
        Commands::Uninstall { target, json } => {
            let config = load_config(cli.config.as_ref(), cli.agent_namespace)?;
            commands::uninstall::run(&target, config, json).await
        }
        Commands::Status { target, json } => {
            let config = load_config(cli.config.as_ref(), cli.agent_namespace)?;
            commands::status::run(&target, config, json).await
        }
        Commands::OperatorStatus { target } => {
            let config = load_config(cli.config.as_ref(), cli.agent_namespace)?;
            commands::operator_status::run(&target, config).await
        }
        Commands::Inspect { archive, json } => commands::inspect::run(&archive, json),
        Commands::Pack { dir, output } => commands::pack::run(&dir, output.as_deref()),
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
