//! Install command - deploy an operator archive into the cluster

use console::style;
use opkit_kube::{AgentConfig, InstallOptions};
use std::time::Duration;

use super::{InstallArgs, collect_env, connect, load_request};
use crate::error::Result;

/// Run the install command
pub async fn run(args: &InstallArgs, config: AgentConfig) -> Result<()> {
    let request = load_request(&args.target)?;
    let env_vars = collect_env(&args.env, args.env_file.as_deref())?;

    let mut options = InstallOptions::new().with_env_vars(env_vars);
    if let Some(secs) = args.cr_timeout {
        options = options.with_cr_install_timeout(Duration::from_secs(secs));
    }

    if !args.json {
        println!(
            "{} Installing operator for workload {}",
            style("→").blue().bold(),
            style(&request.workload_id).cyan()
        );
    }

    let client = connect(config).await?;
    let report = client.install(&request, &options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.synthesized_namespace {
        println!(
            "  {} created namespace {}",
            style("+").green(),
            style(&report.namespace).yellow()
        );
    }
    for object in &report.installed {
        println!("  {} {}/{}", style("✓").green(), object.kind, object.name);
    }
    for skipped in &report.skipped {
        println!(
            "  {} skipped {} {}",
            style("⚠").yellow(),
            skipped.kind.as_deref().unwrap_or("<empty>"),
            style(skipped.source.as_deref().unwrap_or("")).dim()
        );
    }

    println!(
        "{} Installed {} object(s) into namespace {}",
        style("✓").green().bold(),
        report.installed.len(),
        style(&report.namespace).yellow()
    );

    Ok(())
}
