//! Uninstall command - remove an operator archive's objects from the cluster

use console::style;
use opkit_kube::{AgentConfig, UninstallResult};

use super::{TargetArgs, connect, load_request};
use crate::error::Result;

/// Run the uninstall command
///
/// Per-object failures are reported but never fail the command.
pub async fn run(target: &TargetArgs, config: AgentConfig, json: bool) -> Result<()> {
    let request = load_request(target)?;
    let client = connect(config).await?;
    let report = client.uninstall(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Uninstalling operator for workload {} from namespace {}",
        style("→").blue().bold(),
        style(&request.workload_id).cyan(),
        style(&report.namespace).yellow()
    );

    for outcome in &report.outcomes {
        match &outcome.result {
            UninstallResult::Deleted => {
                println!("  {} {}", style("✓").green(), outcome.display_name())
            }
            UninstallResult::Skipped(reason) => println!(
                "  {} {} ({})",
                style("-").dim(),
                outcome.display_name(),
                style(reason).dim()
            ),
            UninstallResult::Failed(message) => println!(
                "  {} {}: {}",
                style("✗").red(),
                outcome.display_name(),
                message
            ),
        }
    }

    if report.is_success() {
        println!("{} {}", style("✓").green().bold(), report.summary());
    } else {
        println!("{} {}", style("⚠").yellow().bold(), report.summary());
    }

    Ok(())
}
