//! Status command - container statuses of the operator's pod

use console::style;
use opkit_kube::{AgentConfig, ContainerState};

use super::{TargetArgs, connect, load_request};
use crate::error::Result;

/// Run the status command
pub async fn run(target: &TargetArgs, config: AgentConfig, json: bool) -> Result<()> {
    let request = load_request(target)?;
    let client = connect(config).await?;
    let statuses = client.status(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    if statuses.is_empty() {
        println!("{}", style("No pods found for the operator deployment").dim());
        return Ok(());
    }

    println!("{}", style("CONTAINERS").bold().underlined());
    for status in &statuses {
        let state = match status.state {
            ContainerState::Running { .. } => style(status.state.as_str()).green(),
            ContainerState::Terminated { .. } => style(status.state.as_str()).red(),
            ContainerState::Waiting => style(status.state.as_str()).yellow(),
        };
        let started = status
            .state
            .started_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:<24} {:<10} {:<20} {}",
            style(&status.name).cyan(),
            state,
            started,
            style(&status.image).dim()
        );
    }

    Ok(())
}
