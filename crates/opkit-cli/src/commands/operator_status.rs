//! Operator-status command - raw status payload of the operator's Deployment

use opkit_kube::AgentConfig;

use super::{TargetArgs, connect, load_request};
use crate::error::Result;

/// Run the operator-status command
pub async fn run(target: &TargetArgs, config: AgentConfig) -> Result<()> {
    let request = load_request(target)?;
    let client = connect(config).await?;
    let payload = client.operator_status(&request).await?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
