//! `git-capsulate destroy` — stop and remove an agent.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::output::json;

/// Arguments for the destroy command.
#[derive(Args)]
pub struct DestroyArgs {
    /// Agent id
    pub agent_id: String,
}

/// Run `git-capsulate destroy`.
///
/// # Errors
///
/// Returns an error if the agent is unknown or its container cannot be
/// removed.
pub async fn run(app: &AppContext, args: &DestroyArgs) -> Result<ExitCode> {
    let id = args.agent_id.as_str();
    let prompt = format!("Destroy agent {id}? Its workspace will be deleted.");
    if !app.is_json() && !app.confirm(&prompt, true)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    app.manager.destroy(id).await?;

    if app.is_json() {
        json::print(&serde_json::json!({ "agent_id": id, "destroyed": true }))?;
    } else {
        app.output.success(&format!("Agent {id} destroyed"));
    }
    Ok(ExitCode::SUCCESS)
}
