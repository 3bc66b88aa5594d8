//! `git-capsulate overlay-status` — union-mount state of an agent.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Run `git-capsulate overlay-status`.
///
/// # Errors
///
/// Returns an error if the agent is not running.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<ExitCode> {
    let overlay = app.manager.overlay_status(&args.agent_id).await?;
    if app.is_json() {
        json::print(&overlay)?;
    } else {
        HumanRenderer::new(&app.output).render_overlay(&args.agent_id, &overlay);
    }
    Ok(ExitCode::SUCCESS)
}
