//! `git-capsulate status` — Git status of one agent.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Run `git-capsulate status`.
///
/// # Errors
///
/// Returns an error if the agent is not running or git fails.
pub async fn run(app: &AppContext, args: &AgentArgs) -> Result<ExitCode> {
    let status = app.manager.git_status(&args.agent_id).await?;
    if app.is_json() {
        json::print(&status)?;
    } else {
        HumanRenderer::new(&app.output).render_git_status(&args.agent_id, &status);
    }
    Ok(ExitCode::SUCCESS)
}
