//! `git-capsulate list` — registered agents.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Run `git-capsulate list`.
///
/// Orphaned managed containers (no agent record) are reported as warnings;
/// a runtime that cannot be reached only skips that check.
///
/// # Errors
///
/// Returns an error if JSON output cannot be written.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let agents = app.manager.list_agents();
    if app.is_json() {
        json::print(&agents)?;
        return Ok(ExitCode::SUCCESS);
    }

    HumanRenderer::new(&app.output).render_agent_list(&agents);
    match app.manager.orphans().await {
        Ok(orphans) => {
            for container in orphans {
                app.output.warn(&format!(
                    "Container {} is labelled as an agent but has no record. Remove it: docker rm -f {}",
                    container.name, container.name
                ));
            }
        }
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "orphan check skipped"),
    }
    Ok(ExitCode::SUCCESS)
}
