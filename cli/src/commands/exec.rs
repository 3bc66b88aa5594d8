//! `git-capsulate exec` — run a shell command in an agent's working tree.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::output::json;

/// Arguments for the exec command.
#[derive(Args)]
pub struct ExecArgs {
    /// Agent id
    pub agent_id: String,

    /// Command line, run with `/bin/sh -c`
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

/// Run `git-capsulate exec`.
///
/// # Errors
///
/// Returns an error if the agent is not running or the command exits non-zero.
pub async fn run(app: &AppContext, args: &ExecArgs) -> Result<ExitCode> {
    let command = args.command.join(" ");
    let stdout = app.manager.exec(&args.agent_id, &command).await?;
    if app.is_json() {
        json::print(&serde_json::json!({ "agent_id": args.agent_id, "stdout": stdout }))?;
    } else {
        print!("{stdout}");
    }
    Ok(ExitCode::SUCCESS)
}
