//! `git-capsulate branch` and `git-capsulate checkout`.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::output::json;

/// Arguments for the branch command.
#[derive(Args)]
pub struct BranchArgs {
    /// Agent id
    pub agent_id: String,

    /// New branch name
    pub branch: String,

    /// Switch to the new branch
    #[arg(long, short)]
    pub checkout: bool,
}

/// Arguments for the checkout command.
#[derive(Args)]
pub struct CheckoutArgs {
    /// Agent id
    pub agent_id: String,

    /// Existing branch name
    pub branch: String,
}

/// Run `git-capsulate branch`.
///
/// # Errors
///
/// Returns an error if the branch name is invalid or git fails.
pub async fn run_branch(app: &AppContext, args: &BranchArgs) -> Result<ExitCode> {
    app.manager
        .create_branch(&args.agent_id, &args.branch, args.checkout)
        .await?;
    if app.is_json() {
        json::print(&serde_json::json!({
            "agent_id": args.agent_id,
            "branch": args.branch,
            "checked_out": args.checkout,
        }))?;
    } else if args.checkout {
        app.output
            .success(&format!("Created and checked out {} in {}", args.branch, args.agent_id));
    } else {
        app.output
            .success(&format!("Created branch {} in {}", args.branch, args.agent_id));
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `git-capsulate checkout`.
///
/// # Errors
///
/// Returns an error if the branch name is invalid or git fails.
pub async fn run_checkout(app: &AppContext, args: &CheckoutArgs) -> Result<ExitCode> {
    app.manager
        .checkout_branch(&args.agent_id, &args.branch)
        .await?;
    if app.is_json() {
        json::print(&serde_json::json!({ "agent_id": args.agent_id, "branch": args.branch }))?;
    } else {
        app.output
            .success(&format!("Checked out {} in {}", args.branch, args.agent_id));
    }
    Ok(ExitCode::SUCCESS)
}
