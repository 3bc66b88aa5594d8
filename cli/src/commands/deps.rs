//! Dependency commands: `list-deps`, `add-dep`, `sync-deps`, `create-team`,
//! `add-team-dep`, `add-core-dep`.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::AgentArgs;
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Arguments for `add-dep`.
#[derive(Args)]
pub struct AddDepArgs {
    /// Agent id
    pub agent_id: String,
    /// Package name
    pub package: String,
    /// Version recorded in the package's marker file
    #[arg(id = "package_version", value_name = "VERSION", default_value = "latest")]
    pub version: String,
}

/// Arguments for `create-team`.
#[derive(Args)]
pub struct CreateTeamArgs {
    /// Team id
    pub team_id: String,
}

/// Arguments for `add-team-dep`.
#[derive(Args)]
pub struct AddTeamDepArgs {
    /// Team id
    pub team_id: String,
    /// Package name
    pub package: String,
    /// Version recorded in the package's marker file
    #[arg(id = "package_version", value_name = "VERSION", default_value = "latest")]
    pub version: String,
}

/// Arguments for `add-core-dep`.
#[derive(Args)]
pub struct AddCoreDepArgs {
    /// Package name
    pub package: String,
    /// Version recorded in the package's marker file
    #[arg(id = "package_version", value_name = "VERSION", default_value = "latest")]
    pub version: String,
}

/// Run `git-capsulate list-deps`.
///
/// # Errors
///
/// Returns an error if the agent is unknown or a tier cannot be read.
pub fn list(app: &AppContext, args: &AgentArgs) -> Result<ExitCode> {
    let deps = app.manager.list_dependencies(&args.agent_id)?;
    if app.is_json() {
        json::print(&deps)?;
    } else {
        HumanRenderer::new(&app.output).render_dependencies(&args.agent_id, &deps);
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `git-capsulate add-dep`.
///
/// # Errors
///
/// Returns an error if the package name is invalid or the agent is not running.
pub async fn add(app: &AppContext, args: &AddDepArgs) -> Result<ExitCode> {
    let dep = app
        .manager
        .add_dependency(&args.agent_id, &args.package, &args.version)
        .await?;
    if app.is_json() {
        json::print(&dep)?;
    } else {
        app.output.success(&format!(
            "Added {}@{} to agent {}",
            args.package, args.version, args.agent_id
        ));
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `git-capsulate sync-deps`.
///
/// # Errors
///
/// Returns an error if the agent is not running or linking fails.
pub async fn sync(app: &AppContext, args: &AgentArgs) -> Result<ExitCode> {
    let linked = app.manager.sync_dependencies(&args.agent_id).await?;
    if app.is_json() {
        json::print(&serde_json::json!({ "agent_id": args.agent_id, "linked": linked }))?;
    } else {
        app.output
            .success(&format!("Linked {linked} dependencies in agent {}", args.agent_id));
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `git-capsulate create-team`.
///
/// # Errors
///
/// Returns an error if the team id is invalid or its directory cannot be created.
pub fn create_team(app: &AppContext, args: &CreateTeamArgs) -> Result<ExitCode> {
    let dir = app.manager.create_team(&args.team_id)?;
    if app.is_json() {
        json::print(&serde_json::json!({ "team_id": args.team_id, "path": dir }))?;
    } else {
        app.output
            .success(&format!("Team {} ready at {}", args.team_id, dir.display()));
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `git-capsulate add-team-dep`.
///
/// # Errors
///
/// Returns an error if an id or name is invalid or the tier cannot be written.
pub fn add_team(app: &AppContext, args: &AddTeamDepArgs) -> Result<ExitCode> {
    let dir = app
        .manager
        .add_team_dependency(&args.team_id, &args.package, &args.version)?;
    if app.is_json() {
        json::print(&serde_json::json!({
            "team_id": args.team_id,
            "package": args.package,
            "version": args.version,
            "path": dir,
        }))?;
    } else {
        app.output.success(&format!(
            "Added {}@{} to team {}",
            args.package, args.version, args.team_id
        ));
        app.output
            .info("Running agents pick it up with: git-capsulate sync-deps <agent-id>");
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `git-capsulate add-core-dep`.
///
/// # Errors
///
/// Returns an error if the name is invalid or the tier cannot be written.
pub fn add_core(app: &AppContext, args: &AddCoreDepArgs) -> Result<ExitCode> {
    let dir = app
        .manager
        .add_core_dependency(&args.package, &args.version)?;
    if app.is_json() {
        json::print(&serde_json::json!({
            "package": args.package,
            "version": args.version,
            "path": dir,
        }))?;
    } else {
        app.output
            .success(&format!("Added {}@{} to the core tier", args.package, args.version));
    }
    Ok(ExitCode::SUCCESS)
}
