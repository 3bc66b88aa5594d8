//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands::{self, AgentArgs};

/// Isolated Git agents in containers
#[derive(Parser)]
#[command(
    name = "git-capsulate",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Directory holding the `.capsulate` state directory
    #[arg(long, global = true, env = "CAPSULATE_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an agent
    Create(commands::create::CreateArgs),

    /// Destroy an agent
    Destroy(commands::destroy::DestroyArgs),

    /// Run a shell command in an agent's working tree
    Exec(commands::exec::ExecArgs),

    /// Create a branch in an agent
    Branch(commands::branch::BranchArgs),

    /// Check out a branch in an agent
    Checkout(commands::branch::CheckoutArgs),

    /// Show an agent's Git status
    Status(AgentArgs),

    /// List agents
    List,

    /// List the dependencies an agent resolves
    ListDeps(AgentArgs),

    /// Add a dependency to an agent's own tier
    AddDep(commands::deps::AddDepArgs),

    /// Re-link shared dependencies inside an agent
    SyncDeps(AgentArgs),

    /// Show an agent's overlay filesystem status
    OverlayStatus(AgentArgs),

    /// Create a team dependency tier
    CreateTeam(commands::deps::CreateTeamArgs),

    /// Add a dependency to a team tier
    AddTeamDep(commands::deps::AddTeamDepArgs),

    /// Add a dependency to the core tier
    AddCoreDep(commands::deps::AddCoreDepArgs),

    /// Show or clear recorded metrics
    #[command(subcommand)]
    Metrics(commands::metrics::MetricsCommand),

    /// Show container resource usage
    #[command(subcommand)]
    Monitor(commands::monitor::MonitorCommand),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// Metrics recorded by the command are flushed whether or not it
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            root,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, root },
        })?;
        let result = dispatch(&app, command).await;
        app.flush_metrics();
        result
    }
}

async fn dispatch(app: &AppContext, command: Command) -> Result<ExitCode> {
    match command {
        Command::Create(args) => commands::create::run(app, &args).await,
        Command::Destroy(args) => commands::destroy::run(app, &args).await,
        Command::Exec(args) => commands::exec::run(app, &args).await,
        Command::Branch(args) => commands::branch::run_branch(app, &args).await,
        Command::Checkout(args) => commands::branch::run_checkout(app, &args).await,
        Command::Status(args) => commands::status::run(app, &args).await,
        Command::List => commands::list::run(app).await,
        Command::ListDeps(args) => commands::deps::list(app, &args),
        Command::AddDep(args) => commands::deps::add(app, &args).await,
        Command::SyncDeps(args) => commands::deps::sync(app, &args).await,
        Command::OverlayStatus(args) => commands::overlay::run(app, &args).await,
        Command::CreateTeam(args) => commands::deps::create_team(app, &args),
        Command::AddTeamDep(args) => commands::deps::add_team(app, &args),
        Command::AddCoreDep(args) => commands::deps::add_core(app, &args),
        Command::Metrics(cmd) => commands::metrics::run(app, &cmd),
        Command::Monitor(cmd) => commands::monitor::run(app, &cmd).await,
    }
}
