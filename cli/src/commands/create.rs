//! `git-capsulate create` — create and bootstrap a new agent.

use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::Result;
use capsulate_common::DependencyLevel;
use clap::Args;

use crate::app::AppContext;
use crate::domain::AgentConfig;
use crate::output::human::HumanRenderer;
use crate::output::json;
use crate::output::reporter::TerminalReporter;

/// Arguments for the create command.
#[derive(Args)]
pub struct CreateArgs {
    /// Agent id (letters, digits, `_`, `.`, `-`; at most 63 characters)
    pub agent_id: String,

    /// Repository to clone into the agent
    #[arg(long)]
    pub repo: Option<String>,

    /// Branch to clone and check out
    #[arg(long, short)]
    pub branch: Option<String>,

    /// Shallow clone depth (0 = full history)
    #[arg(long, default_value_t = 0)]
    pub depth: u32,

    /// Dependency isolation level
    #[arg(long, value_enum, default_value_t = DependencyLevel::Container)]
    pub level: DependencyLevel,

    /// Team whose dependency tier is linked (requires `--level team`)
    #[arg(long)]
    pub team: Option<String>,

    /// Package the agent resolves from its own tier (repeatable)
    #[arg(long = "override", value_name = "PACKAGE")]
    pub overrides: Vec<String>,

    /// Git config entry `key=value` applied in the working tree (repeatable)
    #[arg(long = "git-config", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub git_config: Vec<(String, String)>,

    /// Use a copy-on-write union mount over the shared base tree
    #[arg(long)]
    pub overlay: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

impl CreateArgs {
    fn to_config(&self) -> AgentConfig {
        AgentConfig {
            repo_url: self.repo.clone(),
            branch: self.branch.clone(),
            depth: self.depth,
            git_config: self.git_config.iter().cloned().collect::<BTreeMap<_, _>>(),
            dependency_level: self.level,
            team_id: self.team.clone(),
            override_dependencies: self.overrides.clone(),
            use_overlay: self.overlay,
            ..AgentConfig::new(self.agent_id.clone())
        }
    }
}

/// Run `git-capsulate create`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the agent cannot be
/// created.
pub async fn run(app: &AppContext, args: &CreateArgs) -> Result<ExitCode> {
    let config = args.to_config();
    let agent = {
        let reporter = TerminalReporter::with_spinner(&app.output);
        app.manager.create(&config, &reporter).await?
    };

    if app.is_json() {
        json::print(&agent)?;
    } else {
        app.output.success(&format!("Agent {} ready", agent.id));
        HumanRenderer::new(&app.output).render_agent(&agent);
        app.output
            .info(&format!("Run: git-capsulate exec {} -- git status", agent.id));
    }
    Ok(ExitCode::SUCCESS)
}
