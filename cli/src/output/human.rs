//! Human-readable terminal renderer.

use capsulate_common::{ContainerStats, GitStatus, MetricsSummary, OverlayStatus, ResolvedDependency};
use owo_colors::OwoColorize as _;

use crate::domain::Agent;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// One line per agent.
    pub fn render_agent_list(&self, agents: &[Agent]) {
        if agents.is_empty() {
            if !self.ctx.quiet {
                println!("No agents. Create one: git-capsulate create <agent-id>");
            }
            return;
        }
        println!(
            "  {:<24} {:<10} {:<20} {:<10} {}",
            "AGENT".style(self.ctx.styles.bold),
            "STATE".style(self.ctx.styles.bold),
            "BRANCH".style(self.ctx.styles.bold),
            "DEPS".style(self.ctx.styles.bold),
            "MODE".style(self.ctx.styles.bold),
        );
        for agent in agents {
            let deps = match &agent.team_id {
                Some(team) => format!("{}:{team}", agent.dependency_level),
                None => agent.dependency_level.to_string(),
            };
            let mode = if agent.use_overlay { "overlay" } else { "direct" };
            println!(
                "  {:<24} {:<10} {:<20} {:<10} {mode}",
                agent.id,
                self.ctx.state(agent.state),
                agent.branch.style(self.ctx.styles.branch),
                deps,
            );
        }
    }

    /// Details printed after a successful create.
    pub fn render_agent(&self, agent: &Agent) {
        self.ctx.kv("Agent:     ", &agent.id);
        self.ctx.kv("Container: ", &agent.container_id);
        self.ctx.kv("Branch:    ", &agent.branch);
        self.ctx.kv("Deps:      ", agent.dependency_level.as_str());
        if let Some(team) = &agent.team_id {
            self.ctx.kv("Team:      ", team);
        }
        self.ctx.kv("Workspace: ", &agent.host_workspace.display().to_string());
    }

    pub fn render_git_status(&self, agent_id: &str, status: &GitStatus) {
        self.ctx.header(&format!("Agent {agent_id}"));
        self.ctx.kv("Branch:  ", &status.branch.style(self.ctx.styles.branch).to_string());
        self.ctx.kv("Commit:  ", &status.current_commit);
        if status.ahead_count > 0 || status.behind_count > 0 {
            self.ctx.kv(
                "Upstream:",
                &format!("{} ahead, {} behind", status.ahead_count, status.behind_count),
            );
        }
        if status.is_clean() {
            self.ctx.success("Working tree clean");
            return;
        }
        for file in &status.modified_files {
            println!("    {} {file}", "M".style(self.ctx.styles.warning));
        }
        for file in &status.untracked_files {
            println!("    {} {file}", "?".style(self.ctx.styles.dim));
        }
    }

    pub fn render_dependencies(&self, agent_id: &str, deps: &[ResolvedDependency]) {
        if deps.is_empty() {
            self.ctx.info(&format!("No dependencies visible to agent {agent_id}"));
            return;
        }
        for dep in deps {
            let version = dep.version.as_deref().unwrap_or("-");
            let marker = if dep.overridden { "  (override)" } else { "" };
            println!(
                "  {:<32} {:<12} {}{marker}",
                dep.name,
                version,
                dep.tier.style(self.ctx.styles.dim),
            );
        }
    }

    pub fn render_overlay(&self, agent_id: &str, overlay: &OverlayStatus) {
        if !overlay.enabled {
            self.ctx.info(&format!("Overlay filesystem not active for agent {agent_id}"));
            return;
        }
        self.ctx.success(&format!("Overlay filesystem active for agent {agent_id}"));
        let count = |n: Option<u64>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
        self.ctx.kv("Base files:  ", &count(overlay.base_files));
        self.ctx.kv("Diff files:  ", &count(overlay.diff_files));
        self.ctx.kv("Merged files:", &count(overlay.merged_files));
    }

    pub fn render_stats(&self, stats: &[ContainerStats]) {
        if stats.is_empty() {
            self.ctx.info("No running agent containers");
            return;
        }
        println!(
            "  {:<24} {:>8} {:>12} {:>8} {:>12} {:>12}",
            "AGENT".style(self.ctx.styles.bold),
            "CPU %".style(self.ctx.styles.bold),
            "MEM".style(self.ctx.styles.bold),
            "MEM %".style(self.ctx.styles.bold),
            "NET RX".style(self.ctx.styles.bold),
            "NET TX".style(self.ctx.styles.bold),
        );
        for s in stats {
            println!(
                "  {:<24} {:>8.2} {:>12} {:>8.2} {:>12} {:>12}",
                s.agent_id,
                s.cpu_usage,
                format_bytes(s.memory_usage),
                s.memory_percent,
                format_bytes(s.net_rx),
                format_bytes(s.net_tx),
            );
        }
    }

    pub fn render_metrics(&self, summary: &MetricsSummary) {
        if summary.is_empty() {
            self.ctx.info("No metrics recorded");
            return;
        }
        for (category, operations) in &summary.categories {
            self.ctx.header(category);
            for (operation, op) in operations {
                let avg = op
                    .avg_ms
                    .map_or_else(String::new, |ms| format!("  avg {ms:.0}ms"));
                let count = op.count.max(op.timed);
                println!("    {operation:<28} {count:>6}{avg}");
                for (agent, value) in &op.gauges {
                    println!("      {:<26} {value:.2}", agent.style(self.ctx.styles.dim));
                }
            }
        }
    }
}

/// Binary-prefixed size, e.g. `1.5MiB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}
