//! `git-capsulate metrics` — show or clear flushed metrics.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Subcommand, ValueEnum};

use crate::app::AppContext;
use crate::infra::config::metrics_dir;
use crate::infra::metrics::{clear_flushed, load_flushed};
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Summary output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricsFormat {
    Text,
    Json,
}

/// Metrics subcommands.
#[derive(Subcommand)]
pub enum MetricsCommand {
    /// Show the merged summary of every recorded run
    Show {
        /// Output format
        #[arg(long, value_enum, default_value_t = MetricsFormat::Text)]
        format: MetricsFormat,
    },
    /// Delete recorded metrics
    Clear,
}

/// Run the metrics command.
///
/// # Errors
///
/// Returns an error if the metrics directory cannot be read or cleared.
pub fn run(app: &AppContext, cmd: &MetricsCommand) -> Result<ExitCode> {
    let dir = metrics_dir(&app.config)?;
    match cmd {
        MetricsCommand::Show { format } => {
            let summary = load_flushed(&dir)?;
            if app.is_json() || *format == MetricsFormat::Json {
                json::print(&summary)?;
            } else {
                HumanRenderer::new(&app.output).render_metrics(&summary);
            }
        }
        MetricsCommand::Clear => {
            app.metrics.clear();
            let removed = clear_flushed(&dir)?;
            if app.is_json() {
                json::print(&serde_json::json!({ "removed": removed }))?;
            } else {
                app.output.success(&format!("Removed {removed} metrics files"));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
