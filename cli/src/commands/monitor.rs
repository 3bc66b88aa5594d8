//! `git-capsulate monitor` — container resource usage.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use capsulate_common::ContainerStats;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::services::ContainerMonitor;
use crate::domain::config::parse_duration;
use crate::output::human::HumanRenderer;
use crate::output::json;

/// Monitor subcommands.
#[derive(Subcommand)]
pub enum MonitorCommand {
    /// Take one sample of every running agent
    Show {
        /// Only this agent
        #[arg(long)]
        agent: Option<String>,
    },
    /// Sample repeatedly until interrupted
    Watch {
        /// Polling interval such as `5s` or `500ms` (defaults to config)
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
}

fn parse_interval(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).ok_or_else(|| format!("invalid interval '{raw}'"))
}

fn print_stats(app: &AppContext, stats: &[ContainerStats]) -> Result<()> {
    if app.is_json() {
        json::print(stats)
    } else {
        HumanRenderer::new(&app.output).render_stats(stats);
        Ok(())
    }
}

/// Run the monitor command.
///
/// # Errors
///
/// Returns an error if the runtime cannot list containers or the configured
/// interval is invalid.
pub async fn run(app: &AppContext, cmd: &MonitorCommand) -> Result<ExitCode> {
    let monitor = ContainerMonitor::new(app.metrics.clone());
    let runtime = app.manager.runtime();
    match cmd {
        MonitorCommand::Show { agent } => {
            monitor.collect(runtime).await?;
            let stats = match agent {
                Some(id) => monitor.stats_for_agent(id),
                None => monitor.all_stats(),
            };
            print_stats(app, &stats)?;
        }
        MonitorCommand::Watch { interval } => {
            let interval = match interval {
                Some(interval) => *interval,
                None => app.config.monitor_interval()?,
            };
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            let mut failed = None;
            monitor
                .run(runtime, interval, shutdown, |stats| {
                    if failed.is_none()
                        && let Err(e) = print_stats(app, stats)
                    {
                        failed = Some(e);
                    }
                })
                .await;
            if let Some(e) = failed {
                return Err(e).context("printing stats");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
