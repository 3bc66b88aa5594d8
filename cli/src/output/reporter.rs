//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// On a TTY, `step()` drives a spinner; otherwise it prints `"  → {message}"`.
/// `success()` and `warn()` print above the spinner. Everything is suppressed
/// when `ctx.quiet`.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: Option<ProgressBar>,
}

impl<'a> TerminalReporter<'a> {
    /// Reporter with a spinner when the terminal supports one.
    #[must_use]
    pub fn with_spinner(ctx: &'a OutputContext) -> Self {
        let spinner = ctx.show_progress().then(|| progress::spinner("working..."));
        Self { ctx, spinner }
    }

    fn print(&self, line: String) {
        match &self.spinner {
            Some(pb) => pb.println(line),
            None => println!("{line}"),
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        if let Some(pb) = &self.spinner {
            progress::finish_clear(pb);
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if self.ctx.quiet {
            return;
        }
        match &self.spinner {
            Some(pb) => pb.set_message(message.to_string()),
            None => println!("  {} {message}", "→".style(self.ctx.styles.info)),
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            self.print(format!("  {} {message}", "✓".style(self.ctx.styles.success)));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            self.print(format!("  {} {message}", "!".style(self.ctx.styles.warning)));
        }
    }
}
