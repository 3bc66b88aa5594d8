//! Application service — Git status reporting.
//!
//! Stateless: every call re-runs the underlying Git commands through the
//! [`AgentShell`] port. The four reads are independent, so the result is a
//! snapshot, not a consistent view of a tree that is changing underneath.

use std::collections::BTreeMap;

use capsulate_common::GitStatus;
use chrono::Utc;

use crate::application::ports::{AgentShell, ExecOutput};
use crate::domain::git;
use crate::domain::{AgentError, AgentResult};

async fn required(shell: &impl AgentShell, agent_id: &str, argv: Vec<String>) -> AgentResult<ExecOutput> {
    let output = shell.run_in_workdir(agent_id, &argv).await?;
    if !output.success() {
        return Err(AgentError::CommandFailed {
            agent_id: agent_id.to_string(),
            operation: argv.join(" "),
            exit_code: output.exit_code,
            output: output.combined(),
        });
    }
    Ok(output)
}

/// Branch, commit, modified and untracked files, ahead/behind upstream.
///
/// Ahead/behind is zero when no upstream is configured.
///
/// # Errors
///
/// Returns the shell's error, or [`AgentError::CommandFailed`] if one of the
/// four required reads exits non-zero.
pub async fn git_status(shell: &impl AgentShell, agent_id: &str) -> AgentResult<GitStatus> {
    let branch = required(shell, agent_id, git::current_branch_argv()).await?;
    let commit = required(shell, agent_id, git::current_commit_argv()).await?;
    let modified = required(shell, agent_id, git::modified_files_argv()).await?;
    let untracked = required(shell, agent_id, git::untracked_files_argv()).await?;

    let (ahead_count, behind_count) = match shell.run_in_workdir(agent_id, &git::ahead_behind_argv()).await {
        Ok(out) if out.success() => git::parse_ahead_behind(&out.stdout).unwrap_or((0, 0)),
        Ok(_) => (0, 0),
        Err(e) => {
            tracing::debug!(agent_id, error = %e, "ahead/behind unavailable");
            (0, 0)
        }
    };

    Ok(GitStatus {
        branch: branch.stdout.trim().to_string(),
        current_commit: commit.stdout.trim().to_string(),
        modified_files: git::parse_lines(&modified.stdout),
        untracked_files: git::parse_lines(&untracked.stdout),
        ahead_count,
        behind_count,
    })
}

/// Render the human-readable status file body. Individual Git failures are
/// written into the body rather than returned.
///
/// # Errors
///
/// Returns the shell's error if the agent cannot be reached at all.
pub async fn status_file_contents(
    shell: &impl AgentShell,
    agent_id: &str,
    branch: &str,
    git_config: &BTreeMap<String, String>,
) -> AgentResult<String> {
    let branches = shell.run_in_workdir(agent_id, &git::branch_verbose_argv()).await?;
    let status = shell.run_in_workdir(agent_id, &git::short_status_argv()).await?;
    let text = |out: &ExecOutput| {
        if out.success() {
            out.stdout.clone()
        } else {
            out.combined()
        }
    };
    Ok(git::render_status_file(
        agent_id,
        branch,
        &Utc::now().to_rfc3339(),
        &text(&branches),
        &text(&status),
        git_config,
    ))
}
