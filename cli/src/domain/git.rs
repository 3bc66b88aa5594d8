//! Git command templates and output parsers.
//!
//! Git itself is an opaque subprocess; this module only decides which argv to
//! run and how to read stdout back.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// `git clone [--branch B] [--depth D] -- <url> <target>`.
#[must_use]
pub fn clone_argv(url: &str, branch: Option<&str>, depth: u32, target: &str) -> Vec<String> {
    let mut argv = vec!["git".to_string(), "clone".to_string()];
    if let Some(branch) = branch {
        argv.push("--branch".to_string());
        argv.push(branch.to_string());
    }
    if depth > 0 {
        argv.push("--depth".to_string());
        argv.push(depth.to_string());
    }
    argv.push("--".to_string());
    argv.push(url.to_string());
    argv.push(target.to_string());
    argv
}

#[must_use]
pub fn config_argv(key: &str, value: &str) -> Vec<String> {
    vec!["git".into(), "config".into(), key.into(), value.into()]
}

/// Create-or-reset and switch to `branch`.
#[must_use]
pub fn checkout_new_argv(branch: &str) -> Vec<String> {
    vec!["git".into(), "checkout".into(), "-B".into(), branch.into()]
}

#[must_use]
pub fn checkout_argv(branch: &str) -> Vec<String> {
    vec!["git".into(), "checkout".into(), branch.into()]
}

#[must_use]
pub fn branch_argv(branch: &str) -> Vec<String> {
    vec!["git".into(), "branch".into(), branch.into()]
}

#[must_use]
pub fn current_branch_argv() -> Vec<String> {
    vec!["git".into(), "rev-parse".into(), "--abbrev-ref".into(), "HEAD".into()]
}

#[must_use]
pub fn current_commit_argv() -> Vec<String> {
    vec!["git".into(), "rev-parse".into(), "HEAD".into()]
}

#[must_use]
pub fn modified_files_argv() -> Vec<String> {
    vec!["git".into(), "diff".into(), "--name-only".into(), "HEAD".into()]
}

#[must_use]
pub fn untracked_files_argv() -> Vec<String> {
    vec![
        "git".into(),
        "ls-files".into(),
        "--others".into(),
        "--exclude-standard".into(),
    ]
}

/// Left count is ahead, right count is behind.
#[must_use]
pub fn ahead_behind_argv() -> Vec<String> {
    vec![
        "git".into(),
        "rev-list".into(),
        "--left-right".into(),
        "--count".into(),
        "HEAD...@{upstream}".into(),
    ]
}

#[must_use]
pub fn branch_verbose_argv() -> Vec<String> {
    vec!["git".into(), "branch".into(), "-vv".into()]
}

#[must_use]
pub fn short_status_argv() -> Vec<String> {
    vec!["git".into(), "status".into(), "--short".into()]
}

/// Non-empty, trimmed lines.
#[must_use]
pub fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `rev-list --left-right --count` output (`"<ahead>\t<behind>"`).
#[must_use]
pub fn parse_ahead_behind(stdout: &str) -> Option<(u32, u32)> {
    let mut parts = stdout.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

/// Render the human-readable status file.
#[must_use]
pub fn render_status_file(
    agent_id: &str,
    branch: &str,
    updated: &str,
    branches: &str,
    status: &str,
    git_config: &BTreeMap<String, String>,
) -> String {
    let mut out = format!(
        "# Git Status for Agent {agent_id}\n\n\
         Branch: {branch}\n\
         Last updated: {updated}\n\n\
         ## Branches\n\n```\n{}\n```\n\n\
         ## Working tree\n\n```\n{}\n```\n",
        branches.trim_end(),
        status.trim_end(),
    );
    if !git_config.is_empty() {
        out.push_str("\n## Git config\n\n");
        for (key, value) in git_config {
            let _ = writeln!(out, "- {key} = {value}");
        }
    }
    out
}
