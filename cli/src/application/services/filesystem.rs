//! Application service — workspace composition.
//!
//! Direct mode bind-mounts the agent's private workspace. Overlay mode mounts
//! the shared read-only base plus the agent's own diff and work layers, and
//! returns the in-container union mount command that must run after start
//! and before any Git command.

use crate::application::ports::LocalFs;
use crate::domain::layout::{
    CONTAINER_OVERLAY_BASE, CONTAINER_OVERLAY_DIFF, CONTAINER_OVERLAY_MERGED,
    CONTAINER_OVERLAY_WORK, CONTAINER_WORKSPACE, container_workdir,
};
use crate::domain::{AgentConfig, AgentError, AgentResult, HostLayout, Mount, ShellScript};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemPlan {
    pub mounts: Vec<Mount>,
    /// Union mount procedure; `None` in direct mode.
    pub mount_script: Option<ShellScript>,
    /// Git working tree inside the container.
    pub workdir: &'static str,
}

/// # Errors
///
/// Returns [`AgentError::Io`] if a host directory cannot be created.
pub fn plan(fs: &impl LocalFs, layout: &HostLayout, config: &AgentConfig) -> AgentResult<FilesystemPlan> {
    let id = config.id.as_str();
    let workspace = layout.workspace(id);
    create(fs, id, &workspace)?;

    if !config.use_overlay {
        create(fs, id, &workspace.join("repo"))?;
        return Ok(FilesystemPlan {
            mounts: vec![Mount::read_write(workspace, CONTAINER_WORKSPACE)],
            mount_script: None,
            workdir: container_workdir(false),
        });
    }

    let base = layout.overlay_base();
    let diff = layout.overlay_diff(id);
    let work = layout.overlay_work(id);
    for dir in [&base, &diff, &work] {
        create(fs, id, dir)?;
    }

    Ok(FilesystemPlan {
        mounts: vec![
            Mount::read_only(base, CONTAINER_OVERLAY_BASE),
            Mount::read_write(diff, CONTAINER_OVERLAY_DIFF),
            Mount::read_write(work, CONTAINER_OVERLAY_WORK),
        ],
        mount_script: Some(overlay_mount_script()),
        workdir: container_workdir(true),
    })
}

fn create(fs: &impl LocalFs, agent_id: &str, dir: &std::path::Path) -> AgentResult<()> {
    fs.create_dir_all(dir).map_err(|e| {
        AgentError::io(
            agent_id,
            &format!("create directory {}", dir.display()),
            &e,
        )
    })
}

/// `mount -t overlay` of base/diff/work onto the merged directory.
#[must_use]
pub fn overlay_mount_script() -> ShellScript {
    let options = format!(
        "lowerdir={CONTAINER_OVERLAY_BASE},upperdir={CONTAINER_OVERLAY_DIFF},workdir={CONTAINER_OVERLAY_WORK}"
    );
    let mut script = ShellScript::new();
    script
        .command(&["mkdir", "-p", CONTAINER_OVERLAY_MERGED])
        .command(&[
            "mount",
            "-t",
            "overlay",
            "overlay",
            "-o",
            options.as_str(),
            CONTAINER_OVERLAY_MERGED,
        ]);
    script
}

/// Prints `enabled` when the union mount is active, `disabled` otherwise.
#[must_use]
pub fn overlay_probe_argv() -> Vec<String> {
    let probe = format!(
        "if grep -qs ' {CONTAINER_OVERLAY_MERGED} overlay ' /proc/mounts; then echo enabled; else echo disabled; fi"
    );
    vec!["/bin/sh".into(), "-c".into(), probe]
}

/// Prints the number of regular files under `dir`.
#[must_use]
pub fn count_files_argv(dir: &str) -> Vec<String> {
    let mut script = ShellScript::new();
    script.command(&["find", dir, "-type", "f"]);
    vec![
        "/bin/sh".into(),
        "-c".into(),
        format!("{} 2>/dev/null | wc -l", script.lines().join("")),
    ]
}
