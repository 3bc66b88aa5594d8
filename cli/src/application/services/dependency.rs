//! Application service — three-tier dependency resolution.
//!
//! Tiers are host directories of package sub-directories, each holding a
//! `version` marker. Inside an agent they are bind-mounted and linked into one
//! package-link directory in core → team → container order, so a later tier
//! shadows an earlier one and overrides come only from the agent's own tier.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use capsulate_common::{DependencyLevel, DependencyTier, ResolvedDependency};

use crate::application::ports::LocalFs;
use crate::domain::agent::{validate_package_name, validate_team_id};
use crate::domain::layout::{
    CONTAINER_AGENT_DEPS, CONTAINER_CORE_DEPS, CONTAINER_LINK_DIR, CONTAINER_TEAM_DEPS,
    VERSION_FILE,
};
use crate::domain::{Agent, AgentConfig, AgentError, AgentResult, HostLayout, Mount, ShellScript};

/// Which tiers an agent sees and which names it overrides.
#[derive(Debug, Clone, Copy)]
pub struct TierSelection<'a> {
    pub agent_id: &'a str,
    /// Set only for team-level agents.
    pub team_id: Option<&'a str>,
    pub overrides: &'a [String],
}

impl<'a> TierSelection<'a> {
    #[must_use]
    pub fn from_config(config: &'a AgentConfig) -> Self {
        Self {
            agent_id: &config.id,
            team_id: config.effective_team(),
            overrides: &config.override_dependencies,
        }
    }

    #[must_use]
    pub fn from_agent(agent: &'a Agent) -> Self {
        let team_id = match agent.dependency_level {
            DependencyLevel::Team => agent.team_id.as_deref().filter(|t| !t.is_empty()),
            DependencyLevel::Core | DependencyLevel::Container => None,
        };
        Self {
            agent_id: &agent.id,
            team_id,
            overrides: &agent.override_dependencies,
        }
    }

    fn overrides(&self, package: &str) -> bool {
        self.overrides.iter().any(|p| p == package)
    }
}

/// Mounts plus the in-container link procedure for one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPlan {
    pub mounts: Vec<Mount>,
    pub setup_script: ShellScript,
}

/// Compute the dependency mounts and link script for a new agent.
///
/// Creates the team tier (team level only) and the agent's container tier
/// if they are missing.
///
/// # Errors
///
/// Returns [`AgentError::DependencyTierUnavailable`] if a tier directory
/// cannot be created or listed.
pub fn plan(fs: &impl LocalFs, layout: &HostLayout, config: &AgentConfig) -> AgentResult<DependencyPlan> {
    let selection = TierSelection::from_config(config);
    let mut mounts = Vec::new();

    let core = layout.core_tier();
    if fs.exists(&core) {
        mounts.push(Mount::read_only(core, CONTAINER_CORE_DEPS));
    }

    if let Some(team_id) = selection.team_id {
        let team = layout.team_tier(team_id);
        ensure_tier(fs, &team, selection.agent_id, DependencyTier::Team)?;
        mounts.push(Mount::read_only(team, CONTAINER_TEAM_DEPS));
    }

    let own = layout.container_tier(selection.agent_id);
    ensure_tier(fs, &own, selection.agent_id, DependencyTier::Container)?;
    mounts.push(Mount::read_write(own, CONTAINER_AGENT_DEPS));

    let setup_script = link_script(fs, layout, &selection)?;
    Ok(DependencyPlan { mounts, setup_script })
}

fn ensure_tier(fs: &impl LocalFs, path: &Path, agent_id: &str, tier: DependencyTier) -> AgentResult<()> {
    fs.create_dir_all(path)
        .map_err(|e| AgentError::DependencyTierUnavailable {
            agent_id: agent_id.to_string(),
            tier,
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })
}

/// Build the link procedure: link dir, core links, team links, own-tier links,
/// then a log line per override.
///
/// # Errors
///
/// Returns [`AgentError::DependencyTierUnavailable`] if a tier cannot be listed.
pub fn link_script(
    fs: &impl LocalFs,
    layout: &HostLayout,
    selection: &TierSelection<'_>,
) -> AgentResult<ShellScript> {
    let mut script = ShellScript::new();
    script.command(&["mkdir", "-p", CONTAINER_LINK_DIR]);

    for (tier, host_dir, container_dir) in tier_sources(layout, selection) {
        let packages = list_packages(fs, &host_dir).map_err(|e| AgentError::DependencyTierUnavailable {
            agent_id: selection.agent_id.to_string(),
            tier,
            path: host_dir.clone(),
            message: format!("{e:#}"),
        })?;
        for package in packages {
            if tier != DependencyTier::Container && selection.overrides(&package) {
                continue;
            }
            let target = format!("{container_dir}/{package}");
            let link = format!("{CONTAINER_LINK_DIR}/{package}");
            script.command(&["ln", "-sfn", target.as_str(), link.as_str()]);
        }
    }

    for package in selection.overrides {
        script.echo(&format!("Overriding dependency: {package}"));
    }
    Ok(script)
}

/// Tiers an agent links, lowest precedence first.
fn tier_sources(
    layout: &HostLayout,
    selection: &TierSelection<'_>,
) -> Vec<(DependencyTier, PathBuf, &'static str)> {
    let mut tiers = vec![(DependencyTier::Core, layout.core_tier(), CONTAINER_CORE_DEPS)];
    if let Some(team_id) = selection.team_id {
        tiers.push((DependencyTier::Team, layout.team_tier(team_id), CONTAINER_TEAM_DEPS));
    }
    tiers.push((
        DependencyTier::Container,
        layout.container_tier(selection.agent_id),
        CONTAINER_AGENT_DEPS,
    ));
    tiers
}

/// Valid package directories in a tier. Names that fail validation are
/// skipped with a warning.
fn list_packages(fs: &impl LocalFs, tier_dir: &Path) -> Result<Vec<String>> {
    let names = fs
        .list_dirs(tier_dir)
        .with_context(|| format!("listing {}", tier_dir.display()))?;
    Ok(names
        .into_iter()
        .filter(|name| match validate_package_name(name) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(tier = %tier_dir.display(), %reason, "skipping package");
                false
            }
        })
        .collect())
}

/// Effective package set for an agent: every linked name with the tier it
/// resolves to. Mirrors the link order of [`link_script`].
///
/// # Errors
///
/// Returns an error if a tier directory cannot be listed.
pub fn resolve(
    fs: &impl LocalFs,
    layout: &HostLayout,
    selection: &TierSelection<'_>,
) -> Result<Vec<ResolvedDependency>> {
    let mut resolved: BTreeMap<String, ResolvedDependency> = BTreeMap::new();
    for (tier, host_dir, _) in tier_sources(layout, selection) {
        for package in list_packages(fs, &host_dir)? {
            let overridden = selection.overrides(&package);
            if tier != DependencyTier::Container && overridden {
                continue;
            }
            let version = read_version(fs, &host_dir.join(&package));
            resolved.insert(
                package.clone(),
                ResolvedDependency {
                    name: package,
                    tier,
                    version,
                    overridden,
                },
            );
        }
    }
    Ok(resolved.into_values().collect())
}

fn read_version(fs: &impl LocalFs, package_dir: &Path) -> Option<String> {
    let marker = package_dir.join(VERSION_FILE);
    if !fs.exists(&marker) {
        return None;
    }
    fs.read_to_string(&marker)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Create a team tier. Idempotent.
///
/// # Errors
///
/// Returns an error if the team id is invalid or the directory cannot be created.
pub fn create_team(fs: &impl LocalFs, layout: &HostLayout, team_id: &str) -> Result<PathBuf> {
    validate_team_id(team_id).map_err(anyhow::Error::msg)?;
    let dir = layout.team_tier(team_id);
    fs.create_dir_all(&dir)
        .with_context(|| format!("creating team tier {}", dir.display()))?;
    Ok(dir)
}

/// Write `<tier>/<package>/version`, creating the package directory.
///
/// # Errors
///
/// Returns an error if the package name is invalid or the write fails.
pub fn add_package(fs: &impl LocalFs, tier_dir: &Path, package: &str, version: &str) -> Result<PathBuf> {
    validate_package_name(package).map_err(anyhow::Error::msg)?;
    anyhow::ensure!(
        !version.contains('\n'),
        "version for '{package}' must be a single line"
    );
    let dir = tier_dir.join(package);
    fs.create_dir_all(&dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    fs.write(&dir.join(VERSION_FILE), &format!("{version}\n"))
        .with_context(|| format!("writing version marker for {package}"))?;
    Ok(dir)
}

/// Add a package to a team tier, creating the team if needed.
///
/// # Errors
///
/// Returns an error if the team or package is invalid or the write fails.
pub fn add_team_dependency(
    fs: &impl LocalFs,
    layout: &HostLayout,
    team_id: &str,
    package: &str,
    version: &str,
) -> Result<PathBuf> {
    let team_dir = create_team(fs, layout, team_id)?;
    add_package(fs, &team_dir, package, version)
}

/// Add a package to the organisation-wide core tier.
///
/// # Errors
///
/// Returns an error if the package is invalid or the write fails.
pub fn add_core_dependency(
    fs: &impl LocalFs,
    layout: &HostLayout,
    package: &str,
    version: &str,
) -> Result<PathBuf> {
    let core = layout.core_tier();
    fs.create_dir_all(&core)
        .with_context(|| format!("creating core tier {}", core.display()))?;
    add_package(fs, &core, package, version)
}
