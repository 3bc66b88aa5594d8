//! Three-tier dependency resolution, link scripts and tier management.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use capsulate_cli::application::ports::LocalFs;
use capsulate_cli::application::services::dependency::{self, TierSelection};
use capsulate_cli::domain::{AgentConfig, AgentError, HostLayout};
use capsulate_cli::infra::fs::HostFs;
use capsulate_common::{DependencyLevel, DependencyTier, ResolvedDependency};
use mockall::mock;
use tempfile::TempDir;

use crate::fakes::{Harness, REMOTE, RecordingReporter};

mock! {
    pub Fs {}
    impl LocalFs for Fs {
        fn exists(&self, path: &Path) -> bool;
        fn create_dir_all(&self, path: &Path) -> anyhow::Result<()>;
        fn remove_dir_all(&self, path: &Path) -> anyhow::Result<()>;
        fn write(&self, path: &Path, contents: &str) -> anyhow::Result<()>;
        fn read_to_string(&self, path: &Path) -> anyhow::Result<String>;
        fn list_dirs(&self, path: &Path) -> anyhow::Result<Vec<String>>;
        fn home_dir(&self) -> Option<PathBuf>;
    }
}

fn root() -> (TempDir, HostLayout) {
    let dir = TempDir::new().expect("tempdir");
    let layout = HostLayout::new(dir.path());
    (dir, layout)
}

fn team_selection<'a>(agent_id: &'a str, team: &'a str, overrides: &'a [String]) -> TierSelection<'a> {
    TierSelection {
        agent_id,
        team_id: Some(team),
        overrides,
    }
}

fn find<'a>(deps: &'a [ResolvedDependency], name: &str) -> Option<&'a ResolvedDependency> {
    deps.iter().find(|d| d.name == name)
}

// ── resolution ────────────────────────────────────────────────────────────────

#[test]
fn test_team_tier_shadows_core() {
    let (_dir, layout) = root();
    dependency::add_core_dependency(&HostFs, &layout, "lodash", "4.17.0").unwrap();
    dependency::add_core_dependency(&HostFs, &layout, "react", "18.0.0").unwrap();
    dependency::add_team_dependency(&HostFs, &layout, "web", "lodash", "4.18.0").unwrap();

    let deps = dependency::resolve(&HostFs, &layout, &team_selection("a1", "web", &[])).unwrap();

    let lodash = find(&deps, "lodash").unwrap();
    assert_eq!(lodash.tier, DependencyTier::Team);
    assert_eq!(lodash.version.as_deref(), Some("4.18.0"));
    assert_eq!(find(&deps, "react").unwrap().tier, DependencyTier::Core);
}

#[test]
fn test_team_tier_ignored_without_team_selection() {
    let (_dir, layout) = root();
    dependency::add_core_dependency(&HostFs, &layout, "lodash", "4.17.0").unwrap();
    dependency::add_team_dependency(&HostFs, &layout, "web", "lodash", "4.18.0").unwrap();
    dependency::add_team_dependency(&HostFs, &layout, "web", "vue", "3.0.0").unwrap();

    let selection = TierSelection {
        agent_id: "a1",
        team_id: None,
        overrides: &[],
    };
    let deps = dependency::resolve(&HostFs, &layout, &selection).unwrap();
    assert_eq!(find(&deps, "lodash").unwrap().tier, DependencyTier::Core);
    assert!(find(&deps, "vue").is_none());
}

#[test]
fn test_override_resolves_to_own_tier_only() {
    let (_dir, layout) = root();
    dependency::add_core_dependency(&HostFs, &layout, "lodash", "4.17.0").unwrap();
    dependency::add_core_dependency(&HostFs, &layout, "chalk", "5.0.0").unwrap();
    dependency::add_package(&HostFs, &layout.container_tier("a1"), "lodash", "3.10.1").unwrap();

    let overrides = vec!["lodash".to_string(), "chalk".to_string()];
    let selection = TierSelection {
        agent_id: "a1",
        team_id: None,
        overrides: &overrides,
    };
    let deps = dependency::resolve(&HostFs, &layout, &selection).unwrap();

    let lodash = find(&deps, "lodash").unwrap();
    assert_eq!(lodash.tier, DependencyTier::Container);
    assert_eq!(lodash.version.as_deref(), Some("3.10.1"));
    assert!(lodash.overridden);
    // Overridden but absent from the agent's tier: not linked at all.
    assert!(find(&deps, "chalk").is_none());
}

#[test]
fn test_invalid_package_directories_are_skipped() {
    let (_dir, layout) = root();
    dependency::add_core_dependency(&HostFs, &layout, "lodash", "4.17.0").unwrap();
    std::fs::create_dir_all(layout.core_tier().join("bad name")).unwrap();
    std::fs::create_dir_all(layout.core_tier().join("no-version")).unwrap();

    let selection = TierSelection {
        agent_id: "a1",
        team_id: None,
        overrides: &[],
    };
    let deps = dependency::resolve(&HostFs, &layout, &selection).unwrap();
    let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["lodash", "no-version"]);
    assert_eq!(find(&deps, "no-version").unwrap().version, None);
}

// ── link script ───────────────────────────────────────────────────────────────

#[test]
fn test_link_script_orders_tiers_and_logs_overrides() {
    let (_dir, layout) = root();
    dependency::add_core_dependency(&HostFs, &layout, "lodash", "4.17.0").unwrap();
    dependency::add_core_dependency(&HostFs, &layout, "react", "18.0.0").unwrap();
    dependency::add_team_dependency(&HostFs, &layout, "web", "react", "18.2.0").unwrap();
    dependency::add_package(&HostFs, &layout.container_tier("a1"), "lodash", "3.10.1").unwrap();

    let overrides = vec!["lodash".to_string()];
    let script =
        dependency::link_script(&HostFs, &layout, &team_selection("a1", "web", &overrides)).unwrap();

    assert_eq!(
        script.lines(),
        [
            "mkdir -p /capsulate/node_modules",
            "ln -sfn /capsulate/deps/core/react /capsulate/node_modules/react",
            "ln -sfn /capsulate/deps/team/react /capsulate/node_modules/react",
            "ln -sfn /capsulate/deps/container/lodash /capsulate/node_modules/lodash",
            "echo 'Overriding dependency: lodash'",
        ]
    );
}

#[test]
fn test_link_script_with_empty_tiers_only_creates_link_dir() {
    let (_dir, layout) = root();
    let selection = TierSelection {
        agent_id: "a1",
        team_id: None,
        overrides: &[],
    };
    let script = dependency::link_script(&HostFs, &layout, &selection).unwrap();
    assert_eq!(script.lines(), ["mkdir -p /capsulate/node_modules"]);
}

// ── plan ──────────────────────────────────────────────────────────────────────

#[test]
fn test_plan_creates_team_and_container_tiers() {
    let (_dir, layout) = root();
    let config = AgentConfig {
        dependency_level: DependencyLevel::Team,
        team_id: Some("web".to_string()),
        ..AgentConfig::new("a1")
    };

    let plan = dependency::plan(&HostFs, &layout, &config).unwrap();

    assert!(layout.team_tier("web").is_dir());
    assert!(layout.container_tier("a1").is_dir());
    let targets: Vec<_> = plan.mounts.iter().map(|m| m.target.as_str()).collect();
    // No core mount: the core tier does not exist yet.
    assert_eq!(targets, ["/capsulate/deps/team", "/capsulate/deps/container"]);
    assert!(plan.mounts[0].read_only);
    assert!(!plan.mounts[1].read_only);
}

#[test]
fn test_plan_reports_unavailable_tier() {
    let (_dir, layout) = root();
    let mut fs = MockFs::new();
    fs.expect_exists().return_const(false);
    fs.expect_create_dir_all()
        .returning(|path| anyhow::bail!("permission denied: {}", path.display()));

    let config = AgentConfig {
        dependency_level: DependencyLevel::Team,
        team_id: Some("web".to_string()),
        ..AgentConfig::new("a1")
    };
    let err = dependency::plan(&fs, &layout, &config).unwrap_err();
    match err {
        AgentError::DependencyTierUnavailable { tier, path, message, .. } => {
            assert_eq!(tier, DependencyTier::Team);
            assert_eq!(path, layout.team_tier("web"));
            assert!(message.contains("permission denied"));
        }
        other => panic!("expected DependencyTierUnavailable, got {other:?}"),
    }
}

#[test]
fn test_link_script_reports_unlistable_tier() {
    let (_dir, layout) = root();
    let mut fs = MockFs::new();
    fs.expect_list_dirs()
        .returning(|_| anyhow::bail!("input/output error"));

    let selection = TierSelection {
        agent_id: "a1",
        team_id: None,
        overrides: &[],
    };
    let err = dependency::link_script(&fs, &layout, &selection).unwrap_err();
    assert_eq!(err.code(), "dependency_tier_unavailable");
    assert!(err.to_string().contains("core dependency tier"));
}

// ── tier management ───────────────────────────────────────────────────────────

#[test]
fn test_tier_management_validates_and_writes_markers() {
    let (_dir, layout) = root();
    let team = dependency::create_team(&HostFs, &layout, "web").unwrap();
    assert!(team.is_dir());
    dependency::create_team(&HostFs, &layout, "web").expect("idempotent");

    let pkg = dependency::add_team_dependency(&HostFs, &layout, "web", "lodash", "4.17.21").unwrap();
    assert_eq!(std::fs::read_to_string(pkg.join("version")).unwrap(), "4.17.21\n");

    assert!(dependency::create_team(&HostFs, &layout, "../web").is_err());
    assert!(dependency::add_core_dependency(&HostFs, &layout, "../../etc", "1").is_err());
    assert!(dependency::add_core_dependency(&HostFs, &layout, "ok", "1\n2").is_err());
}

// ── through the manager ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_dependency_links_in_container_and_lists() {
    let h = Harness::new();
    h.manager.add_core_dependency("react", "18.0.0").unwrap();
    let config = AgentConfig {
        repo_url: Some(REMOTE.to_string()),
        ..AgentConfig::new("a1")
    };
    h.manager
        .create(&config, &RecordingReporter::default())
        .await
        .unwrap();

    let added = h.manager.add_dependency("a1", "left-pad", "1.3.0").await.unwrap();
    assert_eq!(added.tier, DependencyTier::Container);

    let container = h.runtime.container_named("capsulate-a1").unwrap();
    assert!(container.linked.contains("/capsulate/node_modules/react"));
    assert!(container.linked.contains("/capsulate/node_modules/left-pad"));

    let deps = h.manager.list_dependencies("a1").unwrap();
    let names: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.tier)).collect();
    assert_eq!(
        names,
        [("left-pad", DependencyTier::Container), ("react", DependencyTier::Core)]
    );
    assert_eq!(find(&deps, "left-pad").unwrap().version.as_deref(), Some("1.3.0"));
}

#[tokio::test]
async fn test_sync_links_packages_added_after_creation() {
    let h = Harness::new();
    h.manager.add_core_dependency("react", "18.0.0").unwrap();
    let config = AgentConfig {
        dependency_level: DependencyLevel::Team,
        team_id: Some("web".to_string()),
        ..AgentConfig::new("a1")
    };
    h.manager
        .create(&config, &RecordingReporter::default())
        .await
        .unwrap();

    h.manager.add_team_dependency("web", "vue", "3.4.0").unwrap();
    h.manager.add_core_dependency("lodash", "4.17.21").unwrap();
    let links = h.manager.sync_dependencies("a1").await.unwrap();

    assert_eq!(links, 3);
    let container = h.runtime.container_named("capsulate-a1").unwrap();
    assert!(container.linked.contains("/capsulate/node_modules/vue"));
    assert!(container.linked.contains("/capsulate/node_modules/lodash"));
}

#[tokio::test]
async fn test_core_agents_share_core_tier_before_and_after_creation() {
    let h = Harness::new();
    h.manager.add_core_dependency("react", "18.2.0").unwrap();
    for id in ["a1", "a2"] {
        let config = AgentConfig {
            dependency_level: DependencyLevel::Core,
            ..AgentConfig::new(id)
        };
        h.manager
            .create(&config, &RecordingReporter::default())
            .await
            .unwrap();
    }

    h.manager.add_core_dependency("lodash", "4.17.21").unwrap();
    for id in ["a1", "a2"] {
        assert_eq!(h.manager.sync_dependencies(id).await.unwrap(), 2);
    }

    let mut core_sources = Vec::new();
    for name in ["capsulate-a1", "capsulate-a2"] {
        let container = h.runtime.container_named(name).unwrap();
        assert!(container.linked.contains("/capsulate/node_modules/react"));
        assert!(container.linked.contains("/capsulate/node_modules/lodash"));
        let core = container
            .spec
            .mounts
            .iter()
            .find(|m| m.target == "/capsulate/deps/core")
            .expect("core tier mounted")
            .clone();
        assert!(core.read_only);
        core_sources.push(core.source);
    }
    assert_eq!(core_sources[0], core_sources[1]);
    for package in ["react", "lodash"] {
        let version = std::fs::read_to_string(core_sources[0].join(package).join("version")).unwrap();
        assert!(!version.trim().is_empty());
    }

    let a1 = h.manager.list_dependencies("a1").unwrap();
    assert_eq!(a1, h.manager.list_dependencies("a2").unwrap());
    assert_eq!(find(&a1, "react").unwrap().version.as_deref(), Some("18.2.0"));
    assert_eq!(find(&a1, "lodash").unwrap().version.as_deref(), Some("4.17.21"));
    assert!(a1.iter().all(|d| d.tier == DependencyTier::Core));
}

#[tokio::test]
async fn test_destroy_keeps_shared_tiers() {
    let h = Harness::new();
    h.manager.add_core_dependency("lodash", "4.17.21").unwrap();
    h.manager
        .create(&AgentConfig::new("a1"), &RecordingReporter::default())
        .await
        .unwrap();
    h.manager.destroy("a1").await.unwrap();
    assert!(h.layout().core_tier().join("lodash").is_dir());
}

#[tokio::test]
async fn test_add_dependency_rejects_bad_package_before_runtime() {
    let h = Harness::new();
    h.manager
        .create(&AgentConfig::new("a1"), &RecordingReporter::default())
        .await
        .unwrap();
    let before = h.runtime.calls().len();
    let err = h.manager.add_dependency("a1", "a;rm -rf", "1").await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.runtime.calls().len(), before);
}
