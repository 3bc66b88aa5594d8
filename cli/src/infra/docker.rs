//! Infrastructure implementation of the container runtime ports.
//!
//! `DockerCli<R>` drives the `docker` CLI through a `CommandRunner`. Listing
//! and stats use `--format '{{json .}}'`, one JSON object per line.

use std::process::Output;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::application::ports::{
    CommandRunner, ContainerFilter, ContainerRuntime, ContainerSpec, ExecOutput, ExecRequest,
    ImageStore,
};
use crate::domain::container::{ContainerState, ContainerSummary, parse_labels};
use crate::domain::{Mount, StatsSample};
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};

const DOCKER: &str = "docker";
const JSON_FORMAT: &str = "{{json .}}";

/// Docker CLI adapter.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes. Management calls go through
/// `cmd_runner`; in-container commands, pulls and waits through the longer
/// `exec_runner`.
pub struct DockerCli<R: CommandRunner> {
    cmd_runner: R,
    exec_runner: R,
}

impl<R: CommandRunner> DockerCli<R> {
    pub fn new(cmd_runner: R, exec_runner: R) -> Self {
        Self {
            cmd_runner,
            exec_runner,
        }
    }
}

impl DockerCli<TokioCommandRunner> {
    /// Production adapter: `command` bounds management calls, `exec` bounds
    /// in-container commands, pulls and waits.
    #[must_use]
    pub fn with_timeouts(command: Duration, exec: Duration) -> Self {
        Self::new(TokioCommandRunner::new(command), TokioCommandRunner::new(exec))
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Stdout of a successful call; the CLI's stderr verbatim otherwise.
fn checked(output: &Output, what: &str) -> Result<String> {
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    anyhow::bail!("{what} failed (exit {code}): {}", stderr_of(output))
}

/// `type=bind,source=..,target=..[,readonly]`, CSV-quoting fields that need it.
fn mount_arg(mount: &Mount) -> String {
    let field = |raw: String| {
        if raw.contains(',') || raw.contains('"') {
            format!("\"{}\"", raw.replace('"', "\"\""))
        } else {
            raw
        }
    };
    let mut arg = format!(
        "type=bind,{},{}",
        field(format!("source={}", mount.source.display())),
        field(format!("target={}", mount.target)),
    );
    if mount.read_only {
        arg.push_str(",readonly");
    }
    arg
}

/// Arguments of `docker create` for `spec`.
fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), spec.name.clone()];
    for (key, value) in &spec.labels {
        args.push("--label".into());
        args.push(format!("{key}={value}"));
    }
    for (key, value) in &spec.env {
        args.push("--env".into());
        args.push(format!("{key}={value}"));
    }
    for mount in &spec.mounts {
        args.push("--mount".into());
        args.push(mount_arg(mount));
    }
    if spec.privileged {
        args.push("--privileged".into());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

#[derive(Debug, Deserialize)]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Labels", default)]
    labels: String,
}

impl From<PsRow> for ContainerSummary {
    fn from(row: PsRow) -> Self {
        Self {
            id: row.id,
            name: row.names.split(',').next().unwrap_or_default().trim_start_matches('/').to_string(),
            state: ContainerState::parse(&row.state),
            labels: parse_labels(&row.labels),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsRow {
    #[serde(rename = "CPUPerc", default)]
    cpu: String,
    #[serde(rename = "MemPerc", default)]
    mem_perc: String,
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
    #[serde(rename = "BlockIO", default)]
    block_io: String,
    #[serde(rename = "NetIO", default)]
    net_io: String,
}

fn parse_ps(stdout: &str) -> Result<Vec<ContainerSummary>> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<PsRow>(line)
                .map(ContainerSummary::from)
                .with_context(|| format!("parsing docker ps row: {line}"))
        })
        .collect()
}

fn parse_stats(stdout: &str) -> Result<StatsSample> {
    let line = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .context("docker stats printed nothing")?;
    let row: StatsRow =
        serde_json::from_str(line).with_context(|| format!("parsing docker stats row: {line}"))?;
    Ok(StatsSample::from_fields(
        &row.cpu,
        &row.mem_perc,
        &row.mem_usage,
        &row.block_io,
        &row.net_io,
    ))
}

/// Failures of `docker exec` itself, as opposed to the command it ran.
/// Docker exits 125 for its own errors and 1 for daemon-reported ones; any
/// other code belongs to the command.
fn is_docker_exec_error(code: Option<i32>, stderr: &str) -> bool {
    let from_daemon = stderr.starts_with("Error response from daemon")
        || stderr.starts_with("Error: No such container");
    match code {
        Some(125) => true,
        Some(1) => from_daemon,
        _ => false,
    }
}

impl<R: CommandRunner> ContainerRuntime for DockerCli<R> {
    async fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let mut args = vec!["ps".to_string(), "--no-trunc".to_string()];
        if filter.all {
            args.push("--all".into());
        }
        if let Some(name) = &filter.name {
            args.push("--filter".into());
            args.push(format!("name={name}"));
        }
        if let Some(label) = &filter.label {
            args.push("--filter".into());
            args.push(format!("label={label}"));
        }
        args.push("--format".into());
        args.push(JSON_FORMAT.into());

        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.cmd_runner.run(DOCKER, &argv).await.context("docker ps")?;
        let containers = parse_ps(&checked(&output, "docker ps")?)?;
        // The name filter is a substring match; narrow it to the exact name.
        Ok(match &filter.name {
            Some(name) => containers.into_iter().filter(|c| &c.name == name).collect(),
            None => containers,
        })
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let args = create_args(spec);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .cmd_runner
            .run(DOCKER, &argv)
            .await
            .context("docker create")?;
        let id = checked(&output, "docker create")?.trim().to_string();
        anyhow::ensure!(!id.is_empty(), "docker create printed no container id");
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let output = self
            .cmd_runner
            .run(DOCKER, &["start", id])
            .await
            .context("docker start")?;
        checked(&output, "docker start").map(|_| ())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        let secs = grace.as_secs().to_string();
        let output = self
            .cmd_runner
            .run_with_timeout(DOCKER, &["stop", "--time", &secs, id], grace + DEFAULT_CMD_TIMEOUT)
            .await
            .context("docker stop")?;
        checked(&output, "docker stop").map(|_| ())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let output = self
            .cmd_runner
            .run(DOCKER, &["rm", id])
            .await
            .context("docker rm")?;
        checked(&output, "docker rm").map(|_| ())
    }

    async fn wait_container(&self, id: &str) -> Result<i64> {
        let output = self
            .exec_runner
            .run(DOCKER, &["wait", id])
            .await
            .context("docker wait")?;
        let stdout = checked(&output, "docker wait")?;
        stdout
            .trim()
            .parse()
            .with_context(|| format!("parsing docker wait output '{}'", stdout.trim()))
    }

    async fn exec(&self, id: &str, request: &ExecRequest) -> Result<ExecOutput> {
        let mut args = vec!["exec"];
        if let Some(dir) = &request.workdir {
            args.push("--workdir");
            args.push(dir);
        }
        args.push(id);
        args.extend(request.argv.iter().map(String::as_str));

        let output = self
            .exec_runner
            .run(DOCKER, &args)
            .await
            .context("docker exec")?;
        let stderr = stderr_of(&output);
        if !output.status.success() && is_docker_exec_error(output.status.code(), &stderr) {
            anyhow::bail!("docker exec failed: {stderr}");
        }
        Ok(ExecOutput {
            exit_code: output.status.code().map_or(-1, i64::from),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn stats(&self, id: &str) -> Result<StatsSample> {
        let output = self
            .cmd_runner
            .run(DOCKER, &["stats", "--no-stream", "--format", JSON_FORMAT, id])
            .await
            .context("docker stats")?;
        parse_stats(&checked(&output, "docker stats")?)
    }
}

impl<R: CommandRunner> ImageStore for DockerCli<R> {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self
            .cmd_runner
            .run(DOCKER, &["image", "inspect", "--format", "{{.Id}}", image])
            .await
            .context("docker image inspect")?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = stderr_of(&output);
        if stderr.contains("No such image") || stderr.contains("No such object") {
            return Ok(false);
        }
        anyhow::bail!("docker image inspect failed: {stderr}")
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let output = self
            .exec_runner
            .run(DOCKER, &["pull", image])
            .await
            .context("docker pull")?;
        checked(&output, "docker pull").map(|_| ())
    }

    async fn commit_container(&self, id: &str, image: &str) -> Result<()> {
        let output = self
            .cmd_runner
            .run(DOCKER, &["commit", id, image])
            .await
            .context("docker commit")?;
        checked(&output, "docker commit").map(|_| ())
    }
}
