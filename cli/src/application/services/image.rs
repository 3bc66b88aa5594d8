//! Application service — base image provisioning.
//!
//! When the agent base image is missing it is built once by running the
//! builder image with git installed and committing the result.

use anyhow::{Context, Result};

use crate::application::ports::{ContainerFilter, ContainerRuntime, ContainerSpec, ImageStore, ProgressReporter};

/// Name of the short-lived builder container. Deliberately outside the
/// `capsulate-<id>` namespace so it can never collide with an agent.
pub const BUILDER_CONTAINER: &str = "capsulate.image-builder";

const INSTALL_GIT: &str = "apt-get update && apt-get install -y git && rm -rf /var/lib/apt/lists/*";

/// Make sure `base_image` exists, building it from `builder_image` if not.
///
/// Returns `true` if the image had to be built.
///
/// # Errors
///
/// Returns an error if any pull, create, wait, commit or remove call fails,
/// or if the git installation exits non-zero.
pub async fn ensure_base_image(
    runtime: &(impl ContainerRuntime + ImageStore),
    reporter: &impl ProgressReporter,
    base_image: &str,
    builder_image: &str,
) -> Result<bool> {
    if runtime
        .image_exists(base_image)
        .await
        .with_context(|| format!("checking for image {base_image}"))?
    {
        return Ok(false);
    }

    reporter.step(&format!("building base image {base_image}..."));
    runtime
        .pull_image(builder_image)
        .await
        .with_context(|| format!("pulling {builder_image}"))?;

    remove_stale_builder(runtime).await;

    let spec = ContainerSpec {
        name: BUILDER_CONTAINER.to_string(),
        image: builder_image.to_string(),
        command: vec!["/bin/sh".into(), "-c".into(), INSTALL_GIT.into()],
        ..ContainerSpec::default()
    };
    let id = runtime
        .create_container(&spec)
        .await
        .context("creating image builder container")?;

    let built = build(runtime, &id, base_image).await;
    if let Err(e) = runtime.remove_container(&id).await {
        tracing::warn!(container = %id, error = %format!("{e:#}"), "failed to remove image builder");
    }
    built?;

    reporter.success(&format!("base image {base_image} built"));
    Ok(true)
}

async fn build(runtime: &(impl ContainerRuntime + ImageStore), id: &str, base_image: &str) -> Result<()> {
    runtime
        .start_container(id)
        .await
        .context("starting image builder container")?;
    let code = runtime
        .wait_container(id)
        .await
        .context("waiting for image builder container")?;
    anyhow::ensure!(code == 0, "installing git in the builder exited with code {code}");
    runtime
        .commit_container(id, base_image)
        .await
        .with_context(|| format!("committing {base_image}"))
}

async fn remove_stale_builder(runtime: &impl ContainerRuntime) {
    let filter = ContainerFilter::by_name(BUILDER_CONTAINER).including_stopped();
    let Ok(stale) = runtime.list_containers(&filter).await else {
        return;
    };
    for container in stale {
        tracing::info!(container = %container.id, "removing stale image builder");
        if let Err(e) = runtime.remove_container(&container.id).await {
            tracing::warn!(container = %container.id, error = %format!("{e:#}"), "failed to remove stale image builder");
        }
    }
}
