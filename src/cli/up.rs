// ABOUTME: CLI up command - build and launch a project's container
//
// Resolves the project's devcontainer config, runs the lifecycle controller and
// reports the container id. A failed postCreateCommand still reports the
// running container.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{OutputFormat, UpArgs};
use crate::config::AppConfig;
use crate::docker::{LifecycleError, UpOptions};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Serialize)]
pub struct UpReport {
    pub project: PathBuf,
    pub container_id: String,
    /// Present when the container runs but provisioning failed
    pub provision_error: Option<String>,
}

/// Execute the up command
pub async fn execute(args: UpArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    config.runtime.locate_binary()?;
    let orchestrator = Orchestrator::new(config);
    let report = bring_up(&orchestrator, &args.project, args.rebuild).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Container {} running for {}", report.container_id, report.project.display());
        }
    }

    match report.provision_error {
        Some(diagnostics) => Err(anyhow!("postCreateCommand failed:\n{diagnostics}")),
        None => Ok(()),
    }
}

/// Resolve the project's config and bring its container up.
///
/// Errors for a missing config and for build/launch failures; a provisioning
/// failure is returned inside the report since the container is live.
pub async fn bring_up(orchestrator: &Orchestrator, project: &Path, rebuild: bool) -> Result<UpReport> {
    let resolved = orchestrator
        .resolve_config(project)
        .context("Failed to resolve devcontainer config")?
        .ok_or_else(|| anyhow!("No devcontainer config found in {}", project.display()))?;

    eprintln!("Starting container from {} ...", resolved.path.display());

    match orchestrator
        .up(project, &resolved.spec, UpOptions { rebuild })
        .await
    {
        Ok(container_id) => Ok(UpReport {
            project: project.to_path_buf(),
            container_id,
            provision_error: None,
        }),
        Err(LifecycleError::Provision {
            container_id,
            source,
        }) => Ok(UpReport {
            project: project.to_path_buf(),
            container_id,
            provision_error: Some(source.diagnostics()),
        }),
        Err(e) => Err(e.into()),
    }
}
