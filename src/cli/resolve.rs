// ABOUTME: CLI resolve command - show the devcontainer config a project uses
//
// Prints the winning config file and a summary of what a launch would do.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{OutputFormat, ResolveArgs};
use crate::config::{ConfigResolver, ContainerSpec, LaunchSource, Resolved};

/// Resolution outcome as reported to the user
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub project: PathBuf,
    pub config_path: Option<PathBuf>,
    pub spec: Option<ContainerSpec>,
    pub launchable: bool,
}

impl ResolveReport {
    pub fn new(project: &Path, resolved: Option<Resolved>) -> Self {
        match resolved {
            Some(Resolved { path, spec }) => Self {
                project: project.to_path_buf(),
                config_path: Some(path),
                launchable: spec.is_launchable(),
                spec: Some(spec),
            },
            None => Self {
                project: project.to_path_buf(),
                config_path: None,
                spec: None,
                launchable: false,
            },
        }
    }
}

/// Execute the resolve command
#[allow(clippy::unused_async)] // Async for consistency with other CLI commands
pub async fn execute(args: ResolveArgs, format: OutputFormat) -> Result<()> {
    let resolved = ConfigResolver::new().resolve(&args.project)?;
    let report = ResolveReport::new(&args.project, resolved);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => output_text(&report),
    }

    Ok(())
}

fn output_text(report: &ResolveReport) {
    let (Some(path), Some(spec)) = (&report.config_path, &report.spec) else {
        println!("No devcontainer config found in {}", report.project.display());
        return;
    };

    println!("Config:       {}", path.display());
    if let Some(name) = &spec.name {
        println!("Name:         {name}");
    }
    println!("Launch:       {}", describe_source(spec));
    if !spec.run_args.is_empty() {
        println!("Run args:     {}", spec.run_args.join(" "));
    }
    if let Some(command) = spec.post_create() {
        println!("Post-create:  {command}");
    }
    if !spec.forward_ports.is_empty() {
        let ports: Vec<String> = spec.forward_ports.iter().map(u16::to_string).collect();
        println!("Ports:        {}", ports.join(", "));
    }
    if let Some(user) = &spec.remote_user {
        println!("Remote user:  {user}");
    }
}

fn describe_source(spec: &ContainerSpec) -> String {
    match spec.launch_source() {
        Some(LaunchSource::Image(image)) => format!("image {image}"),
        Some(LaunchSource::Dockerfile(build)) => format!(
            "build {} (context {})",
            build.dockerfile.as_deref().unwrap_or_default(),
            build.context.as_deref().unwrap_or(".")
        ),
        None => "not launchable (no image or build.dockerfile)".to_string(),
    }
}
