// ABOUTME: Container runtime command surface (build, detached run, exec, remove)
// Typed requests render to CLI argument vectors; DockerCli executes them

use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {diagnostics}")]
    Failed {
        command: String,
        status: String,
        diagnostics: String,
    },

    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
}

impl RuntimeError {
    /// Raw diagnostic text to show to the operator
    pub fn diagnostics(&self) -> String {
        match self {
            Self::Spawn { source, .. } => source.to_string(),
            Self::Failed { diagnostics, .. } => diagnostics.clone(),
            Self::TimedOut { timeout, .. } => {
                format!("no result after {}s; the process was killed", timeout.as_secs())
            }
        }
    }
}

/// Image build from a Dockerfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub tag: String,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub build_args: BTreeMap<String, String>,
    pub no_cache: bool,
}

impl BuildRequest {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if self.no_cache {
            args.push("--no-cache".to_string());
        }
        args.extend([
            "-t".to_string(),
            self.tag.clone(),
            "-f".to_string(),
            self.dockerfile.display().to_string(),
        ]);
        for (key, value) in &self.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(self.context.display().to_string());
        args
    }
}

/// Detached container launch with the project bound at the workspace mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub image: String,
    pub workspace_source: PathBuf,
    pub workspace_mount: String,
    pub network: String,
    pub extra_args: Vec<String>,
    pub command: Vec<String>,
}

impl RunRequest {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "-v".to_string(),
            format!("{}:{}", self.workspace_source.display(), self.workspace_mount),
            "-w".to_string(),
            self.workspace_mount.clone(),
            "--network".to_string(),
            self.network.clone(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Command execution inside a running container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub container_id: String,
    pub command: Vec<String>,
    pub workdir: Option<String>,
    pub user: Option<String>,
    /// Allocate a TTY and keep stdin open (`-it`)
    pub interactive: bool,
}

impl ExecRequest {
    /// Run `command` through `/bin/sh -c` so shell syntax is honored
    pub fn shell(container_id: &str, command: &str) -> Self {
        Self {
            container_id: container_id.to_string(),
            command: vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()],
            workdir: None,
            user: None,
            interactive: false,
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["exec".to_string()];
        if self.interactive {
            args.push("-it".to_string());
        }
        if let Some(workdir) = &self.workdir {
            args.push("-w".to_string());
            args.push(workdir.clone());
        }
        if let Some(user) = &self.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }
        args.push(self.container_id.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

/// Render a binary and its arguments as a copy-pasteable shell line
pub fn render_command(binary: &str, args: &[String]) -> String {
    std::iter::once(binary)
        .chain(args.iter().map(String::as_str))
        .map(|part| shell_escape::escape(Cow::Borrowed(part)).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The container runtime operations the lifecycle controller depends on.
///
/// Each call blocks (asynchronously) until the runtime process exits and
/// returns its stdout on success.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<String, RuntimeError>;

    async fn run(&self, request: &RunRequest) -> Result<String, RuntimeError>;

    async fn exec(&self, request: &ExecRequest) -> Result<String, RuntimeError>;

    /// Force-remove a container
    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;
}

/// Drives a docker-compatible command-line tool
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    build_timeout: Option<Duration>,
    run_timeout: Option<Duration>,
    exec_timeout: Option<Duration>,
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            build_timeout: None,
            run_timeout: None,
            exec_timeout: None,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            build_timeout: timeout_from_secs(config.build_timeout_secs),
            run_timeout: timeout_from_secs(config.run_timeout_secs),
            exec_timeout: timeout_from_secs(config.exec_timeout_secs),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn invoke(
        &self,
        args: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<String, RuntimeError> {
        let command = render_command(&self.binary, &args);
        debug!("Invoking container runtime: {}", command);

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        let waited = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Runtime invocation timed out after {:?}: {}", limit, command);
                    return Err(RuntimeError::TimedOut {
                        command,
                        timeout: limit,
                    });
                }
            },
            None => child.wait_with_output().await,
        };

        let output = waited.map_err(|source| RuntimeError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostics = if stderr.is_empty() {
            stdout.trim().to_string()
        } else {
            stderr
        };

        Err(RuntimeError::Failed {
            command,
            status: output.status.to_string(),
            diagnostics,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build(&self, request: &BuildRequest) -> Result<String, RuntimeError> {
        info!("Building image {} from {}", request.tag, request.dockerfile.display());
        self.invoke(request.to_args(), self.build_timeout).await
    }

    async fn run(&self, request: &RunRequest) -> Result<String, RuntimeError> {
        info!("Starting container from image {}", request.image);
        self.invoke(request.to_args(), self.run_timeout).await
    }

    async fn exec(&self, request: &ExecRequest) -> Result<String, RuntimeError> {
        info!("Executing in container {}: {:?}", request.container_id, request.command);
        self.invoke(request.to_args(), self.exec_timeout).await
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        info!("Removing container {}", container_id);
        let args = vec!["rm".to_string(), "-f".to_string(), container_id.to_string()];
        self.invoke(args, self.run_timeout).await.map(|_| ())
    }
}
