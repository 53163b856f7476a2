// ABOUTME: Orchestrator facade wiring config resolution, the container lifecycle
// controller and the terminal session manager around one shared binding store

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, ConfigError, ConfigResolver, ContainerSpec, Resolved};
use crate::docker::{
    BindingStore, ContainerLifecycleController, ContainerRuntime, DockerCli, LifecycleError,
    UpOptions,
};
use crate::terminal::{
    NativePtyBackend, PtyBackend, SessionRouter, ShellSettings, TerminalSessionManager,
};

/// One orchestrator per process. Owns the binding store shared by the
/// lifecycle controller (writer) and the session router (reader).
#[derive(Debug)]
pub struct Orchestrator {
    resolver: ConfigResolver,
    bindings: BindingStore,
    lifecycle: Arc<ContainerLifecycleController>,
    terminals: TerminalSessionManager,
}

impl Orchestrator {
    /// Wire the docker CLI runtime and native PTYs from `config`
    pub fn new(config: &AppConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(DockerCli::from_config(&config.runtime)),
            Arc::new(NativePtyBackend),
        )
    }

    pub fn with_parts(
        config: &AppConfig,
        runtime: Arc<dyn ContainerRuntime>,
        backend: Arc<dyn PtyBackend>,
    ) -> Self {
        let bindings = BindingStore::new();
        let lifecycle = Arc::new(ContainerLifecycleController::new(
            runtime,
            bindings.clone(),
            config.runtime.clone(),
            config.lifecycle.clone(),
        ));
        let router = SessionRouter::new(bindings.clone(), config.runtime.workspace_mount.clone());
        let settings = ShellSettings::from_config(
            &config.terminal,
            &config.runtime.binary,
            &config.runtime.workspace_mount,
        );

        Self {
            resolver: ConfigResolver::new(),
            bindings,
            lifecycle,
            terminals: TerminalSessionManager::new(router, backend, settings),
        }
    }

    /// Find and parse the project's container config; `Ok(None)` if absent
    pub fn resolve_config(&self, project: &Path) -> Result<Option<Resolved>, ConfigError> {
        self.resolver.resolve(project)
    }

    pub async fn up(
        &self,
        project: &Path,
        spec: &ContainerSpec,
        options: UpOptions,
    ) -> Result<String, LifecycleError> {
        self.lifecycle.up(project, spec, options).await
    }

    /// Start `up` as a background task so session creation is never blocked
    pub fn spawn_up(
        &self,
        project: PathBuf,
        spec: ContainerSpec,
        options: UpOptions,
    ) -> JoinHandle<Result<String, LifecycleError>> {
        self.lifecycle.spawn_up(project, spec, options)
    }

    pub const fn terminals(&self) -> &TerminalSessionManager {
        &self.terminals
    }

    pub const fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn lifecycle(&self) -> &Arc<ContainerLifecycleController> {
        &self.lifecycle
    }
}
