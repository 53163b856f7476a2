// ABOUTME: Container lifecycle controller - builds images, launches project containers,
// runs the post-create command and records project -> container bindings

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::binding::{BindingStore, ContainerBinding};
use super::runtime::{BuildRequest, ContainerRuntime, ExecRequest, RunRequest, RuntimeError};
use crate::config::{BuildSpec, ContainerSpec, LaunchSource, LifecycleConfig, RuntimeConfig};
use crate::paths::{normalize_lexically, normalize_project_path};

lazy_static! {
    static ref TAG_SEPARATORS: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No image and no usable build.dockerfile in container config for {}", project.display())]
    ConfigInvalid { project: PathBuf },

    #[error("Image build failed: {0}")]
    Build(#[source] RuntimeError),

    #[error("Container launch failed: {0}")]
    Launch(#[source] RuntimeError),

    #[error("Post-create command failed in container {container_id}: {source}")]
    Provision {
        container_id: String,
        #[source]
        source: RuntimeError,
    },
}

impl LifecycleError {
    /// Runtime diagnostic output attached to the failure, if any
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            Self::ConfigInvalid { .. } => None,
            Self::Build(source) | Self::Launch(source) | Self::Provision { source, .. } => {
                Some(source.diagnostics())
            }
        }
    }

    /// Container that is running and bound despite this error
    pub fn live_container(&self) -> Option<&str> {
        match self {
            Self::Provision { container_id, .. } => Some(container_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpOptions {
    /// Force a no-cache image build
    pub rebuild: bool,
}

pub struct ContainerLifecycleController {
    runtime: Arc<dyn ContainerRuntime>,
    bindings: BindingStore,
    settings: RuntimeConfig,
    policy: LifecycleConfig,
    /// Per-project locks so `up` calls for one project run one at a time
    in_flight: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for ContainerLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerLifecycleController")
            .field("bindings", &self.bindings.len())
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ContainerLifecycleController {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        bindings: BindingStore,
        settings: RuntimeConfig,
        policy: LifecycleConfig,
    ) -> Self {
        Self {
            runtime,
            bindings,
            settings,
            policy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub const fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    /// Build (if needed) and launch a container for `project`, run its
    /// post-create command and bind the project to it.
    ///
    /// # Returns
    /// * The trimmed container id reported by the runtime.
    ///
    /// A `Provision` error still leaves the new container bound; see
    /// [`LifecycleError::live_container`].
    pub async fn up(
        &self,
        project: &Path,
        spec: &ContainerSpec,
        options: UpOptions,
    ) -> Result<String, LifecycleError> {
        let project = normalize_project_path(project);

        let Some(source) = spec.launch_source() else {
            warn!("Refusing to start {}: no image or dockerfile", project.display());
            return Err(LifecycleError::ConfigInvalid { project });
        };

        let lock = self.project_lock(&project).await;
        let result = {
            let _guard = lock.lock().await;
            self.up_locked(&project, spec, source, options).await
        };
        self.release_project_lock(&project, lock).await;
        result
    }

    async fn up_locked(
        &self,
        project: &Path,
        spec: &ContainerSpec,
        source: LaunchSource<'_>,
        options: UpOptions,
    ) -> Result<String, LifecycleError> {
        // Step 1: Resolve the image, building it when needed
        let image = match source {
            LaunchSource::Image(image) => image.to_string(),
            LaunchSource::Dockerfile(build) => {
                let request = self.build_request(project, build, options.rebuild);
                if let Err(e) = self.runtime.build(&request).await {
                    error!("Image build failed for {}: {}", project.display(), e);
                    return Err(LifecycleError::Build(e));
                }
                info!("Built image {}", request.tag);
                request.tag
            }
        };

        // Step 2: Launch detached and read back the container id
        let run = self.run_request(project, &image, spec);
        let output = self.runtime.run(&run).await.map_err(|e| {
            error!("Container launch failed for {}: {}", project.display(), e);
            LifecycleError::Launch(e)
        })?;

        let container_id = output.trim().to_string();
        if container_id.is_empty() {
            error!("Container launch for {} printed no container id", project.display());
            return Err(LifecycleError::Launch(RuntimeError::Failed {
                command: format!("{} run", self.settings.binary),
                status: "exit status: 0".to_string(),
                diagnostics: format!("no container id in output {output:?}"),
            }));
        }
        info!("Container {} started for {}", container_id, project.display());

        // Step 3: Bind before provisioning; the container is usable either way
        let previous = self.bindings.bind(ContainerBinding::new(
            project.to_path_buf(),
            container_id.clone(),
            spec.remote_user.clone(),
        ));

        if let Some(previous) = previous {
            self.retire(&previous, &container_id).await;
        }

        // Step 4: Post-create command
        if let Some(command) = spec.post_create() {
            info!("Running postCreateCommand in {}: {}", container_id, command);
            let mut exec = ExecRequest::shell(&container_id, command);
            exec.workdir = Some(self.settings.workspace_mount.clone());
            exec.user = spec.remote_user.clone();

            if let Err(source) = self.runtime.exec(&exec).await {
                warn!("postCreateCommand failed in {}: {}", container_id, source);
                return Err(LifecycleError::Provision {
                    container_id,
                    source,
                });
            }
        }

        Ok(container_id)
    }

    /// Run `up` as an independent task
    pub fn spawn_up(
        self: &Arc<Self>,
        project: PathBuf,
        spec: ContainerSpec,
        options: UpOptions,
    ) -> JoinHandle<Result<String, LifecycleError>> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.up(&project, &spec, options).await })
    }

    async fn project_lock(&self, project: &Path) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(project.to_path_buf()).or_default())
    }

    /// Drop the project's lock entry once no other `up` holds or awaits it
    async fn release_project_lock(&self, project: &Path, lock: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        drop(lock);
        if in_flight
            .get(project)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            in_flight.remove(project);
        }
    }

    async fn retire(&self, previous: &ContainerBinding, replacement: &str) {
        if previous.container_id == replacement {
            return;
        }

        if !self.policy.remove_superseded {
            info!(
                "Container {} superseded by {}; leaving it running",
                previous.container_id, replacement
            );
            return;
        }

        if let Err(e) = self.runtime.remove(&previous.container_id).await {
            warn!(
                "Failed to remove superseded container {}: {}",
                previous.container_id, e
            );
        }
    }

    fn build_request(&self, project: &Path, build: &BuildSpec, rebuild: bool) -> BuildRequest {
        let dockerfile = build.dockerfile.as_deref().unwrap_or("Dockerfile");
        let context = build
            .context
            .as_deref()
            .map_or_else(|| project.to_path_buf(), |c| normalize_lexically(&project.join(c)));

        BuildRequest {
            tag: self.image_tag(project),
            dockerfile: normalize_lexically(&project.join(dockerfile)),
            context,
            build_args: build.args.clone(),
            no_cache: rebuild,
        }
    }

    fn run_request(&self, project: &Path, image: &str, spec: &ContainerSpec) -> RunRequest {
        RunRequest {
            image: image.to_string(),
            workspace_source: project.to_path_buf(),
            workspace_mount: self.settings.workspace_mount.clone(),
            network: self.settings.network.clone(),
            extra_args: spec.run_args.clone(),
            command: self.settings.keepalive_command.clone(),
        }
    }

    /// `<prefix>-<project basename>-<millis>` as a valid image repository name
    fn image_tag(&self, project: &Path) -> String {
        let base = project
            .file_name()
            .map(|n| tag_component(&n.to_string_lossy(), 64))
            .unwrap_or_default();
        let base = if base.is_empty() { "project".to_string() } else { base };

        let prefix = tag_component(&self.settings.image_prefix, 64);
        let prefix = if prefix.is_empty() { "devharbor".to_string() } else { prefix };
        format!("{}-{}-{}", prefix, base, chrono::Utc::now().timestamp_millis())
    }
}

/// Lowercase alphanumeric runs joined by single dashes, at most `max` chars
fn tag_component(raw: &str, max: usize) -> String {
    let lowered = raw.to_lowercase();
    let joined = TAG_SEPARATORS.replace_all(&lowered, "-");
    let truncated: String = joined.trim_matches('-').chars().take(max).collect();
    truncated.trim_end_matches('-').to_string()
}
