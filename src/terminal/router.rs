// ABOUTME: Decides whether a new terminal session runs on the host or inside a
// project's container, based on the live binding table

use std::path::{Path, PathBuf};
use tracing::debug;

use super::session::SessionTarget;
use crate::docker::BindingStore;
use crate::paths::normalize_project_path;

/// Routing decision for one session-create request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub target: SessionTarget,
    pub working_directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SessionRouter {
    bindings: BindingStore,
    workspace_mount: String,
}

impl SessionRouter {
    pub fn new(bindings: BindingStore, workspace_mount: impl Into<String>) -> Self {
        Self {
            bindings,
            workspace_mount: workspace_mount.into(),
        }
    }

    /// Route a working directory.
    ///
    /// A directory equal to or nested under a bound project goes to that
    /// project's container with the working directory rewritten to the
    /// workspace mount. Anything else stays on the host; no directory means
    /// the host home directory.
    pub fn route(&self, working_directory: Option<&Path>) -> Route {
        let Some(requested) = working_directory else {
            return Route {
                target: SessionTarget::Host,
                working_directory: home_directory(),
            };
        };

        let normalized = normalize_project_path(requested);
        match self.bindings.find_covering(&normalized) {
            Some(binding) => {
                debug!(
                    "Routing {} to container {}",
                    requested.display(),
                    binding.container_id
                );
                Route {
                    target: SessionTarget::Container {
                        container_id: binding.container_id,
                        remote_user: binding.remote_user,
                    },
                    working_directory: PathBuf::from(&self.workspace_mount),
                }
            }
            None => Route {
                target: SessionTarget::Host,
                working_directory: requested.to_path_buf(),
            },
        }
    }
}

fn home_directory() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("/"))
}
