// ABOUTME: Project -> container bindings recorded by the lifecycle controller
// and consulted by the session router

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// One project root bound to one running container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerBinding {
    /// Absolute, normalized project root
    pub project_path: PathBuf,
    pub container_id: String,
    pub started_at: DateTime<Utc>,
    /// User container sessions run as (the config's remoteUser)
    pub remote_user: Option<String>,
}

impl ContainerBinding {
    pub fn new(project_path: PathBuf, container_id: String, remote_user: Option<String>) -> Self {
        Self {
            project_path,
            container_id,
            started_at: Utc::now(),
            remote_user,
        }
    }

    /// True if `path` is the project root or nested under it (component-wise)
    pub fn covers(&self, path: &Path) -> bool {
        path.starts_with(&self.project_path)
    }
}

/// Shared, insertion-ordered binding table. At most one binding per project path.
#[derive(Debug, Clone, Default)]
pub struct BindingStore {
    inner: Arc<RwLock<Vec<ContainerBinding>>>,
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ContainerBinding>> {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<ContainerBinding>> {
        self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record a binding, replacing any binding for the same project path.
    /// Returns the superseded binding, if any.
    pub fn bind(&self, binding: ContainerBinding) -> Option<ContainerBinding> {
        let mut bindings = self.write();
        info!(
            "Binding {} -> container {}",
            binding.project_path.display(),
            binding.container_id
        );

        match bindings
            .iter_mut()
            .find(|existing| existing.project_path == binding.project_path)
        {
            Some(existing) => Some(std::mem::replace(existing, binding)),
            None => {
                bindings.push(binding);
                None
            }
        }
    }

    pub fn get(&self, project_path: &Path) -> Option<ContainerBinding> {
        self.read()
            .iter()
            .find(|binding| binding.project_path == project_path)
            .cloned()
    }

    /// First binding, in insertion order, whose project covers `path`
    pub fn find_covering(&self, path: &Path) -> Option<ContainerBinding> {
        self.read().iter().find(|binding| binding.covers(path)).cloned()
    }

    pub fn list(&self) -> Vec<ContainerBinding> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
