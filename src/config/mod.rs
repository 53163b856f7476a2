// ABOUTME: Configuration management for devharbor
// Handles layered application config and per-project devcontainer discovery

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod devcontainer;

pub use devcontainer::{
    BuildSpec, ConfigError, ConfigResolver, ContainerSpec, LaunchSource, Resolved,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Container runtime invocation settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Container lifecycle policy
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Terminal session defaults
    #[serde(default)]
    pub terminal: TerminalConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Container runtime executable (e.g. "docker", "podman")
    #[serde(default = "default_runtime_binary")]
    pub binary: String,

    /// Network mode passed to `run --network`
    #[serde(default = "default_network")]
    pub network: String,

    /// Fixed in-container path the project root is bound to
    #[serde(default = "default_workspace_mount")]
    pub workspace_mount: String,

    /// Long-lived command that keeps a launched container alive
    #[serde(default = "default_keepalive_command")]
    pub keepalive_command: Vec<String>,

    /// Prefix for image tags synthesized from Dockerfile builds
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,

    /// Build timeout in seconds (0 disables)
    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,

    /// Detached run timeout in seconds (0 disables)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Post-create exec timeout in seconds (0 disables)
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Force-remove the container a new `up` supersedes
    #[serde(default = "default_true")]
    pub remove_superseded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Shell for host sessions; falls back to $SHELL, then a platform default
    #[serde(default)]
    pub host_shell: Option<String>,

    /// Shell started inside containers via `exec -it`
    #[serde(default = "default_container_shell")]
    pub container_shell: String,

    /// Initial terminal width
    #[serde(default = "default_cols")]
    pub cols: u16,

    /// Initial terminal height
    #[serde(default = "default_rows")]
    pub rows: u16,

    /// Value exported as TERM to spawned shells
    #[serde(default = "default_term")]
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for JSONL log files (default: ~/.devharbor/logs)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_runtime_binary() -> String {
    "docker".to_string()
}

fn default_network() -> String {
    "host".to_string()
}

fn default_workspace_mount() -> String {
    "/workspace".to_string()
}

fn default_keepalive_command() -> Vec<String> {
    vec!["sleep".to_string(), "infinity".to_string()]
}

fn default_image_prefix() -> String {
    "devharbor".to_string()
}

const fn default_build_timeout() -> u64 {
    1800
}

const fn default_run_timeout() -> u64 {
    120
}

const fn default_exec_timeout() -> u64 {
    900
}

const fn default_true() -> bool {
    true
}

fn default_container_shell() -> String {
    "/bin/sh".to_string()
}

const fn default_cols() -> u16 {
    80
}

const fn default_rows() -> u16 {
    24
}

fn default_term() -> String {
    "xterm-256color".to_string()
}

fn default_log_filter() -> String {
    "devharbor=info".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: default_runtime_binary(),
            network: default_network(),
            workspace_mount: default_workspace_mount(),
            keepalive_command: default_keepalive_command(),
            image_prefix: default_image_prefix(),
            build_timeout_secs: default_build_timeout(),
            run_timeout_secs: default_run_timeout(),
            exec_timeout_secs: default_exec_timeout(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            remove_superseded: default_true(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            host_shell: None,
            container_shell: default_container_shell(),
            cols: default_cols(),
            rows: default_rows(),
            term: default_term(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: default_log_filter(),
        }
    }
}

impl RuntimeConfig {
    /// Check that the runtime executable can be found on PATH
    pub fn locate_binary(&self) -> Result<PathBuf> {
        which::which(&self.binary)
            .with_context(|| format!("Container runtime '{}' not found on PATH", self.binary))
    }
}

impl TerminalConfig {
    /// Resolve the shell used for host sessions
    pub fn resolve_host_shell(&self) -> String {
        if let Some(shell) = &self.host_shell {
            return shell.clone();
        }
        if cfg!(windows) {
            return "powershell.exe".to_string();
        }
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "/bin/bash".to_string())
    }
}

impl LoggingConfig {
    /// Resolve the log directory, defaulting under the user's home
    pub fn resolve_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".devharbor").join("logs"))
                .unwrap_or_else(|| PathBuf::from(".devharbor/logs"))
        })
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from_paths(&Self::get_config_paths())
    }

    /// Load and deep-merge the given files; later files win
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in paths {
            if !path.exists() {
                continue;
            }

            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;

            let layer: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?;

            merge_values(&mut merged, layer);
        }

        merged
            .try_into()
            .context("Failed to interpret merged configuration")
    }

    /// Save configuration to user config directory
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::get_user_config_dir()?;
        fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Get configuration file paths, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/devharbor/config.toml")];

        if let Ok(config_dir) = Self::get_user_config_dir() {
            paths.push(config_dir.join("config.toml"));
        }

        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(".devharbor").join("config.toml"));
        }

        paths
    }

    /// Get user configuration directory
    fn get_user_config_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home_dir.join(".devharbor").join("config"))
    }
}

/// Recursively merge `overlay` into `base`; tables merge, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
