// ABOUTME: CLI argument parsing and command routing for devharbor
//
// Provides command-line interface for:
// - Inspecting a project's container config (resolve)
// - Building and launching a project container (up)
// - Opening an interactive shell routed to host or container (shell)
// - Printing the effective application config (config)

pub mod config;
pub mod resolve;
pub mod shell;
pub mod up;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Development containers and routed terminal sessions for local projects
#[derive(Parser)]
#[command(name = "devharbor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for commands
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show which devcontainer config a project resolves to
    Resolve(ResolveArgs),

    /// Build (if needed) and start the project's container
    Up(UpArgs),

    /// Open an interactive shell, inside the project container when bound
    Shell(ShellArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the config command
#[derive(clap::Args)]
pub struct ConfigArgs {
    /// Also write the effective configuration to the user config file
    #[arg(long)]
    pub save: bool,
}

/// Arguments for the resolve command
#[derive(clap::Args)]
pub struct ResolveArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project: PathBuf,
}

/// Arguments for the up command
#[derive(clap::Args)]
pub struct UpArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project: PathBuf,

    /// Rebuild the image without cache
    #[arg(long)]
    pub rebuild: bool,
}

/// Arguments for the shell command
#[derive(clap::Args)]
pub struct ShellArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project: PathBuf,

    /// Working directory for the shell (default: the project directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Bring the project container up first and route the shell into it
    #[arg(long, short)]
    pub container: bool,

    /// Rebuild the image without cache (with --container)
    #[arg(long)]
    pub rebuild: bool,
}
