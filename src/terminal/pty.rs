// ABOUTME: PTY process backend for terminal sessions
//
// Abstracts spawning a shell on a pseudo-terminal, providing:
// - Blocking byte reader/writer halves for the session streams
// - Resize and kill control separate from waiting on exit
// - A native implementation over portable-pty

use anyhow::{anyhow, Context, Result};
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Program, arguments and environment for a session shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Host-side working directory; `None` inherits ours
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }
}

/// Resize and terminate a running shell
pub trait ShellProcess: Send {
    fn resize(&self, cols: u16, rows: u16) -> Result<()>;

    fn kill(&mut self) -> Result<()>;
}

/// Blocks until the shell exits
pub trait ShellWaiter: Send {
    /// Exit code, if it could be determined
    fn wait(&mut self) -> Option<u32>;
}

/// Everything the session manager needs from a freshly spawned shell
pub struct SpawnedShell {
    pub pid: u32,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub process: Box<dyn ShellProcess>,
    pub waiter: Box<dyn ShellWaiter>,
}

impl std::fmt::Debug for SpawnedShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedShell").field("pid", &self.pid).finish()
    }
}

/// Spawns shells attached to a terminal
pub trait PtyBackend: Send + Sync {
    fn spawn(&self, command: &ShellCommand, cols: u16, rows: u16) -> Result<SpawnedShell>;
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Shells on the platform's native pseudo-terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePtyBackend;

impl PtyBackend for NativePtyBackend {
    fn spawn(&self, command: &ShellCommand, cols: u16, rows: u16) -> Result<SpawnedShell> {
        let pty_system = portable_pty::native_pty_system();
        let pair = pty_system
            .openpty(pty_size(cols, rows))
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        if let Some(cwd) = &command.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn '{}' in PTY", command.program))?;

        // The slave end must close so the reader sees EOF when the shell exits
        drop(pair.slave);

        let Some(pid) = child.process_id() else {
            let mut killer = child.clone_killer();
            let _ = killer.kill();
            return Err(anyhow!("Spawned '{}' but it reported no process id", command.program));
        };

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let writer = pair.master.take_writer().context("Failed to take PTY writer")?;
        let killer = child.clone_killer();

        Ok(SpawnedShell {
            pid,
            reader,
            writer,
            process: Box::new(NativeShellProcess {
                master: pair.master,
                killer,
            }),
            waiter: Box::new(NativeShellWaiter { child }),
        })
    }
}

struct NativeShellProcess {
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
}

impl ShellProcess for NativeShellProcess {
    fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.master.resize(pty_size(cols, rows))?;
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        self.killer.kill().context("Failed to kill shell process")
    }
}

struct NativeShellWaiter {
    child: Box<dyn Child + Send + Sync>,
}

impl ShellWaiter for NativeShellWaiter {
    fn wait(&mut self) -> Option<u32> {
        self.child.wait().ok().map(|status| status.exit_code())
    }
}
