// ABOUTME: CLI shell command - bridge the local terminal to a routed session
//
// Optionally brings the project container up first so the session routes into
// it, then forwards raw stdin to the session and session output to stdout
// until the shell exits.

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{Read, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::up::bring_up;
use super::ShellArgs;
use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use crate::terminal::SessionEvent;

/// Restores cooked mode when dropped
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw terminal mode")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

#[cfg(unix)]
struct ResizeWatcher(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ResizeWatcher {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::window_change())?))
    }

    async fn changed(&mut self) -> Option<()> {
        self.0.recv().await
    }
}

#[cfg(not(unix))]
struct ResizeWatcher;

#[cfg(not(unix))]
impl ResizeWatcher {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn changed(&mut self) -> Option<()> {
        std::future::pending().await
    }
}

/// Execute the shell command
pub async fn execute(args: ShellArgs, config: &AppConfig) -> Result<()> {
    let orchestrator = Orchestrator::new(config);

    if args.container {
        config.runtime.locate_binary()?;
        let report = bring_up(&orchestrator, &args.project, args.rebuild).await?;
        if let Some(diagnostics) = &report.provision_error {
            eprintln!("postCreateCommand failed; continuing in the running container:\n{diagnostics}");
        }
    }

    let working_directory: PathBuf = args.cwd.unwrap_or(args.project);
    let terminals = orchestrator.terminals();
    let mut events = terminals.subscribe();
    let session_id = terminals
        .create(Some(&working_directory))
        .context("Failed to start shell session")?;

    if let Some(session) = terminals.get(session_id) {
        eprintln!(
            "Session {} on {} in {}\r",
            session_id,
            session.target,
            session.working_directory.display()
        );
    }

    if let Ok((cols, rows)) = crossterm::terminal::size() {
        terminals.resize(session_id, cols, rows)?;
    }

    let raw = RawModeGuard::enable()?;
    let mut input = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut resizes = ResizeWatcher::new()?;
    let mut stdout = std::io::stdout();

    let exit_code = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Output { session_id: id, data }) if id == session_id => {
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
                Some(SessionEvent::Exit { session_id: id, exit_code }) if id == session_id => {
                    break exit_code;
                }
                Some(_) => {}
                None => break None,
            },
            bytes = input.recv(), if stdin_open => match bytes {
                Some(bytes) => terminals.write(session_id, &bytes)?,
                None => {
                    debug!("stdin closed; disposing session {}", session_id);
                    stdin_open = false;
                    terminals.dispose(session_id);
                }
            },
            Some(()) = resizes.changed() => {
                if let Ok((cols, rows)) = crossterm::terminal::size() {
                    if let Err(e) = terminals.resize(session_id, cols, rows) {
                        warn!("Failed to resize session {}: {}", session_id, e);
                    }
                }
            }
        }
    };

    drop(raw);
    debug!("Session {} ended with {:?}", session_id, exit_code);
    match exit_code {
        Some(0) | None => Ok(()),
        Some(code) => Err(anyhow::anyhow!("Shell exited with status {code}")),
    }
}

/// Read stdin on a blocking thread and forward chunks to the async loop
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}
