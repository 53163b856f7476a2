// ABOUTME: Terminal session manager - owns live shell processes keyed by pid,
// forwards input and control operations and publishes output/exit events

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::pty::{PtyBackend, ShellCommand, ShellProcess, ShellWaiter};
use super::router::{Route, SessionRouter};
use super::session::{SessionEvent, SessionState, SessionTarget, TerminalSession};
use crate::config::TerminalConfig;
use crate::docker::ExecRequest;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Failed to start shell '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Session {session_id} I/O failed: {source}")]
    Io {
        session_id: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Session {session_id} PTY control failed: {reason}")]
    Pty { session_id: u32, reason: String },
}

/// Settings the manager needs to build shell commands
#[derive(Debug, Clone)]
pub struct ShellSettings {
    pub host_shell: String,
    pub container_shell: String,
    pub runtime_binary: String,
    pub workspace_mount: String,
    pub cols: u16,
    pub rows: u16,
    pub term: String,
}

impl ShellSettings {
    pub fn from_config(terminal: &TerminalConfig, runtime_binary: &str, workspace_mount: &str) -> Self {
        Self {
            host_shell: terminal.resolve_host_shell(),
            container_shell: terminal.container_shell.clone(),
            runtime_binary: runtime_binary.to_string(),
            workspace_mount: workspace_mount.to_string(),
            cols: terminal.cols,
            rows: terminal.rows,
            term: terminal.term.clone(),
        }
    }

    fn command_for(&self, route: &Route) -> ShellCommand {
        let mut command = match &route.target {
            SessionTarget::Host => {
                let mut command = ShellCommand::new(&self.host_shell);
                command.cwd = Some(route.working_directory.clone());
                command
            }
            SessionTarget::Container {
                container_id,
                remote_user,
            } => {
                let exec = ExecRequest {
                    container_id: container_id.clone(),
                    command: vec![self.container_shell.clone()],
                    workdir: Some(self.workspace_mount.clone()),
                    user: remote_user.clone(),
                    interactive: true,
                };
                let mut command = ShellCommand::new(&self.runtime_binary);
                command.args = exec.to_args();
                command
            }
        };
        command.env.push(("TERM".to_string(), self.term.clone()));
        command
    }
}

struct LiveSession {
    /// Distinguishes this session from a later one that reuses the pid
    token: u64,
    info: TerminalSession,
    /// Locked on its own so a blocked write never holds up control operations
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    process: Box<dyn ShellProcess>,
}

type SessionMap = HashMap<u32, Arc<Mutex<LiveSession>>>;

/// Fan-out of session events to every open subscription.
/// Dropping a receiver unsubscribes it.
#[derive(Clone, Default)]
struct EventHub {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>>,
}

impl EventHub {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    fn publish(&self, event: SessionEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Owns every live terminal session.
///
/// Sessions are addressed by the pid of their shell. Operations on an id
/// with no live session are silent no-ops.
pub struct TerminalSessionManager {
    router: SessionRouter,
    backend: Arc<dyn PtyBackend>,
    settings: ShellSettings,
    sessions: Arc<Mutex<SessionMap>>,
    events: EventHub,
    next_token: AtomicU64,
}

impl std::fmt::Debug for TerminalSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSessionManager")
            .field("settings", &self.settings)
            .field("live_sessions", &lock(&self.sessions).len())
            .finish()
    }
}

impl TerminalSessionManager {
    pub fn new(router: SessionRouter, backend: Arc<dyn PtyBackend>, settings: ShellSettings) -> Self {
        Self {
            router,
            backend,
            settings,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events: EventHub::default(),
            next_token: AtomicU64::new(1),
        }
    }

    /// Open an event subscription. Events published before this call are not
    /// replayed; drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Route, spawn and start streaming a shell. Returns its pid.
    pub fn create(&self, working_directory: Option<&Path>) -> Result<u32, TerminalError> {
        let route = self.router.route(working_directory);
        let command = self.settings.command_for(&route);
        let (cols, rows) = (self.settings.cols, self.settings.rows);

        let shell = self
            .backend
            .spawn(&command, cols, rows)
            .map_err(|e| {
                warn!("Failed to spawn {} shell '{}': {:#}", route.target, command.program, e);
                TerminalError::Spawn {
                    program: command.program.clone(),
                    reason: format!("{e:#}"),
                }
            })?;

        let session_id = shell.pid;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let live = Arc::new(Mutex::new(LiveSession {
            token,
            info: TerminalSession {
                session_id,
                target: route.target.clone(),
                working_directory: route.working_directory.clone(),
                cols,
                rows,
                state: SessionState::Created,
            },
            writer: Arc::new(Mutex::new(shell.writer)),
            process: shell.process,
        }));

        // Registered before streaming starts so an immediate exit finds it
        lock(&self.sessions).insert(session_id, Arc::clone(&live));

        let sessions = Arc::clone(&self.sessions);
        let events = self.events.clone();
        let reader = shell.reader;
        let waiter = shell.waiter;
        let spawned = std::thread::Builder::new()
            .name(format!("pty-session-{session_id}"))
            .spawn(move || stream_session(session_id, token, reader, waiter, &sessions, &events));

        if let Err(e) = spawned {
            warn!("Failed to start output thread for session {}: {}", session_id, e);
            if let Some(live) = lock(&self.sessions).remove(&session_id) {
                let _ = lock(&live).process.kill();
            }
            return Err(TerminalError::Spawn {
                program: command.program,
                reason: format!("output thread: {e}"),
            });
        }

        lock(&live).info.state.advance(SessionState::Streaming);
        info!(
            "Created session {} on {} in {}",
            session_id,
            route.target,
            route.working_directory.display()
        );
        Ok(session_id)
    }

    fn live(&self, session_id: u32) -> Option<Arc<Mutex<LiveSession>>> {
        lock(&self.sessions).get(&session_id).cloned()
    }

    /// Forward input bytes to the session; unknown ids are ignored
    pub fn write(&self, session_id: u32, data: &[u8]) -> Result<(), TerminalError> {
        let Some(live) = self.live(session_id) else {
            debug!("Ignoring write to unknown session {}", session_id);
            return Ok(());
        };

        let writer = Arc::clone(&lock(&live).writer);
        let mut writer = lock(&writer);
        writer
            .write_all(data)
            .and_then(|()| writer.flush())
            .map_err(|source| TerminalError::Io { session_id, source })
    }

    /// Forward a geometry change; unknown ids are ignored
    pub fn resize(&self, session_id: u32, cols: u16, rows: u16) -> Result<(), TerminalError> {
        let Some(live) = self.live(session_id) else {
            debug!("Ignoring resize of unknown session {}", session_id);
            return Ok(());
        };

        let mut session = lock(&live);
        session
            .process
            .resize(cols, rows)
            .map_err(|e| TerminalError::Pty {
                session_id,
                reason: format!("{e:#}"),
            })?;
        session.info.cols = cols;
        session.info.rows = rows;
        debug!("Resized session {} to {}x{}", session_id, cols, rows);
        Ok(())
    }

    /// Kill the session's process and drop it from the live set; unknown ids
    /// are ignored. The exit event still follows once the process is reaped.
    pub fn dispose(&self, session_id: u32) {
        let Some(live) = lock(&self.sessions).remove(&session_id) else {
            debug!("Ignoring dispose of unknown session {}", session_id);
            return;
        };

        let mut session = lock(&live);
        session.info.state.advance(SessionState::Terminated);
        if let Err(e) = session.process.kill() {
            warn!("Failed to kill session {}: {:#}", session_id, e);
        }
        info!("Disposed session {}", session_id);
    }

    /// Snapshot of a live session
    pub fn get(&self, session_id: u32) -> Option<TerminalSession> {
        self.live(session_id).map(|live| lock(&live).info.clone())
    }

    /// Ids of live sessions, ascending
    pub fn list(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = lock(&self.sessions).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Dispose every live session
    pub fn shutdown(&self) {
        for session_id in self.list() {
            self.dispose(session_id);
        }
    }
}

impl Drop for TerminalSessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pump output until EOF, then reap the process, retire the session and
/// publish its exit.
fn stream_session(
    session_id: u32,
    token: u64,
    mut reader: Box<dyn Read + Send>,
    mut waiter: Box<dyn ShellWaiter>,
    sessions: &Mutex<SessionMap>,
    events: &EventHub,
) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => events.publish(SessionEvent::Output {
                session_id,
                data: buf[..n].to_vec(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // EIO from the master is how Linux reports a closed slave
            Err(e) => {
                debug!("Session {} output ended: {}", session_id, e);
                break;
            }
        }
    }

    let exit_code = waiter.wait();

    let current = lock(sessions).get(&session_id).cloned();
    if let Some(live) = current.filter(|live| lock(live).token == token) {
        let removed = {
            let mut sessions = lock(sessions);
            let still_registered = sessions
                .get(&session_id)
                .is_some_and(|entry| Arc::ptr_eq(entry, &live));
            still_registered && sessions.remove(&session_id).is_some()
        };
        if removed {
            lock(&live).info.state.advance(SessionState::Terminated);
        }
    }

    info!("Session {} exited with {:?}", session_id, exit_code);
    events.publish(SessionEvent::Exit {
        session_id,
        exit_code,
    });
}
