// ABOUTME: Terminal session data model - routing target, lifecycle state and
// the events a session publishes to subscribers

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where a session's shell runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionTarget {
    Host,
    Container {
        container_id: String,
        /// User the in-container shell runs as
        remote_user: Option<String>,
    },
}

impl SessionTarget {
    pub fn container_id(&self) -> Option<&str> {
        match self {
            Self::Host => None,
            Self::Container { container_id, .. } => Some(container_id),
        }
    }

    pub const fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Container { container_id, .. } => write!(f, "container {container_id}"),
        }
    }
}

/// Session state machine: Created -> Streaming -> Terminated.
/// Terminated is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Streaming,
    Terminated,
}

impl SessionState {
    /// Move to `next` unless the session already terminated
    pub fn advance(&mut self, next: Self) {
        if *self != Self::Terminated {
            *self = next;
        }
    }
}

/// Snapshot of one live interactive shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalSession {
    /// Process id of the spawned shell; the external handle
    pub session_id: u32,
    pub target: SessionTarget,
    /// Effective working directory (inside the container for container targets)
    pub working_directory: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub state: SessionState,
}

/// Notifications published by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Raw output chunk, in the order the process produced it
    Output { session_id: u32, data: Vec<u8> },
    /// The shell process ended; last event for this session id
    Exit {
        session_id: u32,
        exit_code: Option<u32>,
    },
}

impl SessionEvent {
    pub const fn session_id(&self) -> u32 {
        match self {
            Self::Output { session_id, .. } | Self::Exit { session_id, .. } => *session_id,
        }
    }
}
