// ABOUTME: Interactive terminal sessions - routing, PTY backend and the
// session manager that multiplexes them

pub mod manager;
pub mod pty;
pub mod router;
pub mod session;

pub use manager::{ShellSettings, TerminalError, TerminalSessionManager};
pub use pty::{NativePtyBackend, PtyBackend, ShellCommand, ShellProcess, ShellWaiter, SpawnedShell};
pub use router::{Route, SessionRouter};
pub use session::{SessionEvent, SessionState, SessionTarget, TerminalSession};
