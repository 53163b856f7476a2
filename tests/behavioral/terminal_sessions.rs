// ABOUTME: Behavioral tests for the terminal session manager
// Verifies session control forwarding, event tagging and removal on exit/dispose

use crate::fixtures::{RecordingRuntime, ScriptedPty};
use devharbor::config::AppConfig;
use devharbor::orchestrator::Orchestrator;
use devharbor::terminal::{SessionEvent, SessionState, SessionTarget};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

fn orchestrator() -> (Orchestrator, Arc<ScriptedPty>) {
    let pty = ScriptedPty::new();
    let orchestrator = Orchestrator::with_parts(&AppConfig::default(), RecordingRuntime::new(), pty.clone());
    (orchestrator, pty)
}

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event stream closed")
}

/// No working directory routes to host; write/resize forward; dispose makes writes no-ops
#[tokio::test]
async fn test_host_session_lifecycle() {
    let (orchestrator, pty) = orchestrator();
    let terminals = orchestrator.terminals();
    let mut events = terminals.subscribe();

    let id = terminals.create(None).unwrap();
    let session = terminals.get(id).unwrap();
    assert_eq!(session.target, SessionTarget::Host);
    assert_eq!(session.state, SessionState::Streaming);
    assert_eq!(terminals.list(), vec![id]);

    let shell = pty.shell(id);
    assert!(shell
        .command
        .env
        .contains(&("TERM".to_string(), "xterm-256color".to_string())));

    terminals.write(id, b"echo hi\n").unwrap();
    terminals.resize(id, 132, 43).unwrap();
    assert_eq!(shell.input(), b"echo hi\n".to_vec());
    assert_eq!(shell.sizes.lock().unwrap().last(), Some(&(132, 43)));

    terminals.dispose(id);
    assert!(*shell.killed.lock().unwrap());
    assert!(terminals.get(id).is_none());

    terminals.write(id, b"ignored\n").unwrap();
    assert_eq!(shell.input(), b"echo hi\n".to_vec());

    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Exit { session_id, .. } if session_id == id
    ));
}

/// Output chunks arrive tagged with their session, in order, across sessions
#[tokio::test]
async fn test_output_tagged_per_session() {
    let (orchestrator, pty) = orchestrator();
    let terminals = orchestrator.terminals();
    let mut events = terminals.subscribe();

    let first = terminals.create(None).unwrap();
    let second = terminals.create(None).unwrap();
    assert_ne!(first, second);

    pty.shell(first).emit(b"a1");
    pty.shell(first).emit(b"a2");
    pty.shell(second).emit(b"b1");

    let mut per_session: Vec<(u32, Vec<u8>)> = Vec::new();
    while per_session.len() < 3 {
        if let SessionEvent::Output { session_id, data } = next_event(&mut events).await {
            per_session.push((session_id, data));
        }
    }

    let from_first: Vec<Vec<u8>> = per_session
        .iter()
        .filter(|(id, _)| *id == first)
        .map(|(_, data)| data.clone())
        .collect();
    assert_eq!(from_first, vec![b"a1".to_vec(), b"a2".to_vec()]);
    assert!(per_session.contains(&(second, b"b1".to_vec())));
}

/// A shell that exits on its own publishes its exit code and leaves the live set
#[tokio::test]
async fn test_spontaneous_exit_is_reported() {
    let (orchestrator, pty) = orchestrator();
    let terminals = orchestrator.terminals();
    let mut events = terminals.subscribe();

    let id = terminals.create(None).unwrap();
    pty.shell(id).exit(7);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Exit {
            session_id: id,
            exit_code: Some(7)
        }
    );
    assert!(terminals.list().is_empty());

    // Terminated sessions are not revived by later operations
    terminals.resize(id, 80, 24).unwrap();
    terminals.dispose(id);
    assert!(terminals.get(id).is_none());
}

/// Operations on ids that were never created do nothing
#[test]
fn test_unknown_session_is_noop() {
    let (orchestrator, pty) = orchestrator();
    let terminals = orchestrator.terminals();

    terminals.write(999, b"data").unwrap();
    terminals.resize(999, 100, 30).unwrap();
    terminals.dispose(999);

    assert_eq!(pty.spawned(), 0);
    assert!(terminals.list().is_empty());
}

/// Dropping a subscription unsubscribes it without affecting others
#[tokio::test]
async fn test_dropped_subscriber_does_not_block_others() {
    let (orchestrator, pty) = orchestrator();
    let terminals = orchestrator.terminals();
    let dropped = terminals.subscribe();
    let mut kept = terminals.subscribe();
    drop(dropped);

    let id = terminals.create(None).unwrap();
    pty.shell(id).emit(b"still here");

    assert_eq!(
        next_event(&mut kept).await,
        SessionEvent::Output {
            session_id: id,
            data: b"still here".to_vec()
        }
    );
}

/// shutdown disposes every live session
#[test]
fn test_shutdown_disposes_all() {
    let (orchestrator, pty) = orchestrator();
    let terminals = orchestrator.terminals();
    let ids = [terminals.create(None).unwrap(), terminals.create(None).unwrap()];

    terminals.shutdown();

    assert!(terminals.list().is_empty());
    for id in ids {
        assert!(*pty.shell(id).killed.lock().unwrap());
    }
}
