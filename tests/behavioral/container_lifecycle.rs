// ABOUTME: Behavioral tests for the container lifecycle controller
// Verifies build/run/exec ordering, binding outcomes on failure and per-project serialization

use crate::fixtures::{Invocation, RecordingRuntime, ScriptedPty, TestProject};
use devharbor::config::{AppConfig, BuildSpec, ContainerSpec};
use devharbor::docker::{LifecycleError, UpOptions};
use devharbor::orchestrator::Orchestrator;
use devharbor::terminal::SessionTarget;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(runtime: &Arc<RecordingRuntime>) -> Orchestrator {
    Orchestrator::with_parts(&AppConfig::default(), runtime.clone(), ScriptedPty::new())
}

fn image_spec(image: &str) -> ContainerSpec {
    ContainerSpec {
        image: Some(image.to_string()),
        ..ContainerSpec::default()
    }
}

fn dockerfile_spec() -> ContainerSpec {
    ContainerSpec {
        build: Some(BuildSpec {
            dockerfile: Some("Dockerfile".to_string()),
            ..BuildSpec::default()
        }),
        ..ContainerSpec::default()
    }
}

/// Image spec launches detached with the project mounted and returns the trimmed id
#[tokio::test]
async fn test_up_with_image_binds_project() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.queue_run_output("abc123\n");
    let orchestrator = orchestrator(&runtime);

    let id = orchestrator
        .up(project.path(), &image_spec("node:18"), UpOptions::default())
        .await
        .unwrap();
    assert_eq!(id, "abc123");

    let runs = runtime.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].image, "node:18");
    assert_eq!(runs[0].workspace_source, project.canonical());
    let args = runs[0].to_args();
    assert_eq!(&args[..2], &["run".to_string(), "-d".to_string()]);
    assert!(args.contains(&"/workspace".to_string()));

    let binding = orchestrator.bindings().get(&project.canonical()).unwrap();
    assert_eq!(binding.container_id, "abc123");
}

/// After up, the project and its subdirectories route into the container; others stay on host
#[tokio::test]
async fn test_routes_follow_binding() {
    let project = TestProject::new().unwrap();
    let subdir = project.mkdir("sub/dir").unwrap();
    let other = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    let orchestrator = orchestrator(&runtime);

    let id = orchestrator
        .up(project.path(), &image_spec("node:18"), UpOptions::default())
        .await
        .unwrap();

    let terminals = orchestrator.terminals();
    let root_session = terminals.create(Some(project.path())).unwrap();
    let sub_session = terminals.create(Some(&subdir)).unwrap();
    let other_session = terminals.create(Some(other.path())).unwrap();

    assert_eq!(terminals.get(root_session).unwrap().target.container_id(), Some(id.as_str()));
    assert_eq!(terminals.get(sub_session).unwrap().target.container_id(), Some(id.as_str()));
    assert_eq!(terminals.get(other_session).unwrap().target, SessionTarget::Host);
}

/// Rebuild forces a no-cache build that strictly precedes the launch
#[tokio::test]
async fn test_rebuild_builds_before_run() {
    let project = TestProject::new().unwrap();
    project.write("Dockerfile", "FROM alpine\n").unwrap();
    let runtime = RecordingRuntime::new();
    let orchestrator = orchestrator(&runtime);

    orchestrator
        .up(project.path(), &dockerfile_spec(), UpOptions { rebuild: true })
        .await
        .unwrap();

    let invocations = runtime.invocations();
    assert_eq!(invocations.len(), 2);
    let (Invocation::Build(build), Invocation::Run(run)) = (&invocations[0], &invocations[1]) else {
        panic!("expected build then run, got {invocations:?}");
    };
    assert!(build.no_cache);
    assert!(build.to_args().contains(&"--no-cache".to_string()));
    assert_eq!(build.dockerfile, project.canonical().join("Dockerfile"));
    assert_eq!(build.context, project.canonical());
    assert_eq!(run.image, build.tag);
}

/// No image and no dockerfile fails before any runtime call
#[tokio::test]
async fn test_unlaunchable_spec_spawns_nothing() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    let orchestrator = orchestrator(&runtime);

    let err = orchestrator
        .up(project.path(), &ContainerSpec::default(), UpOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::ConfigInvalid { .. }));
    assert!(runtime.invocations().is_empty());
    assert!(orchestrator.bindings().is_empty());
}

/// A second up replaces the binding and retires the superseded container
#[tokio::test]
async fn test_second_up_replaces_binding() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.queue_run_output("first\n");
    runtime.queue_run_output("second\n");
    let orchestrator = orchestrator(&runtime);
    let spec = image_spec("node:18");

    orchestrator.up(project.path(), &spec, UpOptions::default()).await.unwrap();
    orchestrator.up(project.path(), &spec, UpOptions::default()).await.unwrap();

    let session = orchestrator.terminals().create(Some(project.path())).unwrap();
    assert_eq!(
        orchestrator.terminals().get(session).unwrap().target.container_id(),
        Some("second")
    );
    assert_eq!(orchestrator.bindings().len(), 1);
    assert!(runtime
        .invocations()
        .contains(&Invocation::Remove("first".to_string())));
}

/// Build failures carry the runtime's diagnostics and leave no binding
#[tokio::test]
async fn test_build_failure_leaves_no_binding() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.fail_build("failed to solve: dockerfile parse error");
    let orchestrator = orchestrator(&runtime);

    let err = orchestrator
        .up(project.path(), &dockerfile_spec(), UpOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Build(_)));
    assert_eq!(
        err.diagnostics().as_deref(),
        Some("failed to solve: dockerfile parse error")
    );
    assert!(runtime.runs().is_empty());
    assert!(orchestrator.bindings().is_empty());
}

/// Launch failures leave no binding either
#[tokio::test]
async fn test_launch_failure_leaves_no_binding() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.fail_run("Unable to find image 'nope:latest' locally");
    let orchestrator = orchestrator(&runtime);

    let err = orchestrator
        .up(project.path(), &image_spec("nope"), UpOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Launch(_)));
    assert!(orchestrator.bindings().is_empty());
}

/// Post-create runs after launch through a shell wrapper; its failure keeps the binding
#[tokio::test]
async fn test_post_create_failure_keeps_container_bound() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.queue_run_output("abc123\n");
    runtime.fail_exec("npm ERR! code ENOENT");
    let orchestrator = orchestrator(&runtime);
    let mut spec = image_spec("node:18");
    spec.post_create_command = Some("npm ci && npm run build".to_string());

    let err = orchestrator
        .up(project.path(), &spec, UpOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.live_container(), Some("abc123"));
    assert_eq!(err.diagnostics().as_deref(), Some("npm ERR! code ENOENT"));
    assert_eq!(
        orchestrator.bindings().get(&project.canonical()).unwrap().container_id,
        "abc123"
    );

    let invocations = runtime.invocations();
    let Some(Invocation::Exec(exec)) = invocations.last() else {
        panic!("expected exec last, got {invocations:?}");
    };
    assert!(matches!(invocations[0], Invocation::Run(_)));
    assert_eq!(exec.container_id, "abc123");
    assert_eq!(exec.command, vec!["/bin/sh", "-c", "npm ci && npm run build"]);
    assert_eq!(exec.workdir.as_deref(), Some("/workspace"));
}

/// Concurrent ups for one project run one at a time
#[tokio::test]
async fn test_same_project_ups_are_serialized() {
    let project = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.set_delay(Duration::from_millis(50));
    let orchestrator = orchestrator(&runtime);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            orchestrator.spawn_up(
                project.path().to_path_buf(),
                image_spec("node:18"),
                UpOptions::default(),
            )
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(runtime.runs().len(), 3);
    assert_eq!(runtime.max_concurrency(), 1);
    assert_eq!(orchestrator.bindings().len(), 1);
}

/// Ups for different projects proceed independently
#[tokio::test]
async fn test_different_projects_run_concurrently() {
    let first = TestProject::new().unwrap();
    let second = TestProject::new().unwrap();
    let runtime = RecordingRuntime::new();
    runtime.set_delay(Duration::from_millis(100));
    let orchestrator = orchestrator(&runtime);

    let a = orchestrator.spawn_up(first.path().to_path_buf(), image_spec("node:18"), UpOptions::default());
    let b = orchestrator.spawn_up(second.path().to_path_buf(), image_spec("node:18"), UpOptions::default());
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(runtime.max_concurrency(), 2);
    assert_eq!(orchestrator.bindings().len(), 2);
}
