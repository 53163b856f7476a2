// ABOUTME: Behavioral tests for session routing decisions
// Verifies prefix matching on normalized paths and the first-binding tie-break

use crate::fixtures::TestProject;
use devharbor::docker::{BindingStore, ContainerBinding};
use devharbor::terminal::{SessionRouter, SessionTarget};
use std::path::{Path, PathBuf};

fn bind(store: &BindingStore, path: PathBuf, id: &str) {
    store.bind(ContainerBinding::new(path, id.to_string(), None));
}

/// Paths reached through `..` still route by their normalized form
#[test]
fn test_unnormalized_path_routes_to_container() {
    let project = TestProject::new().unwrap();
    project.mkdir("src").unwrap();
    let store = BindingStore::new();
    bind(&store, project.canonical(), "abc");
    let router = SessionRouter::new(store, "/workspace");

    let roundabout = project.path().join("src").join("..").join("src");
    let route = router.route(Some(&roundabout));

    assert_eq!(route.target.container_id(), Some("abc"));
    assert_eq!(route.working_directory, PathBuf::from("/workspace"));
}

/// A sibling sharing a name prefix is not nested under the project
#[test]
fn test_name_prefix_sibling_stays_on_host() {
    let store = BindingStore::new();
    bind(&store, PathBuf::from("/devharbor-routing/app"), "abc");
    let router = SessionRouter::new(store, "/workspace");

    let route = router.route(Some(Path::new("/devharbor-routing/app-legacy")));
    assert_eq!(route.target, SessionTarget::Host);
    assert_eq!(route.working_directory, PathBuf::from("/devharbor-routing/app-legacy"));
}

/// Overlapping bindings resolve to the first one recorded, not the most specific
#[test]
fn test_overlapping_bindings_first_wins() {
    let store = BindingStore::new();
    bind(&store, PathBuf::from("/devharbor-routing/ws"), "outer");
    bind(&store, PathBuf::from("/devharbor-routing/ws/inner"), "inner");
    let router = SessionRouter::new(store, "/workspace");

    let route = router.route(Some(Path::new("/devharbor-routing/ws/inner/src")));
    assert_eq!(route.target.container_id(), Some("outer"));
}

/// Routing sees bindings recorded after the router was built
#[test]
fn test_router_observes_later_bindings() {
    let store = BindingStore::new();
    let router = SessionRouter::new(store.clone(), "/code");
    let dir = Path::new("/devharbor-routing/late");

    assert_eq!(router.route(Some(dir)).target, SessionTarget::Host);

    bind(&store, dir.to_path_buf(), "late1");
    let route = router.route(Some(dir));
    assert_eq!(route.target.container_id(), Some("late1"));
    assert_eq!(route.working_directory, PathBuf::from("/code"));
}
