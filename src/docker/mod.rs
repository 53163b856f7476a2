// ABOUTME: Container integration - runtime command surface, project bindings
// and the lifecycle controller that produces them

pub mod binding;
pub mod lifecycle;
pub mod runtime;

pub use binding::{BindingStore, ContainerBinding};
pub use lifecycle::{ContainerLifecycleController, LifecycleError, UpOptions};
pub use runtime::{
    render_command, BuildRequest, ContainerRuntime, DockerCli, ExecRequest, RunRequest,
    RuntimeError,
};
