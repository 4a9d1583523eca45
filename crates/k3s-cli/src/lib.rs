//! The `k3s` multi-call launcher.
//!
//! One binary stands in for the server, the agent and a handful of bundled tools. It stages
//! the compiled-in data bundle under a data root (see `k3s-data`), puts the staged `bin`
//! directories first on `PATH`, and replaces itself with the requested executable.
//! `etcd-snapshot` is the exception and runs in this process.

mod bundle;
mod dispatch;
mod exec;
mod invocation;
pub mod logging;
mod snapshot;

pub use bundle::embedded_bundle;
pub use dispatch::{Action, Dispatcher};
pub use exec::ExecRequest;
pub use invocation::{
    invoked_as, ExternalTarget, InProcessCommand, InvocationTarget, PASS_THROUGH_PROGRAMS,
};
pub use snapshot::SnapshotOptions;
