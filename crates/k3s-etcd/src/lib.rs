//! Control-plane configuration and the managed etcd operations the launcher drives
//! in-process.
//!
//! The launcher only needs three things from the cluster layer: whether the embedded etcd
//! store exists, bootstrapping a client configuration for it, and taking an on-demand
//! snapshot. [`ClusterManager`] captures that contract; [`LocalEtcd`] implements it against
//! the on-disk layout of a server data directory.

mod config;
mod error;
mod local;

pub use config::{ControlConfig, ControlRuntime, DEFAULT_SNAPSHOT_PREFIX};
pub use error::{EtcdError, Result};
pub use local::LocalEtcd;

use std::future::Future;

/// The cluster-management operations needed for on-demand snapshots.
pub trait ClusterManager {
    fn is_initialized(&self, config: &ControlConfig) -> impl Future<Output = Result<bool>> + Send;

    fn bootstrap(&self, config: &ControlConfig) -> impl Future<Output = Result<()>> + Send;

    fn snapshot(&self, config: &ControlConfig) -> impl Future<Output = Result<()>> + Send;
}

/// Takes a snapshot right now: fails fast when the store was never initialized, otherwise
/// bootstraps and snapshots, returning the manager's result unchanged.
///
/// The snapshot name must be a plain file name inside the snapshot directory.
pub async fn save_snapshot<M: ClusterManager>(manager: &M, config: &ControlConfig) -> Result<()> {
    validate_snapshot_name(&config.snapshot_name)?;
    if !manager.is_initialized(config).await? {
        return Err(EtcdError::NotInitialized {
            data_dir: config.etcd_data_dir(),
        });
    }

    manager.bootstrap(config).await?;
    manager.snapshot(config).await
}

fn validate_snapshot_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(EtcdError::InvalidSnapshotName {
            name: name.to_string(),
        });
    }
    Ok(())
}
