use crate::logging::LogOptions;
use anyhow::{anyhow, Context};
use clap::{Args, Subcommand};
use k3s_etcd::{save_snapshot, ClusterManager, ControlConfig};
use std::path::{Path, PathBuf};

/// Flags for `k3s etcd-snapshot [save]`.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// (data) Folder to hold state default /var/lib/rancher/k3s or ${HOME}/.rancher/k3s if not root
    #[arg(long = "data-dir", short = 'd', value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// (db) Set the base name of the etcd on-demand snapshot (default: on-demand-<unix-timestamp>)
    #[arg(long)]
    pub name: Option<String>,

    /// (db) Directory to save etcd on-demand snapshot (default: ${data-dir}/server/db/snapshots)
    #[arg(long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LogOptions,
}

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub(crate) struct EtcdSnapshotArgs {
    #[command(subcommand)]
    action: Option<SnapshotAction>,

    #[command(flatten)]
    options: SnapshotOptions,
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    /// Trigger an immediate etcd snapshot
    Save(SnapshotOptions),
}

impl EtcdSnapshotArgs {
    pub(crate) fn into_options(self) -> SnapshotOptions {
        match self.action {
            Some(SnapshotAction::Save(options)) => options,
            None => self.options,
        }
    }
}

/// Takes one on-demand snapshot of the embedded etcd under `<data_root>/server`.
///
/// The caller has already staged the bundle under `data_root`. Runs on a private
/// current-thread runtime; SIGINT or SIGTERM abandon the snapshot.
pub fn run<M: ClusterManager>(
    cluster: &M,
    data_root: &Path,
    options: &SnapshotOptions,
) -> anyhow::Result<()> {
    let name = options
        .name
        .clone()
        .unwrap_or_else(ControlConfig::default_snapshot_name);
    let config = ControlConfig::for_snapshot(data_root.join("server"), name, options.dir.clone());

    tracing::debug!(
        target: "k3s.cli",
        data_dir = %config.data_dir.display(),
        snapshot = %config.snapshot_path().display(),
        "taking etcd snapshot"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start snapshot runtime")?;

    runtime.block_on(async {
        tokio::select! {
            result = save_snapshot(cluster, &config) => result.map_err(anyhow::Error::from),
            signal = shutdown_signal() => Err(anyhow!("etcd snapshot interrupted by {signal}")),
        }
    })
}

async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => Some(stream),
            Err(err) => {
                tracing::debug!(target: "k3s.cli", error = %err, "SIGTERM handler unavailable");
                None
            }
        };
        tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => "SIGINT",
            Some(()) = async {
                match terminate.as_mut() {
                    Some(stream) => stream.recv().await,
                    None => None,
                }
            } => "SIGTERM",
            else => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(_) => std::future::pending().await,
        }
    }
}
