use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot names default to `on-demand-<unix seconds>`.
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "on-demand";

/// Control-plane settings for a server data directory (`<data root>/server`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlConfig {
    pub data_dir: PathBuf,
    pub disable_agent: bool,
    pub snapshot_now: bool,
    pub snapshot_name: String,
    /// Where snapshots are written; `<data_dir>/db/snapshots` when unset.
    pub snapshot_dir: Option<PathBuf>,
    /// Number of snapshots to keep; 0 disables the retention check.
    pub snapshot_retention: u32,
    pub runtime: ControlRuntime,
}

/// Credentials for talking to the embedded etcd.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlRuntime {
    pub etcd_server_ca: PathBuf,
    pub client_etcd_cert: PathBuf,
    pub client_etcd_key: PathBuf,
}

impl ControlRuntime {
    /// Certificate paths under `<data_dir>/tls/etcd`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        let tls = data_dir.join("tls").join("etcd");
        Self {
            etcd_server_ca: tls.join("server-ca.crt"),
            client_etcd_cert: tls.join("client.crt"),
            client_etcd_key: tls.join("client.key"),
        }
    }

    pub fn certificates(&self) -> [&Path; 3] {
        [
            self.etcd_server_ca.as_path(),
            self.client_etcd_cert.as_path(),
            self.client_etcd_key.as_path(),
        ]
    }
}

impl ControlConfig {
    /// Configuration for a one-shot snapshot with the agent disabled and retention off.
    pub fn for_snapshot(
        data_dir: impl Into<PathBuf>,
        snapshot_name: impl Into<String>,
        snapshot_dir: Option<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.into();
        let runtime = ControlRuntime::for_data_dir(&data_dir);
        Self {
            data_dir,
            disable_agent: true,
            snapshot_now: true,
            snapshot_name: snapshot_name.into(),
            snapshot_dir,
            snapshot_retention: 0,
            runtime,
        }
    }

    pub fn etcd_data_dir(&self) -> PathBuf {
        self.data_dir.join("db").join("etcd")
    }

    pub fn wal_dir(&self) -> PathBuf {
        self.etcd_data_dir().join("member").join("wal")
    }

    pub fn backend_db(&self) -> PathBuf {
        self.etcd_data_dir().join("member").join("snap").join("db")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        match &self.snapshot_dir {
            Some(dir) => dir.clone(),
            None => self.data_dir.join("db").join("snapshots"),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_dir().join(&self.snapshot_name)
    }

    /// `on-demand-<unix seconds>` for the current time.
    pub fn default_snapshot_name() -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!("{DEFAULT_SNAPSHOT_PREFIX}-{secs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_config_points_at_server_layout() {
        let config = ControlConfig::for_snapshot("/var/lib/rancher/k3s/server", "backup1", None);
        assert!(config.disable_agent);
        assert!(config.snapshot_now);
        assert_eq!(config.snapshot_retention, 0);
        assert_eq!(
            config.runtime.etcd_server_ca,
            PathBuf::from("/var/lib/rancher/k3s/server/tls/etcd/server-ca.crt")
        );
        assert_eq!(
            config.runtime.client_etcd_key,
            PathBuf::from("/var/lib/rancher/k3s/server/tls/etcd/client.key")
        );
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/rancher/k3s/server/db/snapshots/backup1")
        );
    }

    #[test]
    fn explicit_snapshot_dir_wins() {
        let config =
            ControlConfig::for_snapshot("/srv/server", "b", Some(PathBuf::from("/backups")));
        assert_eq!(config.snapshot_path(), PathBuf::from("/backups/b"));
    }

    #[test]
    fn default_name_has_prefix_and_timestamp() {
        let name = ControlConfig::default_snapshot_name();
        let ts = name.strip_prefix("on-demand-").unwrap();
        assert!(ts.parse::<u64>().unwrap() > 0);
    }
}
