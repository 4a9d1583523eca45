use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EtcdError>;

#[derive(Debug, thiserror::Error)]
pub enum EtcdError {
    #[error(
        "managed etcd database is not initialized (no data under {data_dir}); \
start a server with embedded etcd before taking snapshots"
    )]
    NotInitialized { data_dir: PathBuf },

    #[error("etcd certificate {path} is not readable: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("etcd backend database {path} is missing")]
    MissingBackend { path: PathBuf },

    #[error("invalid snapshot name {name:?}: must be a single file name")]
    InvalidSnapshotName { name: String },

    #[error("snapshot {path} already exists")]
    SnapshotExists { path: PathBuf },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
