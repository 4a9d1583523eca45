use crate::config::ControlConfig;
use crate::error::{EtcdError, Result};
use crate::ClusterManager;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Snapshots the embedded etcd of a stopped or running server by copying its backend
/// database out of the server data directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalEtcd;

impl ClusterManager for LocalEtcd {
    async fn is_initialized(&self, config: &ControlConfig) -> Result<bool> {
        let wal = config.wal_dir();
        match tokio::fs::metadata(&wal).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(EtcdError::Io { path: wal, source }),
        }
    }

    async fn bootstrap(&self, config: &ControlConfig) -> Result<()> {
        for cert in config.runtime.certificates() {
            tokio::fs::File::open(cert)
                .await
                .map_err(|source| EtcdError::Certificate {
                    path: cert.to_path_buf(),
                    source,
                })?;
        }
        tracing::debug!(
            target: "k3s.etcd",
            data_dir = %config.data_dir.display(),
            "etcd client certificates present"
        );
        Ok(())
    }

    async fn snapshot(&self, config: &ControlConfig) -> Result<()> {
        let backend = config.backend_db();
        let dest = config.snapshot_path();

        if tokio::fs::try_exists(&dest)
            .await
            .map_err(|source| io_err(&dest, source))?
        {
            return Err(EtcdError::SnapshotExists { path: dest });
        }

        let snapshot_dir = config.snapshot_dir();
        tokio::fs::create_dir_all(&snapshot_dir)
            .await
            .map_err(|source| io_err(&snapshot_dir, source))?;

        let tmp = tmp_path(&dest);
        let copied = copy_with_digest(&backend, &tmp).await;
        let (bytes, digest) = match copied {
            Ok(copied) => copied,
            Err(err) => {
                remove_best_effort(&tmp).await;
                return Err(err);
            }
        };
        // `hard_link` refuses an existing destination, so a snapshot published concurrently
        // under the same name is never replaced.
        let published = tokio::fs::hard_link(&tmp, &dest).await;
        remove_best_effort(&tmp).await;
        match published {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(EtcdError::SnapshotExists { path: dest });
            }
            Err(source) => return Err(io_err(&dest, source)),
        }

        tracing::info!(
            target: "k3s.etcd",
            name = %config.snapshot_name,
            path = %dest.display(),
            bytes,
            sha256 = %digest,
            "saved etcd snapshot"
        );
        Ok(())
    }
}

async fn copy_with_digest(source: &Path, dest: &Path) -> Result<(u64, String)> {
    let mut input = match tokio::fs::File::open(source).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(EtcdError::MissingBackend {
                path: source.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(source, err)),
    };
    let mut output = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await
        .map_err(|err| io_err(dest, err))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0_u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = input
            .read(&mut buf)
            .await
            .map_err(|err| io_err(source, err))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        output
            .write_all(&buf[..read])
            .await
            .map_err(|err| io_err(dest, err))?;
        total += read as u64;
    }
    output.sync_all().await.map_err(|err| io_err(dest, err))?;

    Ok((total, hex::encode(hasher.finalize())))
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    dest.with_file_name(name)
}

async fn remove_best_effort(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != io::ErrorKind::NotFound {
            tracing::debug!(
                target: "k3s.etcd",
                path = %path.display(),
                error = %err,
                "failed to remove temporary snapshot file"
            );
        }
    }
}

fn io_err(path: &Path, source: io::Error) -> EtcdError {
    EtcdError::Io {
        path: path.to_path_buf(),
        source,
    }
}
