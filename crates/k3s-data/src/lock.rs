use crate::error::{Result, StageError};
use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Exclusive advisory lock on `<data_root>/data/.lock`, shared by every launcher process.
///
/// The lock is released when the value is dropped. The lockfile itself is never removed.
#[derive(Debug)]
pub struct DataLock {
    file: File,
    path: PathBuf,
    // `fs2` locks are per-process on Unix, so threads of one process also take an
    // in-process mutex keyed by path.
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl DataLock {
    /// Blocks until the lock on `path` is held, creating the lockfile if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_err = |source| StageError::Lock {
            path: path.to_path_buf(),
            source,
        };

        let guard = process_lock_for_path(path)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;

        tracing::trace!(target: "k3s.data", path = %path.display(), "acquired data lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::debug!(
                target: "k3s.data",
                path = %self.path.display(),
                error = %err,
                "failed to release data lock"
            );
        }
    }
}

/// One in-process mutex per lock path; each is leaked so [`DataLock`] can hold its guard as
/// `'static`, at one small allocation per distinct data root for the life of the process.
fn process_lock_for_path(path: &Path) -> &'static Mutex<()> {
    static PROCESS_LOCKS: OnceLock<Mutex<HashMap<PathBuf, &'static Mutex<()>>>> = OnceLock::new();
    let mut locks = PROCESS_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    locks
        .entry(path.to_path_buf())
        .or_insert_with(|| Box::leak(Box::new(Mutex::new(()))))
}
