use crate::bundle::{extraction_key, AssetBundleSource};
use crate::datadir::{DataLayout, DEFAULT_DATA_DIR};
use crate::error::{Result, StageError};
use crate::extract;
use crate::lock::DataLock;
use crate::verify::{verify_bin_dir, DEFAULT_REQUIRED_EXECUTABLES};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extracts, verifies, and publishes a bundle under a data root, at most once per key.
#[derive(Debug)]
pub struct AssetStager<B> {
    bundle: B,
    global_root: PathBuf,
    required: Vec<String>,
}

impl<B: AssetBundleSource> AssetStager<B> {
    pub fn new(bundle: B) -> Self {
        Self {
            bundle,
            global_root: PathBuf::from(DEFAULT_DATA_DIR),
            required: DEFAULT_REQUIRED_EXECUTABLES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }

    /// Overrides the machine-wide data root checked before the caller's root.
    pub fn with_global_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.global_root = root.into();
        self
    }

    /// Overrides the executables that must be present in `bin/` before publishing.
    pub fn with_required_executables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn bundle(&self) -> &B {
        &self.bundle
    }

    pub fn extraction_key(&self) -> &str {
        extraction_key(self.bundle.name())
    }

    /// Where the bundle is (or would be) published under `data_root`.
    pub fn extraction_dir(&self, data_root: &Path) -> PathBuf {
        DataLayout::new(data_root).extraction_dir(self.extraction_key())
    }

    /// Returns the published extraction directory for this bundle, staging it under
    /// `data_root` first if neither the global root nor `data_root` has it yet.
    pub fn resolve(&self, data_root: &Path) -> Result<PathBuf> {
        // A machine-wide copy lets per-user roots skip their own extraction entirely.
        let global_dir = self.extraction_dir(&self.global_root);
        if global_dir.exists() {
            tracing::debug!(target: "k3s.data", dir = %global_dir.display(), "using global asset dir");
            return Ok(global_dir);
        }

        let layout = DataLayout::new(data_root);
        let dir = layout.extraction_dir(self.extraction_key());
        if dir.exists() {
            tracing::debug!(target: "k3s.data", dir = %dir.display(), "asset dir already staged");
            return Ok(dir);
        }

        let data_dir = layout.data_dir();
        fs::create_dir_all(&data_dir).map_err(|source| StageError::Lock {
            path: data_dir.clone(),
            source,
        })?;

        let lock_path = layout.lock_path();
        tracing::info!(target: "k3s.data", path = %lock_path.display(), "acquiring lock file");
        let _lock = DataLock::acquire(&lock_path)?;

        if dir.exists() {
            tracing::debug!(target: "k3s.data", dir = %dir.display(), "asset dir staged while waiting for lock");
            return Ok(dir);
        }

        tracing::info!(target: "k3s.data", dir = %dir.display(), "preparing data dir");
        self.stage(&layout, &dir)?;
        Ok(dir)
    }

    // Runs with the data lock held. `temp` is dropped before the lock on every path.
    fn stage(&self, layout: &DataLayout, dir: &Path) -> Result<()> {
        let content = self.bundle.read()?;

        let temp = TempDir::fresh(sibling_with_suffix(dir, "tmp"))?;
        let entries = extract::unpack(self.bundle.name(), &content, temp.path())?;
        verify_bin_dir(&temp.path().join("bin"), &self.required)?;

        let current = layout.current_link();
        let previous = layout.previous_link();
        if fs::symlink_metadata(&current).is_ok() {
            fs::rename(&current, &previous).map_err(|source| StageError::Publish {
                path: previous.clone(),
                source,
            })?;
        }
        // `current` names the final path before it exists; the rename below publishes it.
        symlink_dir(dir, &current).map_err(|source| StageError::Publish {
            path: current.clone(),
            source,
        })?;
        fs::rename(temp.path(), dir).map_err(|source| StageError::Publish {
            path: dir.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            target: "k3s.data",
            dir = %dir.display(),
            entries,
            "published asset dir"
        );
        Ok(())
    }
}

/// A temporary extraction directory that is removed when dropped.
///
/// After a successful publish the directory has been renamed away and removal is a no-op.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn fresh(path: PathBuf) -> Result<Self> {
        remove_dir_if_exists(&path).map_err(|source| StageError::StaleTemp {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        if let Err(err) = remove_dir_if_exists(&self.path) {
            tracing::debug!(
                target: "k3s.data",
                path = %self.path.display(),
                error = %err,
                "failed to remove temporary asset dir"
            );
        }
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("data"));
    name.push("-");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
