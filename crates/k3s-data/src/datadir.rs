use crate::error::{Result, StageError};
use std::path::{Component, Path, PathBuf};

/// Data root used when running as root, and the root that is checked first for a
/// pre-extracted bundle shared by every user on the machine.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/rancher/k3s";

/// Per-user data root, relative to `$HOME`.
pub const HOME_DATA_DIR: &str = ".rancher/k3s";

/// Process facts needed to resolve a data root.
///
/// Captured once at start-up so resolution itself never reads ambient state.
#[derive(Clone, Debug, Default)]
pub struct DataDirContext {
    pub is_root: bool,
    pub home: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
}

impl DataDirContext {
    pub fn from_process() -> Self {
        Self {
            is_root: running_as_root(),
            home: std::env::var_os("HOME")
                .filter(|home| !home.is_empty())
                .map(PathBuf::from),
            cwd: std::env::current_dir().ok(),
        }
    }

    /// Resolves the data root: `explicit` if given, else the global default for root and
    /// `$HOME/.rancher/k3s` for everyone else.
    ///
    /// A leading `~` is expanded and the result is made absolute. Nothing is created on disk.
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        let dir = match explicit.filter(|dir| !dir.as_os_str().is_empty()) {
            Some(dir) => self.expand_home(dir)?,
            None if self.is_root => PathBuf::from(DEFAULT_DATA_DIR),
            None => self.home()?.join(HOME_DATA_DIR),
        };

        let dir = if dir.is_absolute() {
            dir
        } else {
            let cwd = self
                .cwd
                .as_ref()
                .ok_or_else(|| StageError::MissingCurrentDir { path: dir.clone() })?;
            cwd.join(dir)
        };
        Ok(normalize(&dir))
    }

    fn home(&self) -> Result<&Path> {
        self.home.as_deref().ok_or(StageError::MissingHomeDir)
    }

    fn expand_home(&self, dir: &Path) -> Result<PathBuf> {
        match dir.strip_prefix("~") {
            Ok(rest) => Ok(self.home()?.join(rest)),
            Err(_) => Ok(dir.to_path_buf()),
        }
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: `getuid` has no preconditions and cannot fail.
    unsafe { libc::getuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

/// Lexically removes `.` and `..` components, the way `filepath.Abs`-style cleaning does.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Well-known paths under a resolved data root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir().join(".lock")
    }

    pub fn current_link(&self) -> PathBuf {
        self.data_dir().join("current")
    }

    pub fn previous_link(&self) -> PathBuf {
        self.data_dir().join("previous")
    }

    pub fn extraction_dir(&self, key: &str) -> PathBuf {
        self.data_dir().join(key)
    }
}
