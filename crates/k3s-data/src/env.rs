use crate::error::{Result, StageError};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

pub const PATH_ENV: &str = "PATH";

/// Exposes the staged extraction directory to replaced and child processes.
pub const DATA_DIR_ENV: &str = "K3S_DATA_DIR";

/// Location of the `crictl` config; defaulted when the caller did not set it.
pub const CRI_CONFIG_FILE_ENV: &str = "CRI_CONFIG_FILE";

/// An explicit process environment.
///
/// The launcher captures its environment once, edits this value, and hands it to the
/// replaced process instead of mutating the global environment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_process() -> Self {
        std::env::vars_os().collect()
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn set(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Sets `key` only when it is unset or empty. Returns whether it was written.
    pub fn set_default(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> bool {
        let key = key.into();
        if self.vars.get(&key).is_some_and(|value| !value.is_empty()) {
            return false;
        }
        self.vars.insert(key, value.into());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_os_str(), value.as_os_str()))
    }

    pub fn search_path(&self) -> Vec<PathBuf> {
        self.get(PATH_ENV)
            .map(|path| std::env::split_paths(path).collect())
            .unwrap_or_default()
    }

    /// Finds `name` the way a shell would: names containing a separator are checked as
    /// given, everything else is searched for along `PATH` in order.
    pub fn lookup_executable(&self, name: &str) -> Result<PathBuf> {
        let not_found = || StageError::ExecutableNotFound {
            name: name.to_string(),
        };

        if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            let path = PathBuf::from(name);
            return if is_executable_file(&path) {
                Ok(path)
            } else {
                Err(not_found())
            };
        }

        self.search_path()
            .into_iter()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable_file(candidate))
            .ok_or_else(not_found)
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Points `env` at a published extraction directory.
///
/// `<dir>/bin` and `<dir>/bin/aux` are put in front of the existing search path so embedded
/// tools win over same-named system tools, and `K3S_DATA_DIR` is set to `dir`.
pub fn prepare_environment(env: &mut Environment, extraction_dir: &Path) -> Result<()> {
    let bin = extraction_dir.join("bin");
    let aux = bin.join("aux");

    let mut entries = vec![bin, aux];
    entries.extend(env.search_path());
    let path = std::env::join_paths(entries)?;

    env.set(PATH_ENV, path);
    env.set(DATA_DIR_ENV, extraction_dir.as_os_str());
    Ok(())
}

fn is_executable_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && crate::verify::is_executable(&meta))
        .unwrap_or(false)
}
