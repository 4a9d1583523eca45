use crate::error::{Result, StageError};
use std::borrow::Cow;
use std::path::Path;

/// Read-only access to the bundle that gets staged.
pub trait AssetBundleSource: Send + Sync {
    /// Logical name of the bundle, e.g. `data/3f2a9c.tar.zst`.
    fn name(&self) -> &str;

    /// Raw archive bytes.
    fn read(&self) -> Result<Cow<'_, [u8]>>;
}

impl<T: AssetBundleSource + ?Sized> AssetBundleSource for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&self) -> Result<Cow<'_, [u8]>> {
        (**self).read()
    }
}

/// Returns the directory name a bundle is extracted to: its base name up to the first `.`.
///
/// `data/3f2a9c.tar.zst` maps to `3f2a9c`.
pub fn extraction_key(name: &str) -> &str {
    let base = Path::new(name)
        .file_name()
        .and_then(|base| base.to_str())
        .unwrap_or(name);
    base.split('.').next().unwrap_or(base)
}

/// Compression wrapped around the bundle tarball, chosen by name suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            ArchiveFormat::TarZst
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            ArchiveFormat::TarGz
        } else {
            ArchiveFormat::Tar
        }
    }
}

/// A bundle held in memory, normally the one compiled into the launcher binary.
#[derive(Clone, Debug)]
pub struct EmbeddedBundle {
    name: Cow<'static, str>,
    bytes: Cow<'static, [u8]>,
}

impl EmbeddedBundle {
    pub const fn new(name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            bytes: Cow::Borrowed(bytes),
        }
    }

    pub fn owned(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            bytes: Cow::Owned(bytes),
        }
    }
}

impl AssetBundleSource for EmbeddedBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Result<Cow<'_, [u8]>> {
        if self.bytes.is_empty() {
            return Err(StageError::BundleUnreadable {
                name: self.name.to_string(),
                message: "bundle is empty (was the launcher built without K3S_DATA_BUNDLE?)"
                    .to_string(),
            });
        }
        Ok(Cow::Borrowed(&self.bytes[..]))
    }
}
