use crate::bundle::ArchiveFormat;
use crate::error::{ArchiveError, Result, StageError};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path};
use tar::EntryType;

/// Unpacks `bytes` (formatted according to `bundle_name`) into `dest`.
///
/// Returns the number of archive entries written.
pub(crate) fn unpack(bundle_name: &str, bytes: &[u8], dest: &Path) -> Result<usize> {
    let format = ArchiveFormat::from_name(bundle_name);
    unpack_archive(format, bytes, dest).map_err(|source| StageError::Extract {
        bundle: bundle_name.to_string(),
        dest: dest.to_path_buf(),
        source,
    })
}

fn unpack_archive(
    format: ArchiveFormat,
    bytes: &[u8],
    dest: &Path,
) -> std::result::Result<usize, ArchiveError> {
    let reader: Box<dyn Read + '_> = match format {
        ArchiveFormat::Tar => Box::new(bytes),
        ArchiveFormat::TarGz => Box::new(flate2::read::GzDecoder::new(bytes)),
        ArchiveFormat::TarZst => Box::new(zstd::Decoder::new(bytes)?),
    };
    let mut archive = tar::Archive::new(reader);

    fs::create_dir_all(dest)?;

    let mut written = 0usize;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        validate_archive_relative_path(&entry_path)?;
        if entry_path
            .components()
            .all(|component| component == Component::CurDir)
        {
            // `./` entries name the archive root itself.
            continue;
        }
        let out_path = dest.join(&entry_path);
        ensure_no_symlink_on_path(dest, &entry_path)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&out_path)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&out_path)?;
                io::copy(&mut entry, &mut out)?;
                set_mode(&out, entry.header().mode()?)?;
            }
            EntryType::Symlink => {
                let target = entry
                    .link_name()?
                    .ok_or_else(|| ArchiveError::InvalidLinkTarget {
                        path: entry_path.clone(),
                        target: Default::default(),
                    })?
                    .into_owned();
                validate_link_target(&entry_path, &target)?;
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                symlink(&target, &out_path)?;
            }
            other => {
                return Err(ArchiveError::UnsupportedEntryType {
                    path: entry_path,
                    kind: format!("{other:?}"),
                });
            }
        }
        written += 1;
    }

    Ok(written)
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

// Links created by earlier entries must never be written through, or a pair like
// `a -> .` and `a/b -> ..` would let later entries land outside `dest`.
fn ensure_no_symlink_on_path(
    dest: &Path,
    entry_path: &Path,
) -> std::result::Result<(), ArchiveError> {
    let mut current = dest.to_path_buf();
    for component in entry_path.components() {
        if component == Component::CurDir {
            continue;
        }
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(ArchiveError::ThroughSymlink {
                    path: entry_path.to_path_buf(),
                    link: current,
                });
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn validate_archive_relative_path(path: &Path) -> std::result::Result<(), ArchiveError> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(ArchiveError::InvalidPath {
                    path: path.to_path_buf(),
                })
            }
        }
    }
    Ok(())
}

// Links may point at siblings or into subdirectories, never out of the extraction root.
fn validate_link_target(path: &Path, target: &Path) -> std::result::Result<(), ArchiveError> {
    let invalid = || ArchiveError::InvalidLinkTarget {
        path: path.to_path_buf(),
        target: target.to_path_buf(),
    };
    if target.as_os_str().is_empty() {
        return Err(invalid());
    }

    let mut depth = path.components().count().saturating_sub(1) as isize;
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(invalid());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(invalid()),
        }
    }
    Ok(())
}
