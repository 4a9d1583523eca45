use crate::error::{Result, StageError, VerifyFailure};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Entries every launcher bundle must carry in `bin/`.
pub const DEFAULT_REQUIRED_EXECUTABLES: &[&str] = &[
    "k3s-server",
    "k3s-agent",
    "kubectl",
    "crictl",
    "ctr",
    "check-config",
];

/// Optional `sha256sum`-style manifest inside `bin/`.
pub const CHECKSUM_MANIFEST: &str = ".sha256sums";

/// Checks an extracted `bin/` directory before it is published.
///
/// Every name in `required` must be an executable regular file (symlinks are followed). When
/// `bin/.sha256sums` is present, every file it lists must exist and match its digest.
pub fn verify_bin_dir(bin_dir: &Path, required: &[String]) -> Result<()> {
    for name in required {
        verify_executable(&bin_dir.join(name))?;
    }

    let manifest_path = bin_dir.join(CHECKSUM_MANIFEST);
    let manifest = match fs::read_to_string(&manifest_path) {
        Ok(manifest) => manifest,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(verify_err(
                &manifest_path,
                VerifyFailure::Unreadable {
                    message: err.to_string(),
                },
            ))
        }
    };

    let mut checked = 0usize;
    for (idx, line) in manifest.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((expected, rel)) = parse_manifest_line(line) else {
            return Err(verify_err(
                &manifest_path,
                VerifyFailure::MalformedManifest { line: idx + 1 },
            ));
        };
        if Path::new(rel).is_absolute() || rel.split('/').any(|part| part == "..") {
            return Err(verify_err(
                &manifest_path,
                VerifyFailure::MalformedManifest { line: idx + 1 },
            ));
        }

        let path = bin_dir.join(rel);
        let found = sha256_file(&path)?;
        if !found.eq_ignore_ascii_case(expected) {
            return Err(verify_err(
                &path,
                VerifyFailure::ChecksumMismatch {
                    expected: expected.to_ascii_lowercase(),
                    found,
                },
            ));
        }
        checked += 1;
    }

    tracing::debug!(
        target: "k3s.data",
        bin_dir = %bin_dir.display(),
        checked,
        "verified bundle checksums"
    );
    Ok(())
}

fn verify_executable(path: &Path) -> Result<()> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(verify_err(path, VerifyFailure::Missing))
        }
        Err(err) => {
            return Err(verify_err(
                path,
                VerifyFailure::Unreadable {
                    message: err.to_string(),
                },
            ))
        }
    };
    if !meta.is_file() {
        return Err(verify_err(path, VerifyFailure::NotAFile));
    }
    if !is_executable(&meta) {
        return Err(verify_err(path, VerifyFailure::NotExecutable));
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub(crate) fn is_executable(meta: &fs::Metadata) -> bool {
    meta.is_file()
}

// `<hex digest>  <path>`; a leading `*` on the path marks binary mode in sha256sum output.
fn parse_manifest_line(line: &str) -> Option<(&str, &str)> {
    let (digest, rest) = line.split_once(char::is_whitespace)?;
    let rel = rest.trim_start().trim_start_matches('*');
    if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) || rel.is_empty() {
        return None;
    }
    Some((digest, rel))
}

fn sha256_file(path: &Path) -> Result<String> {
    let unreadable = |err: std::io::Error| {
        let failure = if err.kind() == std::io::ErrorKind::NotFound {
            VerifyFailure::Missing
        } else {
            VerifyFailure::Unreadable {
                message: err.to_string(),
            }
        };
        verify_err(path, failure)
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 16 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(unreadable)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn verify_err(path: &Path, reason: VerifyFailure) -> StageError {
    StageError::Verify {
        path: path.to_path_buf(),
        reason,
    }
}
