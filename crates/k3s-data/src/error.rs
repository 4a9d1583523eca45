use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, StageError>;

/// Errors produced while resolving, staging, and preparing the data directory.
///
/// None of these are retried; callers surface them as-is.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to determine home directory for default data path")]
    MissingHomeDir,

    #[error("failed to determine current directory to resolve relative data path {path}")]
    MissingCurrentDir { path: PathBuf },

    #[error("failed to acquire lock file {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read asset bundle {name}: {message}")]
    BundleUnreadable { name: String, message: String },

    #[error("failed to clear stale temporary directory {path}: {source}")]
    StaleTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to extract {bundle} into {dest}: {source}")]
    Extract {
        bundle: String,
        dest: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("verification failed for {path}: {reason}")]
    Verify { path: PathBuf, reason: VerifyFailure },

    #[error("failed to publish {path}: {source}")]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build search path: {0}")]
    SearchPath(#[from] std::env::JoinPathsError),

    #[error("executable {name:?} not found on search path")]
    ExecutableNotFound { name: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Reasons an archive could not be unpacked.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid archive path: {path:?}")]
    InvalidPath { path: PathBuf },

    #[error("invalid symlink target {target:?} for {path:?}")]
    InvalidLinkTarget { path: PathBuf, target: PathBuf },

    #[error("archive entry {path:?} would be written through symlink {link:?}")]
    ThroughSymlink { path: PathBuf, link: PathBuf },

    #[error("unsupported archive entry type {kind} for {path:?}")]
    UnsupportedEntryType { path: PathBuf, kind: String },
}

/// Reasons an extracted `bin/` directory failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyFailure {
    #[error("required executable is missing")]
    Missing,

    #[error("not a regular file")]
    NotAFile,

    #[error("file is not executable")]
    NotExecutable,

    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },

    #[error("malformed checksum manifest line {line}")]
    MalformedManifest { line: usize },

    #[error("failed to read: {message}")]
    Unreadable { message: String },
}
