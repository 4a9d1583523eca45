//! Staging of the launcher's embedded data bundle.
//!
//! The launcher ships a tarball of auxiliary executables. Before any of them can run, the
//! bundle is unpacked into a versioned directory under the data root and published there
//! exactly once, even when several launcher processes start at the same time.
//!
//! ## On-disk layout
//!
//! Everything lives under `<data_root>/data/`:
//! - `.lock`: advisory lock serialising the check/extract/publish sequence ([`DataLock`])
//! - `<key>/bin/*`, `<key>/bin/aux/*`: a published extraction, where `<key>` is the
//!   bundle name up to its first `.` ([`extraction_key`])
//! - `<key>-tmp/`: transient extraction target, removed on every exit path
//! - `current`, `previous`: symlinks to the latest and the prior published extraction
//!
//! Published directories are never modified again. The rename of `<key>-tmp` to `<key>` is
//! the publication instant; `current` is pointed at `<key>` just before that rename, so a
//! crash in between leaves `current` dangling until the next run stages again.

mod bundle;
mod datadir;
mod env;
mod error;
mod extract;
mod lock;
mod stage;
mod verify;

pub use bundle::{extraction_key, ArchiveFormat, AssetBundleSource, EmbeddedBundle};
pub use datadir::{DataDirContext, DataLayout, DEFAULT_DATA_DIR, HOME_DATA_DIR};
pub use env::{prepare_environment, Environment, CRI_CONFIG_FILE_ENV, DATA_DIR_ENV, PATH_ENV};
pub use error::{ArchiveError, Result, StageError, VerifyFailure};
pub use lock::DataLock;
pub use stage::AssetStager;
pub use verify::{verify_bin_dir, CHECKSUM_MANIFEST, DEFAULT_REQUIRED_EXECUTABLES};
