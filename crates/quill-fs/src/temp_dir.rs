//! Where staged files live before they are renamed into place.
//!
//! A rename is only atomic when source and target share a filesystem, so the
//! default is the destination's own directory. `TMPDIR` may redirect staging
//! elsewhere; when it points at another mount the final rename fails with
//! `EXDEV` and is reported as [`crate::Error::Rename`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable consulted by [`TempDirPolicy::Env`].
pub const TEMP_DIR_ENV: &str = "TMPDIR";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TempDirPolicy {
    /// `TMPDIR` when set and non-empty, otherwise the destination's directory.
    #[default]
    Env,
    /// Always the destination's directory, ignoring the environment.
    SameDir,
    /// An explicit staging directory.
    Path(PathBuf),
}

impl TempDirPolicy {
    /// Resolve the staging directory for `dest`.
    ///
    /// The environment is read on every call.
    pub fn resolve(&self, dest: &Path) -> PathBuf {
        match self {
            Self::Env => from_env_value(std::env::var_os(TEMP_DIR_ENV), dest),
            Self::SameDir => parent_dir(dest),
            Self::Path(dir) => dir.clone(),
        }
    }
}

fn from_env_value(value: Option<OsString>, dest: &Path) -> PathBuf {
    match value {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => parent_dir(dest),
    }
}

/// Directory containing `dest`; `.` for a bare file name.
pub fn parent_dir(dest: &Path) -> PathBuf {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
