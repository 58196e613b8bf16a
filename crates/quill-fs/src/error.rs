use std::fmt;
use std::path::PathBuf;

/// Step of an atomic write at which a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Validate,
    CreateTemp,
    Produce,
    Compress,
    Flush,
    Permissions,
    Close,
    Rename,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::CreateTemp => "create-temp",
            Self::Produce => "produce",
            Self::Compress => "compress",
            Self::Flush => "flush",
            Self::Permissions => "permissions",
            Self::Close => "close",
            Self::Rename => "rename",
            Self::Read => "read",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid destination path: '{path}'")]
    InvalidDestination { path: PathBuf },

    #[error("failed to create temporary file in '{dir}': {source}")]
    CreateTemp { dir: PathBuf, source: std::io::Error },

    #[error("content producer failed for '{path}': {source}")]
    Produce { path: PathBuf, source: std::io::Error },

    #[error("failed to finish gzip stream in '{path}': {source}")]
    Compress { path: PathBuf, source: std::io::Error },

    #[error("failed to flush '{path}': {source}")]
    Flush { path: PathBuf, source: std::io::Error },

    #[error("failed to set permissions on '{path}': {source}")]
    Permissions { path: PathBuf, source: std::io::Error },

    #[error("failed to sync '{path}': {source}")]
    Sync { path: PathBuf, source: std::io::Error },

    #[error("failed to rename '{from}' to '{to}': {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: std::io::Error },
}

impl Error {
    pub fn phase(&self) -> Phase {
        match self {
            Self::InvalidDestination { .. } => Phase::Validate,
            Self::CreateTemp { .. } => Phase::CreateTemp,
            Self::Produce { .. } => Phase::Produce,
            Self::Compress { .. } => Phase::Compress,
            Self::Flush { .. } => Phase::Flush,
            Self::Permissions { .. } => Phase::Permissions,
            Self::Sync { .. } => Phase::Close,
            Self::Rename { .. } => Phase::Rename,
            Self::Read { .. } => Phase::Read,
        }
    }

    /// The underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::InvalidDestination { .. } => None,
            Self::CreateTemp { source, .. }
            | Self::Produce { source, .. }
            | Self::Compress { source, .. }
            | Self::Flush { source, .. }
            | Self::Permissions { source, .. }
            | Self::Sync { source, .. }
            | Self::Rename { source, .. }
            | Self::Read { source, .. } => Some(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
