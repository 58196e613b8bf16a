use std::fs::File;

/// Permission bits stamped onto a staged file before it is renamed into place.
///
/// The mode is applied through the open file handle, so the final artifact
/// carries the same bits no matter what umask the process was started with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PermissionMode {
    /// Owner read/write, everyone else read.
    ///
    /// On Unix: Sets `0o644` (rw-r--r--)
    /// On Windows: Clears the `readonly` attribute
    #[default]
    ReadWrite,

    /// Read-only for everyone.
    ///
    /// On Unix: Sets `0o444` (r--r--r--)
    /// On Windows: Sets the `readonly` attribute
    ReadOnly,

    /// Executable artifact such as a generated script.
    ///
    /// On Unix: Sets `0o755` (rwxr-xr-x)
    /// On Windows: Clears the `readonly` attribute
    Executable,

    /// Explicit Unix mode bits.
    ///
    /// On Windows the mode only decides the `readonly` attribute: any write
    /// bit clears it.
    Custom(u32),
}

impl PermissionMode {
    pub fn to_unix_mode(self) -> u32 {
        match self {
            Self::ReadWrite => 0o644,
            Self::ReadOnly => 0o444,
            Self::Executable => 0o755,
            Self::Custom(mode) => mode & 0o7777,
        }
    }

    pub fn is_writable(self) -> bool {
        self.to_unix_mode() & 0o222 != 0
    }

    /// Apply the mode through an open handle.
    ///
    /// # Errors
    /// Returns the raw I/O error; callers attach the path.
    pub fn apply_to_file(self, file: &File) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(self.to_unix_mode()))
        }

        #[cfg(not(unix))]
        {
            let mut perms = file.metadata()?.permissions();
            perms.set_readonly(!self.is_writable());
            file.set_permissions(perms)
        }
    }
}

impl From<u32> for PermissionMode {
    fn from(mode: u32) -> Self {
        Self::Custom(mode)
    }
}
