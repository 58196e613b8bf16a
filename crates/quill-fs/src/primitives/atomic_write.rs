use crate::gzip::GzipCompressor;
use crate::permissions::PermissionMode;
use crate::temp_dir::TempDirPolicy;
use crate::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

#[derive(Clone, Debug)]
pub struct AtomicWriteOptions {
    compress:             bool,
    permissions:          PermissionMode,
    prefix:               &'static str,
    suffix:               &'static str,
    temp_dir:             TempDirPolicy,
    sync:                 bool,
    buffer_capacity:      usize,
    keep_temp_on_failure: bool,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self { Self::new() }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self {
            compress:             false,
            permissions:          PermissionMode::default(),
            prefix:               ".quill-",
            suffix:               ".tmp",
            temp_dir:             TempDirPolicy::default(),
            sync:                 false,
            buffer_capacity:      DEFAULT_BUFFER_CAPACITY,
            keep_temp_on_failure: false,
        }
    }

    /// Gzip the produced bytes at maximum compression.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn permissions(mut self, mode: PermissionMode) -> Self {
        self.permissions = mode;
        self
    }

    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn temp_dir(mut self, policy: TempDirPolicy) -> Self {
        self.temp_dir = policy;
        self
    }

    /// `fsync` the staged file before it is closed and renamed.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    /// Leave the staged file on disk when the write fails, for inspection.
    pub fn keep_temp_on_failure(mut self, keep: bool) -> Self {
        self.keep_temp_on_failure = keep;
        self
    }
}

enum Encoding<'c> {
    Plain,
    Gzip,
    Reuse(&'c mut GzipCompressor),
}

/// Replace `dest` with whatever `produce` writes, gzipped when `compress` is set.
pub fn write_atomic<F>(dest: impl AsRef<Path>, compress: bool, produce: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    atomic_write_with(dest, AtomicWriteOptions::new().compress(compress), produce)
}

/// Replace `dest` with gzipped output, reusing the caller's compressor state.
pub fn write_atomic_gz<F>(
    dest: impl AsRef<Path>,
    compressor: &mut GzipCompressor,
    produce: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    atomic_write_reusing(dest, compressor, AtomicWriteOptions::new(), produce)
}

pub fn atomic_write_with<F>(
    dest: impl AsRef<Path>,
    options: AtomicWriteOptions,
    produce: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let encoding = if options.compress {
        Encoding::Gzip
    } else {
        Encoding::Plain
    };
    stage_and_promote(dest.as_ref(), encoding, &options, produce)
}

/// Like [`atomic_write_with`] but always gzips through `compressor`.
///
/// `options.compress` is ignored. The compressor is reset on entry, so it is
/// ready for the next call whether this one succeeds or not.
pub fn atomic_write_reusing<F>(
    dest: impl AsRef<Path>,
    compressor: &mut GzipCompressor,
    options: AtomicWriteOptions,
    produce: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    stage_and_promote(dest.as_ref(), Encoding::Reuse(compressor), &options, produce)
}

pub fn atomic_write(
    dest: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    atomic_write_with(dest, options, |w| w.write_all(content))
}

pub fn atomic_read(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read a gzip artifact and return its decompressed payload.
pub fn atomic_read_gz(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let read_err = |e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut out = Vec::new();
    flate2::read::GzDecoder::new(std::io::BufReader::new(file))
        .read_to_end(&mut out)
        .map_err(read_err)?;
    Ok(out)
}

fn stage_and_promote<F>(
    dest: &Path,
    encoding: Encoding<'_>,
    options: &AtomicWriteOptions,
    produce: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    if dest.as_os_str().is_empty() {
        return Err(Error::InvalidDestination {
            path: dest.to_path_buf(),
        });
    }

    let dir = options.temp_dir.resolve(dest);
    let staged = tempfile::Builder::new()
        .prefix(options.prefix)
        .suffix(options.suffix)
        .tempfile_in(&dir)
        .map_err(|e| Error::CreateTemp {
            dir: dir.clone(),
            source: e,
        })?;
    let (file, temp_path) = staged.into_parts();
    tracing::debug!(dest = %dest.display(), temp = %temp_path.display(), "staged temporary file");

    if let Err(e) = seal(file, &temp_path, dest, encoding, options, produce) {
        discard(temp_path, options, &e);
        return Err(e);
    }

    let from = temp_path.to_path_buf();
    temp_path.persist(dest).map_err(|e| {
        let err = Error::Rename {
            from,
            to: dest.to_path_buf(),
            source: e.error,
        };
        discard(e.path, options, &err);
        err
    })?;

    tracing::debug!(dest = %dest.display(), "promoted temporary file");
    Ok(())
}

/// Everything between creating the temporary file and renaming it.
///
/// The handle is closed when this returns.
fn seal<F>(
    file: File,
    temp_path: &Path,
    dest: &Path,
    encoding: Encoding<'_>,
    options: &AtomicWriteOptions,
    produce: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let produce_err = |e| Error::Produce {
        path: dest.to_path_buf(),
        source: e,
    };
    let compress_err = |e| Error::Compress {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut writer = BufWriter::with_capacity(options.buffer_capacity, file);

    let writer = match encoding {
        Encoding::Plain => {
            produce(&mut writer).map_err(produce_err)?;
            writer
        }
        Encoding::Gzip => {
            let mut gz = GzEncoder::new(writer, Compression::best());
            produce(&mut gz).map_err(produce_err)?;
            tracing::trace!(temp = %temp_path.display(), "finishing gzip stream");
            gz.finish().map_err(compress_err)?
        }
        Encoding::Reuse(compressor) => {
            let mut gz = compressor.reset(writer);
            produce(&mut gz).map_err(produce_err)?;
            tracing::trace!(temp = %temp_path.display(), "finishing reused gzip stream");
            gz.finish().map_err(compress_err)?
        }
    };

    let file = writer.into_inner().map_err(|e| Error::Flush {
        path: temp_path.to_path_buf(),
        source: e.into_error(),
    })?;

    options
        .permissions
        .apply_to_file(&file)
        .map_err(|e| Error::Permissions {
            path: temp_path.to_path_buf(),
            source: e,
        })?;

    if options.sync {
        file.sync_all().map_err(|e| Error::Sync {
            path: temp_path.to_path_buf(),
            source: e,
        })?;
    }

    drop(file);
    tracing::trace!(temp = %temp_path.display(), "closed temporary file");
    Ok(())
}

fn discard(temp_path: TempPath, options: &AtomicWriteOptions, cause: &Error) {
    if !options.keep_temp_on_failure {
        tracing::debug!(temp = %temp_path.display(), phase = %cause.phase(), "removing temporary file");
        drop(temp_path);
        return;
    }

    match temp_path.keep() {
        Ok(path) => {
            tracing::warn!(temp = %path.display(), phase = %cause.phase(), "kept temporary file after failed write")
        }
        Err(e) => {
            tracing::warn!(temp = %e.path.display(), error = %e.error, "could not keep temporary file")
        }
    }
}
