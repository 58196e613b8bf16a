//! Crash-safe replacement of generated files.
//!
//! Content is streamed into a uniquely named temporary file next to the
//! destination, optionally gzipped at maximum compression, stamped with a
//! fixed mode and renamed over the destination. Readers see either the old
//! file or the complete new one.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use quill_fs::{GzipCompressor, write_atomic, write_atomic_gz, atomic_read_gz};
//!
//! let dir = tempfile::tempdir().unwrap();
//!
//! write_atomic(dir.path().join("index.html"), false, |w| w.write_all(b"<html>"))?;
//!
//! let mut compressor = GzipCompressor::new();
//! for page in ["ls.1", "cp.1"] {
//!     let dest = dir.path().join(format!("{page}.html.gz"));
//!     write_atomic_gz(&dest, &mut compressor, |w| writeln!(w, "{page}"))?;
//! }
//! assert_eq!(atomic_read_gz(dir.path().join("ls.1.html.gz"))?, b"ls.1\n");
//! # Ok::<(), quill_fs::Error>(())
//! ```

mod error;
pub mod gzip;
pub mod permissions;
pub mod primitives;
pub mod temp_dir;

pub use error::{Error, Phase, Result};
pub use gzip::{GzipCompressor, GzipStream};
pub use permissions::PermissionMode;
pub use primitives::{
    AtomicWriteOptions, atomic_read, atomic_read_gz, atomic_write, atomic_write_reusing,
    atomic_write_with, write_atomic, write_atomic_gz,
};
pub use temp_dir::{TEMP_DIR_ENV, TempDirPolicy};
