use flate2::read::GzDecoder;
use quill_fs::{
    AtomicWriteOptions, Error, GzipCompressor, Phase, TempDirPolicy, atomic_read,
    atomic_read_gz, atomic_write_reusing, atomic_write_with, write_atomic, write_atomic_gz,
};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn same_dir() -> AtomicWriteOptions {
    AtomicWriteOptions::new().temp_dir(TempDirPolicy::SameDir)
}

fn leftovers(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with(".quill-")
        })
        .count()
}

fn payload(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

#[test]
fn test_write_plain_hello() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("x").join("out.txt");
    std::fs::create_dir(dir.path().join("x")).unwrap();

    write_atomic(&dest, false, |w| w.write_all(b"hello\n")).unwrap();

    assert_eq!(atomic_read(&dest).unwrap(), b"hello\n");
}

#[test]
fn test_write_gzip_hello() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.txt.gz");

    write_atomic(&dest, true, |w| w.write_all(b"hello\n")).unwrap();

    let raw = atomic_read(&dest).unwrap();
    let mut decoded = Vec::new();
    GzDecoder::new(&raw[..]).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, b"hello\n");
}

#[test]
fn test_failed_producer_leaves_destination_absent() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.txt");

    let err = atomic_write_with(&dest, same_dir(), |w| {
        w.write_all(b"partial page")?;
        Err(std::io::Error::other("template error"))
    })
    .unwrap_err();

    assert!(matches!(err, Error::Produce { .. }));
    assert!(!dest.exists());
    assert_eq!(leftovers(dir.path()), 0);
}

#[test]
fn test_failed_producer_preserves_existing_content() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("existing.txt");
    std::fs::write(&dest, "original").unwrap();

    for compress in [false, true] {
        let result = write_atomic(&dest, compress, |w| {
            w.write_all(b"new content")?;
            Err(std::io::Error::other("aborted"))
        });
        assert!(result.is_err());
        assert_eq!(atomic_read(&dest).unwrap(), b"original");
    }
}

#[test]
fn test_existing_destination_is_replaced() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("existing.txt");
    std::fs::write(&dest, "a much longer original body").unwrap();

    write_atomic(&dest, false, |w| w.write_all(b"short")).unwrap();

    assert_eq!(atomic_read(&dest).unwrap(), b"short");
}

#[test]
fn test_gzip_roundtrip_sizes() {
    let dir = tempdir().unwrap();
    let mut compressor = GzipCompressor::new();

    for len in [0usize, 1, 1_500_000] {
        let data = payload(len);

        let fresh = dir.path().join(format!("fresh-{len}.gz"));
        write_atomic(&fresh, true, |w| w.write_all(&data)).unwrap();
        assert_eq!(atomic_read_gz(&fresh).unwrap(), data);

        let reused = dir.path().join(format!("reused-{len}.gz"));
        write_atomic_gz(&reused, &mut compressor, |w| w.write_all(&data)).unwrap();
        assert_eq!(atomic_read_gz(&reused).unwrap(), data);
    }
}

#[test]
fn test_reused_compressor_over_many_files() {
    let dir = tempdir().unwrap();
    let mut compressor = GzipCompressor::new();

    for i in 0..200 {
        let dest = dir.path().join(format!("page{i}.html.gz"));
        write_atomic_gz(&dest, &mut compressor, |w| {
            for line in 0..i {
                writeln!(w, "<p>page {i} line {line}</p>")?;
            }
            Ok(())
        })
        .unwrap();
    }

    for i in [0, 1, 57, 199] {
        let dest = dir.path().join(format!("page{i}.html.gz"));
        let expected: String = (0..i)
            .map(|line| format!("<p>page {i} line {line}</p>\n"))
            .collect();
        assert_eq!(atomic_read_gz(&dest).unwrap(), expected.as_bytes());
    }
}

#[test]
fn test_reusing_ignores_compress_flag() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.gz");
    let mut compressor = GzipCompressor::new();

    atomic_write_reusing(
        &dest,
        &mut compressor,
        AtomicWriteOptions::new().compress(false),
        |w| w.write_all(b"always gzip"),
    )
    .unwrap();

    assert_eq!(atomic_read_gz(&dest).unwrap(), b"always gzip");
}

#[test]
fn test_concurrent_writers_never_tear() {
    let dir = tempdir().unwrap();
    let dest = Arc::new(dir.path().join("shared.txt"));

    let bodies: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 256 * 1024]).collect();

    let handles: Vec<_> = bodies
        .iter()
        .cloned()
        .map(|body| {
            let dest = Arc::clone(&dest);
            std::thread::spawn(move || {
                write_atomic(dest.as_path(), false, |w| {
                    for chunk in body.chunks(1000) {
                        w.write_all(chunk)?;
                    }
                    Ok(())
                })
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let result = atomic_read(dest.as_path()).unwrap();
    assert!(bodies.contains(&result));
}

#[test]
fn test_temp_dir_override() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    let out = dir.path().join("out");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::create_dir_all(&out).unwrap();

    let dest = out.join("page.txt");
    let options = AtomicWriteOptions::new().temp_dir(TempDirPolicy::Path(staging.clone()));
    atomic_write_with(&dest, options, |w| w.write_all(b"staged elsewhere")).unwrap();

    assert_eq!(atomic_read(&dest).unwrap(), b"staged elsewhere");
    assert_eq!(leftovers(&staging), 0);
}

#[test]
fn test_rename_failure_is_explicit() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir_all(&staging).unwrap();
    let dest = dir.path().join("missing-dir").join("page.txt");

    let options = AtomicWriteOptions::new().temp_dir(TempDirPolicy::Path(staging.clone()));
    let err = atomic_write_with(&dest, options, |w| w.write_all(b"complete")).unwrap_err();

    assert_eq!(err.phase(), Phase::Rename);
    match &err {
        Error::Rename { from, to, .. } => {
            assert_eq!(to, &dest);
            assert!(from.starts_with(&staging));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
    assert_eq!(leftovers(&staging), 0);
}

#[test]
fn test_rename_failure_keeps_complete_temp_when_asked() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    std::fs::create_dir_all(&staging).unwrap();
    let dest = dir.path().join("missing-dir").join("page.txt");

    let options = AtomicWriteOptions::new()
        .temp_dir(TempDirPolicy::Path(staging.clone()))
        .keep_temp_on_failure(true);
    let err = atomic_write_with(&dest, options, |w| w.write_all(b"complete")).unwrap_err();

    let Error::Rename { from, .. } = err else {
        panic!("expected rename error");
    };
    assert_eq!(std::fs::read(&from).unwrap(), b"complete");
}

#[cfg(unix)]
#[test]
fn test_mode_ignores_umask() {
    use nix::sys::stat::{Mode, umask};
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let previous = umask(Mode::from_bits_truncate(0o077));

    let plain = dir.path().join("plain.txt");
    let gz = dir.path().join("plain.txt.gz");
    let plain_result = write_atomic(&plain, false, |w| w.write_all(b"x"));
    let gz_result = write_atomic(&gz, true, |w| w.write_all(b"x"));

    umask(previous);
    plain_result.unwrap();
    gz_result.unwrap();

    for path in [plain, gz] {
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644, "{}", path.display());
    }
}
