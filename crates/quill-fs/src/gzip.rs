//! Reusable gzip encoder.
//!
//! Setting up a level-9 deflate state allocates several hundred kilobytes.
//! Writing thousands of small artifacts in one run pays that once per file
//! with `flate2::write::GzEncoder`; [`GzipCompressor`] keeps the state and
//! resets it instead.
//!
//! # Example
//!
//! ```
//! use std::io::Write;
//! use quill_fs::GzipCompressor;
//!
//! let mut compressor = GzipCompressor::new();
//! for name in ["a", "b"] {
//!     let mut stream = compressor.reset(Vec::new());
//!     stream.write_all(name.as_bytes()).unwrap();
//!     let gz = stream.finish().unwrap();
//!     assert_eq!(&gz[..2], &[0x1f, 0x8b]);
//! }
//! ```

use std::io::{self, Write};

use flate2::{Compress, Compression, Crc, FlushCompress, Status};

const SCRATCH_CAPACITY: usize = 32 * 1024;

// ID1 ID2 CM=deflate FLG=0 MTIME=0 XFL=2 (maximum compression) OS=unknown
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x02, 0xff];

/// Caller-owned gzip state, reused across many output streams.
pub struct GzipCompressor {
    deflate: Compress,
    crc: Crc,
    scratch: Vec<u8>,
}

impl Default for GzipCompressor {
    fn default() -> Self { Self::new() }
}

impl GzipCompressor {
    /// Raw deflate at [`Compression::best`].
    pub fn new() -> Self {
        Self {
            deflate: Compress::new(Compression::best(), false),
            crc: Crc::new(),
            scratch: Vec::with_capacity(SCRATCH_CAPACITY),
        }
    }

    /// Detach from any previous target and start a new gzip member on `sink`.
    ///
    /// A stream abandoned without [`GzipStream::finish`] leaves nothing
    /// behind that a later `reset` would observe.
    pub fn reset<W: Write>(&mut self, sink: W) -> GzipStream<'_, W> {
        self.deflate.reset();
        self.crc.reset();
        self.scratch.clear();
        self.scratch.extend_from_slice(&GZIP_HEADER);
        GzipStream {
            compressor: self,
            sink,
        }
    }
}

/// A single gzip member being written through a borrowed [`GzipCompressor`].
pub struct GzipStream<'a, W: Write> {
    compressor: &'a mut GzipCompressor,
    sink: W,
}

impl<W: Write> GzipStream<'_, W> {
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Write the deflate tail and the CRC-32/ISIZE trailer, returning the sink.
    ///
    /// The sink itself is not flushed.
    pub fn finish(mut self) -> io::Result<W> {
        loop {
            self.dump()?;
            let before = self.compressor.deflate.total_out();
            self.compress(&[], FlushCompress::Finish)?;
            if self.compressor.deflate.total_out() == before {
                break;
            }
        }
        self.dump()?;

        let crc = &self.compressor.crc;
        self.sink.write_all(&crc.sum().to_le_bytes())?;
        self.sink.write_all(&crc.amount().to_le_bytes())?;
        Ok(self.sink)
    }

    fn dump(&mut self) -> io::Result<()> {
        if !self.compressor.scratch.is_empty() {
            self.sink.write_all(&self.compressor.scratch)?;
            self.compressor.scratch.clear();
        }
        Ok(())
    }

    fn compress(&mut self, input: &[u8], flush: FlushCompress) -> io::Result<Status> {
        self.compressor
            .deflate
            .compress_vec(input, &mut self.compressor.scratch, flush)
            .map_err(io::Error::other)
    }
}

impl<W: Write> Write for GzipStream<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            self.dump()?;
            let before = self.compressor.deflate.total_in();
            let status = self.compress(buf, FlushCompress::None)?;
            let consumed = (self.compressor.deflate.total_in() - before) as usize;

            // scratch was full; it has been drained, go again
            if !buf.is_empty() && consumed == 0 && status != Status::StreamEnd {
                continue;
            }

            self.compressor.crc.update(&buf[..consumed]);
            return Ok(consumed);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.compress(&[], FlushCompress::Sync)?;
        loop {
            self.dump()?;
            let before = self.compressor.deflate.total_out();
            self.compress(&[], FlushCompress::None)?;
            if self.compressor.deflate.total_out() == before {
                break;
            }
        }
        self.sink.flush()
    }
}
