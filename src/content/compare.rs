//! Sequential copier and multi-pass comparator
//!
//! Removable media can return different bytes for the same read, so
//! verification re-opens both files and compares them `verify_passes`
//! times. Every pass must agree for the files to be considered equal.

use super::{FileOps, WriteMode};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use tracing::trace;

/// Default transfer buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Default number of verification passes
pub const DEFAULT_VERIFY_PASSES: u32 = 2;

/// Copier/comparator parameterised by buffer size and pass count
#[derive(Debug, Clone)]
pub struct FileComparator {
    buffer_size: usize,
    verify_passes: u32,
}

impl FileComparator {
    /// Create a comparator. Zero values are raised to 1.
    pub fn new(buffer_size: usize, verify_passes: u32) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            verify_passes: verify_passes.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn verify_passes(&self) -> u32 {
        self.verify_passes
    }

    /// One full comparison pass over freshly opened files
    fn compare_once(&self, a: &Path, b: &Path, buf_a: &mut [u8], buf_b: &mut [u8]) -> io::Result<bool> {
        let mut file_a = File::open(a)?;
        let mut file_b = File::open(b)?;

        if file_a.metadata()?.len() != file_b.metadata()?.len() {
            return Ok(false);
        }

        loop {
            let read_a = read_chunk(&mut file_a, buf_a)?;
            let read_b = read_chunk(&mut file_b, buf_b)?;

            if read_a != read_b {
                return Ok(false);
            }
            if read_a == 0 {
                return Ok(true);
            }
            if buf_a[..read_a] != buf_b[..read_b] {
                return Ok(false);
            }
        }
    }
}

impl Default for FileComparator {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE, DEFAULT_VERIFY_PASSES)
    }
}

impl FileOps for FileComparator {
    fn copy(&self, src: &Path, dst: &Path, mode: WriteMode) -> io::Result<u64> {
        let mut from = File::open(src)?;
        let mut options = OpenOptions::new();
        match mode {
            WriteMode::CreateNew => options.write(true).create_new(true),
            WriteMode::Replace => options.write(true).create(true),
        };
        let mut to = options.open(dst)?;

        let mut buf = vec![0u8; self.buffer_size];
        let mut written = 0u64;

        loop {
            let n = match from.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            to.write_all(&buf[..n])?;
            written += n as u64;
        }

        // A retry may land on an earlier, longer bad copy.
        to.set_len(written)?;
        to.flush()?;

        trace!(src = %src.display(), dst = %dst.display(), bytes = written, "Copy finished");
        Ok(written)
    }

    fn content_equal(&self, a: &Path, b: &Path) -> io::Result<bool> {
        let mut buf_a = vec![0u8; self.buffer_size];
        let mut buf_b = vec![0u8; self.buffer_size];

        for pass in 0..self.verify_passes {
            if !self.compare_once(a, b, &mut buf_a, &mut buf_b)? {
                trace!(a = %a.display(), b = %b.display(), pass, "Content mismatch");
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Fill `buf` as far as possible, returning fewer bytes only at EOF
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
