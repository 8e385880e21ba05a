//! Test doubles shared by the pass tests

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// In-memory file whose writes start failing after `writes_left` calls
pub(crate) struct FailingFile {
    inner: Cursor<Vec<u8>>,
    writes_left: usize,
}

impl FailingFile {
    pub(crate) fn new(data: Vec<u8>, writes_left: usize) -> Self {
        Self {
            inner: Cursor::new(data),
            writes_left,
        }
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl Read for FailingFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for FailingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes_left == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.writes_left -= 1;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FailingFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
