//! Dual sliding buffer over a read/write file
//!
//! The buffer holds two adjacent blocks of the file, each in two copies:
//! the bytes as read ("original") and the bytes as rewritten ("working").
//! Matching looks at the original copy, so a replacement made earlier in the
//! scan cannot hide bytes that a later-starting match still has to test.
//! The cursor always stays in the first block, which leaves at least
//! `block + 1` bytes of lookahead until the end of the file is near.

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use tracing::debug;

use crate::error::Result;

/// Smallest block size the buffer accepts
pub const MIN_BLOCK_SIZE: usize = 128;

/// Byte access used by the matcher and the replacer, relative to a cursor
pub trait Window {
    /// Byte the matcher sees at `offset` from the cursor, `None` past the lookahead
    ///
    /// Bytes inside the settled prefix (see [`Window::settle`]) are read from
    /// the working copy, everything else from the original copy.
    fn peek(&self, offset: usize) -> Option<u8>;

    /// Number of bytes from the cursor that a single match may span
    ///
    /// [`DualBuffer`] caps this at one block plus one byte even when more
    /// of the second block is loaded, so whether a long match is found
    /// never depends on where the cursor sits within its block.
    fn lookahead(&self) -> usize;

    /// Raw original byte, ignoring the settled prefix
    fn original(&self, offset: usize) -> Option<u8>;

    /// Raw working byte
    fn working(&self, offset: usize) -> Option<u8>;

    /// Overwrite one working byte; returns whether it changed
    fn write(&mut self, offset: usize, byte: u8) -> bool;

    /// Overwrite both copies of one byte; returns whether the working byte changed
    ///
    /// Only the fixed-field compaction path uses this: after a left shift the
    /// shifted bytes become the canonical input for later matches in the field.
    fn rewrite(&mut self, offset: usize, original: u8, working: u8) -> bool;

    /// Let rules tried later at this same cursor see the first `len` working bytes
    fn settle(&mut self, len: usize);
}

/// Two same-size windows of file content in pristine and working copies
pub struct DualBuffer<F> {
    file: F,
    block: usize,
    original: Vec<u8>,
    working: Vec<u8>,
    /// Valid bytes in the buffer
    len: usize,
    /// Cursor, always below `block` while more data follows
    pos: usize,
    /// File offset of buffer byte 0
    base: u64,
    /// File offset of the next read
    next_read: u64,
    dirty: [bool; 2],
    settled: usize,
    wrote: bool,
}

impl<F: Read + Write + Seek> DualBuffer<F> {
    /// Prime both windows starting at file offset `start`
    pub fn open(file: F, block: usize, start: u64) -> Result<Self> {
        let block = block.max(MIN_BLOCK_SIZE);
        let mut buffer = Self {
            file,
            block,
            original: vec![0; 2 * block],
            working: vec![0; 2 * block],
            len: 0,
            pos: 0,
            base: start,
            next_read: start,
            dirty: [false; 2],
            settled: 0,
            wrote: false,
        };
        buffer.len = buffer.fill(0)?;
        if buffer.len == block {
            buffer.len += buffer.fill(block)?;
        }
        debug!(
            "Buffer primed with {} bytes at file offset {}",
            buffer.len, start
        );
        Ok(buffer)
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    /// File offset of the cursor
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Whether the cursor is on a byte of the file
    pub fn has_data(&self) -> bool {
        self.pos < self.len
    }

    /// Move the cursor one byte, sliding the windows when it leaves the first one
    pub fn advance(&mut self) -> Result<bool> {
        self.pos += 1;
        self.settled = 0;
        if self.pos >= self.block && self.len > self.block {
            self.slide()?;
        }
        Ok(self.has_data())
    }

    /// Write out every dirty window, including a final partial one
    pub fn finish(&mut self) -> Result<()> {
        if self.dirty[0] {
            self.flush_half(0)?;
        }
        if self.dirty[1] {
            self.flush_half(1)?;
        }
        self.file.flush()?;
        Ok(())
    }

    /// Whether any write to the file was attempted
    pub fn wrote_to_disk(&self) -> bool {
        self.wrote
    }

    pub fn into_inner(self) -> F {
        self.file
    }

    fn slide(&mut self) -> Result<()> {
        if self.dirty[0] {
            self.flush_half(0)?;
        }
        let block = self.block;
        self.original.copy_within(block.., 0);
        self.working.copy_within(block.., 0);
        self.dirty = [self.dirty[1], false];
        self.base += block as u64;
        self.pos -= block;
        self.len -= block;
        let read = self.fill(block)?;
        self.len += read;
        debug!(
            "Buffer slid to file offset {}, read {} bytes",
            self.base, read
        );
        Ok(())
    }

    /// Read up to one block into the half starting at `at`
    fn fill(&mut self, at: usize) -> Result<usize> {
        self.file.seek(SeekFrom::Start(self.next_read))?;
        let dest = &mut self.original[at..at + self.block];
        let mut filled = 0;
        while filled < dest.len() {
            match self.file.read(&mut dest[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.working[at..at + filled].copy_from_slice(&self.original[at..at + filled]);
        self.next_read += filled as u64;
        Ok(filled)
    }

    fn flush_half(&mut self, half: usize) -> Result<()> {
        let start = half * self.block;
        let end = (start + self.block).min(self.len);
        if start < end {
            self.wrote = true;
            self.file.seek(SeekFrom::Start(self.base + start as u64))?;
            self.file.write_all(&self.working[start..end])?;
            debug!(
                "Wrote {} bytes at file offset {}",
                end - start,
                self.base + start as u64
            );
        }
        self.dirty[half] = false;
        Ok(())
    }
}

impl<F> Window for DualBuffer<F> {
    fn peek(&self, offset: usize) -> Option<u8> {
        if offset >= self.lookahead() {
            return None;
        }
        let i = self.pos + offset;
        if offset < self.settled {
            Some(self.working[i])
        } else {
            Some(self.original[i])
        }
    }

    fn lookahead(&self) -> usize {
        self.len.saturating_sub(self.pos).min(self.block + 1)
    }

    fn original(&self, offset: usize) -> Option<u8> {
        (offset < self.lookahead()).then(|| self.original[self.pos + offset])
    }

    fn working(&self, offset: usize) -> Option<u8> {
        (offset < self.lookahead()).then(|| self.working[self.pos + offset])
    }

    fn write(&mut self, offset: usize, byte: u8) -> bool {
        if offset >= self.lookahead() {
            return false;
        }
        let i = self.pos + offset;
        if self.working[i] == byte {
            return false;
        }
        self.working[i] = byte;
        self.dirty[i / self.block] = true;
        true
    }

    fn rewrite(&mut self, offset: usize, original: u8, working: u8) -> bool {
        if offset >= self.lookahead() {
            return false;
        }
        self.original[self.pos + offset] = original;
        self.write(offset, working)
    }

    fn settle(&mut self, len: usize) {
        self.settled = self.settled.max(len.min(self.lookahead()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_walks_every_byte() {
        let bytes = data(1000);
        let mut buffer = DualBuffer::open(Cursor::new(bytes.clone()), 128, 0).unwrap();
        let mut seen = Vec::new();
        while buffer.has_data() {
            assert!(buffer.lookahead() >= 1);
            seen.push(buffer.peek(0).unwrap());
            assert_eq!(buffer.position() as usize, seen.len() - 1);
            buffer.advance().unwrap();
        }
        assert_eq!(seen, bytes);
    }

    #[test]
    fn test_lookahead_spans_block_plus_one() {
        let bytes = data(1000);
        let mut buffer = DualBuffer::open(Cursor::new(bytes.clone()), 128, 0).unwrap();
        while buffer.has_data() {
            let pos = buffer.position() as usize;
            let expected = (bytes.len() - pos).min(129);
            assert_eq!(buffer.lookahead(), expected);
            assert_eq!(buffer.peek(expected - 1), Some(bytes[pos + expected - 1]));
            assert_eq!(buffer.peek(expected), None);
            buffer.advance().unwrap();
        }
    }

    #[test]
    fn test_writes_reach_file_across_slides() {
        let bytes = data(700);
        let mut buffer = DualBuffer::open(Cursor::new(bytes.clone()), 128, 0).unwrap();
        while buffer.has_data() {
            if buffer.position() % 100 == 0 {
                // Straddle the next window when possible
                buffer.write(0, b'X');
                buffer.write(60, b'Y');
            }
            buffer.advance().unwrap();
        }
        buffer.finish().unwrap();
        assert!(buffer.wrote_to_disk());

        let out = buffer.into_inner().into_inner();
        assert_eq!(out.len(), bytes.len());
        for (i, b) in out.iter().enumerate() {
            if i % 100 == 0 {
                assert_eq!(*b, b'X', "offset {}", i);
            } else if i >= 60 && (i - 60) % 100 == 0 {
                assert_eq!(*b, b'Y', "offset {}", i);
            } else {
                assert_eq!(*b, bytes[i], "offset {}", i);
            }
        }
    }

    #[test]
    fn test_original_survives_working_write() {
        let mut buffer = DualBuffer::open(Cursor::new(b"ab\n\ncd".to_vec()), 128, 0).unwrap();
        buffer.advance().unwrap();
        buffer.advance().unwrap();
        assert!(buffer.write(0, b'\r'));
        buffer.advance().unwrap();
        // The next position still sees the original line feed before it
        assert_eq!(buffer.peek(0), Some(b'\n'));
        assert_eq!(buffer.original(0), Some(b'\n'));
    }

    #[test]
    fn test_settle_exposes_working_bytes() {
        let mut buffer = DualBuffer::open(Cursor::new(b"abc".to_vec()), 128, 0).unwrap();
        buffer.write(0, b'x');
        assert_eq!(buffer.peek(0), Some(b'a'));
        buffer.settle(1);
        assert_eq!(buffer.peek(0), Some(b'x'));
        assert_eq!(buffer.peek(1), Some(b'b'));
        buffer.advance().unwrap();
        assert_eq!(buffer.peek(0), Some(b'b'));
    }

    #[test]
    fn test_clean_run_writes_nothing() {
        let mut buffer = DualBuffer::open(Cursor::new(data(300)), 128, 0).unwrap();
        while buffer.advance().unwrap() {}
        buffer.finish().unwrap();
        assert!(!buffer.wrote_to_disk());
    }

    #[test]
    fn test_open_at_offset() {
        let bytes = data(300);
        let buffer = DualBuffer::open(Cursor::new(bytes.clone()), 128, 250).unwrap();
        assert_eq!(buffer.position(), 250);
        assert_eq!(buffer.lookahead(), 50);
        assert_eq!(buffer.peek(0), Some(bytes[250]));
    }

    #[test]
    fn test_empty_file() {
        let buffer = DualBuffer::open(Cursor::new(Vec::new()), 128, 0).unwrap();
        assert!(!buffer.has_data());
        assert_eq!(buffer.peek(0), None);
    }
}
