//! Two-copy view over one fixed-width text field of an index record

use super::window::Window;

/// Cursor over a fixed-width field with original and working copies
pub struct FieldWindow<'a> {
    original: &'a mut [u8],
    working: &'a mut [u8],
    pos: usize,
    settled: usize,
}

impl<'a> FieldWindow<'a> {
    /// Both slices must have the same width
    pub fn new(original: &'a mut [u8], working: &'a mut [u8]) -> Self {
        debug_assert_eq!(original.len(), working.len());
        Self {
            original,
            working,
            pos: 0,
            settled: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.working.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Place the cursor at `pos` within the field
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.width());
        self.settled = 0;
    }
}

impl Window for FieldWindow<'_> {
    fn peek(&self, offset: usize) -> Option<u8> {
        let i = self.pos + offset;
        if i >= self.width() {
            None
        } else if offset < self.settled {
            Some(self.working[i])
        } else {
            Some(self.original[i])
        }
    }

    fn lookahead(&self) -> usize {
        self.width() - self.pos
    }

    fn original(&self, offset: usize) -> Option<u8> {
        self.original.get(self.pos + offset).copied()
    }

    fn working(&self, offset: usize) -> Option<u8> {
        self.working.get(self.pos + offset).copied()
    }

    fn write(&mut self, offset: usize, byte: u8) -> bool {
        match self.working.get_mut(self.pos + offset) {
            Some(slot) if *slot != byte => {
                *slot = byte;
                true
            }
            _ => false,
        }
    }

    fn rewrite(&mut self, offset: usize, original: u8, working: u8) -> bool {
        match self.original.get_mut(self.pos + offset) {
            Some(slot) => {
                *slot = original;
                self.write(offset, working)
            }
            None => false,
        }
    }

    fn settle(&mut self, len: usize) {
        self.settled = self.settled.max(len.min(self.lookahead()));
    }
}
