//! Record-level access to an index file

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::error::{FixError, Result};

use super::types::{TocHeader, TocRecord, HEADER_SIZE, RECORD_SIZE};

/// Open index file with its header already read
pub struct TocFile<F> {
    file: F,
    header: TocHeader,
    len: u64,
    wrote: bool,
}

impl<F: Read + Write + Seek> TocFile<F> {
    /// Read the header of `file`
    pub fn open(mut file: F) -> Result<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        if len < HEADER_SIZE as u64 {
            return Err(FixError::InvalidIndex(format!(
                "file has {} bytes, shorter than the {} byte header",
                len, HEADER_SIZE
            )));
        }
        file.seek(SeekFrom::Start(0))?;
        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw)?;
        let header = TocHeader::from_bytes(raw);
        debug!(
            "Index for mailbox \"{}\" lists {} messages",
            header.mailbox_name(),
            header.message_count()
        );
        Ok(Self {
            file,
            header,
            len,
            wrote: false,
        })
    }

    pub fn header(&self) -> &TocHeader {
        &self.header
    }

    /// Complete descriptors present in the file
    pub fn records_on_disk(&self) -> u64 {
        (self.len - HEADER_SIZE as u64) / RECORD_SIZE as u64
    }

    /// Descriptors both listed by the header and present in the file
    pub fn usable_records(&self) -> u64 {
        self.records_on_disk().min(self.header.message_count() as u64)
    }

    /// File offset of descriptor `index`
    pub fn record_position(index: u64) -> u64 {
        HEADER_SIZE as u64 + index * RECORD_SIZE as u64
    }

    pub fn read_record(&mut self, index: u64) -> Result<TocRecord> {
        self.file.seek(SeekFrom::Start(Self::record_position(index)))?;
        let mut raw = [0u8; RECORD_SIZE];
        self.file.read_exact(&mut raw)?;
        Ok(TocRecord::from_bytes(raw))
    }

    pub fn write_record(&mut self, index: u64, record: &TocRecord) -> Result<()> {
        self.wrote = true;
        self.file.seek(SeekFrom::Start(Self::record_position(index)))?;
        self.file.write_all(record.as_bytes())?;
        Ok(())
    }

    /// Message offsets of every usable descriptor, in file order
    pub fn offsets(&mut self) -> Result<Vec<i32>> {
        (0..self.usable_records())
            .map(|i| self.read_record(i).map(|r| r.offset()))
            .collect()
    }

    pub fn flush(&mut self) -> Result<()> {
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
}
