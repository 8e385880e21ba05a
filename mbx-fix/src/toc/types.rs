//! Table-of-contents layout
//!
//! Integers are little-endian. Text fields are fixed-width and zero-padded.

use std::ops::Range;

use serde::Serialize;

/// Size of the file header
pub const HEADER_SIZE: usize = 104;

/// Size of one message descriptor
pub const RECORD_SIZE: usize = 218;

const NAME: Range<usize> = 8..40;
const MESSAGE_COUNT: usize = 0x66;

const OFFSET: usize = 0;
const LENGTH: usize = 4;
const SENDER_RECIPIENT: Range<usize> = 50..114;
const SUBJECT: Range<usize> = 114..178;

/// Index file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocHeader {
    raw: [u8; HEADER_SIZE],
}

impl TocHeader {
    /// Header for mailbox `name` listing `count` messages, everything else zero
    pub fn new(name: &str, count: u16) -> Self {
        let mut raw = [0u8; HEADER_SIZE];
        raw[0] = b'1';
        put_text(&mut raw[NAME], name.as_bytes());
        raw[MESSAGE_COUNT..MESSAGE_COUNT + 2].copy_from_slice(&count.to_le_bytes());
        Self { raw }
    }

    pub fn from_bytes(raw: [u8; HEADER_SIZE]) -> Self {
        Self { raw }
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.raw
    }

    /// Number of message descriptors that follow the header
    pub fn message_count(&self) -> u16 {
        u16::from_le_bytes([self.raw[MESSAGE_COUNT], self.raw[MESSAGE_COUNT + 1]])
    }

    pub fn mailbox_name(&self) -> String {
        text(&self.raw[NAME])
    }
}

/// Text field of a descriptor that rules may rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TocField {
    SenderRecipient,
    Subject,
}

impl TocField {
    pub const ALL: [TocField; 2] = [TocField::SenderRecipient, TocField::Subject];

    /// Byte range of the field within a descriptor
    pub fn range(self) -> Range<usize> {
        match self {
            TocField::SenderRecipient => SENDER_RECIPIENT,
            TocField::Subject => SUBJECT,
        }
    }

    pub fn width(self) -> usize {
        self.range().len()
    }

    pub fn name(self) -> &'static str {
        match self {
            TocField::SenderRecipient => "sender/recipient",
            TocField::Subject => "subject",
        }
    }
}

/// One message descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocRecord {
    raw: [u8; RECORD_SIZE],
}

impl TocRecord {
    /// Descriptor with the given location and text fields, everything else zero
    ///
    /// Text longer than its field is cut off.
    pub fn new(offset: i32, length: i32, sender_recipient: &[u8], subject: &[u8]) -> Self {
        let mut raw = [0u8; RECORD_SIZE];
        raw[OFFSET..OFFSET + 4].copy_from_slice(&offset.to_le_bytes());
        raw[LENGTH..LENGTH + 4].copy_from_slice(&length.to_le_bytes());
        put_text(&mut raw[SENDER_RECIPIENT], sender_recipient);
        put_text(&mut raw[SUBJECT], subject);
        Self { raw }
    }

    pub fn from_bytes(raw: [u8; RECORD_SIZE]) -> Self {
        Self { raw }
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.raw
    }

    /// Offset of the message in the mailbox
    pub fn offset(&self) -> i32 {
        read_i32(&self.raw, OFFSET)
    }

    /// Size of the message in the mailbox
    pub fn length(&self) -> i32 {
        read_i32(&self.raw, LENGTH)
    }

    pub fn field(&self, field: TocField) -> &[u8] {
        &self.raw[field.range()]
    }

    pub fn field_mut(&mut self, field: TocField) -> &mut [u8] {
        &mut self.raw[field.range()]
    }

    /// Field content up to the first zero byte
    pub fn field_text(&self, field: TocField) -> String {
        text(self.field(field))
    }
}

fn read_i32(raw: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn put_text(dest: &mut [u8], src: &[u8]) {
    let n = src.len().min(dest.len());
    dest[..n].copy_from_slice(&src[..n]);
}

fn text(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
