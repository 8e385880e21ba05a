//! Mailbox pass: one byte at a time through the whole mailbox stream

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::DualBuffer;
use crate::error::Result;
use crate::rules::SkipAreas;

use super::classifier::{AreaClassifier, MESSAGE_SENTINEL};
use super::coverage::{CoverageMap, DEFAULT_MAP_WIDTH};
use super::replacer::PadPolicy;
use super::session::ScanSession;

/// Default block size of the dual buffer
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Settings of a mailbox pass
#[derive(Debug, Clone)]
pub struct MailboxOptions {
    pub block_size: usize,
    /// Only scan this many bytes at the end, from the next message start on
    pub tail_bytes: Option<u64>,
    /// Areas in which no rule is tried
    pub skip: SkipAreas,
    pub map_width: usize,
}

impl Default for MailboxOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            tail_bytes: None,
            skip: SkipAreas::default(),
            map_width: DEFAULT_MAP_WIDTH,
        }
    }
}

/// What a mailbox pass saw and did
#[derive(Debug, Clone, Serialize)]
pub struct MailboxStats {
    /// File size, unchanged by the pass
    pub size: u64,
    /// Offset the scan started at
    pub start: u64,
    /// Messages whose start was scanned
    pub messages: u64,
    pub messages_changed: u64,
    pub deleted_messages: u64,
    /// Rule applications that changed at least one byte
    pub changes: u64,
    pub coverage: CoverageMap,
}

impl MailboxStats {
    /// Whether the pass covered the file from its first byte
    pub fn full_scan(&self) -> bool {
        self.start == 0
    }
}

/// Run every rule over the mailbox in `file`, rewriting it in place
///
/// `live_offsets` holds the message offsets still listed in the index and
/// turns on deleted-message tracking. Errors raised after a block was
/// written are wrapped as [`crate::FixError::PartialWrite`] of `path`.
pub fn scan_mailbox<F: Read + Write + Seek>(
    file: &mut F,
    path: &Path,
    session: &mut ScanSession,
    options: &MailboxOptions,
    live_offsets: Option<HashSet<u64>>,
) -> Result<MailboxStats> {
    let size = file.seek(SeekFrom::End(0))?;
    let start = match options.tail_bytes {
        Some(tail) if tail < size => {
            let from = size - tail;
            match find_message_start(file, from)? {
                Some(found) => {
                    info!("Scanning the last {} bytes, from the message at {}", size - found, found);
                    found
                }
                None => {
                    warn!("No message starts in the last {} bytes; nothing to scan", tail);
                    size
                }
            }
        }
        _ => 0,
    };

    let mut stats = MailboxStats {
        size,
        start,
        messages: 0,
        messages_changed: 0,
        deleted_messages: 0,
        changes: 0,
        coverage: CoverageMap::new(options.map_width, size),
    };

    let mut buffer = DualBuffer::open(&mut *file, options.block_size, start)?;
    let walked = walk(&mut buffer, session, options, live_offsets, &mut stats)
        .and_then(|()| buffer.finish());
    walked.map_err(|e| e.after_writes(path, buffer.wrote_to_disk()))?;

    info!(
        "Mailbox pass: {} messages, {} changed, {} changes",
        stats.messages, stats.messages_changed, stats.changes
    );
    Ok(stats)
}

fn walk<F: Read + Write + Seek>(
    buffer: &mut DualBuffer<F>,
    session: &mut ScanSession,
    options: &MailboxOptions,
    live_offsets: Option<HashSet<u64>>,
    stats: &mut MailboxStats,
) -> Result<()> {
    let mut classifier = AreaClassifier::new(live_offsets);
    let mut message_changed = false;

    while buffer.has_data() {
        let position = buffer.position();
        if classifier.step(&*buffer, position) {
            if message_changed && stats.messages > 0 {
                stats.messages_changed += 1;
            }
            message_changed = false;
            stats.messages += 1;
            session.begin_message();
            if classifier.zone().deleted {
                stats.deleted_messages += 1;
                debug!("Message at {} is not in the index", position);
            }
        }

        let zone = classifier.zone();
        if options.skip.excludes(&zone) {
            session.track_tags(&*buffer);
        } else {
            let changed = session.try_rules(buffer, &zone, PadPolicy::ZeroFill)?;
            if changed > 0 {
                stats.changes += changed as u64;
                stats.coverage.mark(position);
                message_changed = true;
            }
        }

        buffer.advance()?;
    }

    if message_changed && stats.messages > 0 {
        stats.messages_changed += 1;
    }
    Ok(())
}

/// Offset of the first message sentinel at a line start at or after `from`
pub fn find_message_start<R: Read + Seek>(file: &mut R, from: u64) -> Result<Option<u64>> {
    const CHUNK: u64 = 64 * 1024;

    // One byte before `from` tells whether `from` is at a line start
    let mut base = from.saturating_sub(1);
    file.seek(SeekFrom::Start(base))?;
    let mut data = Vec::new();

    loop {
        let read = file.by_ref().take(CHUNK).read_to_end(&mut data)?;
        for i in 0..data.len() {
            let offset = base + i as u64;
            if offset < from {
                continue;
            }
            let line_start = offset == 0 || (i > 0 && matches!(data[i - 1], b'\r' | b'\n'));
            if line_start && data[i..].starts_with(MESSAGE_SENTINEL) {
                return Ok(Some(offset));
            }
        }
        if read == 0 {
            return Ok(None);
        }
        // Keep enough to see a sentinel cut by the chunk edge, plus the byte before it
        let keep = MESSAGE_SENTINEL.len();
        if data.len() > keep {
            let drop = data.len() - keep;
            data.drain(..drop);
            base += drop as u64;
        }
    }
}
