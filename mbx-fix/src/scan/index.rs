//! Index pass: the text fields of every index descriptor

use std::io::{Read, Seek, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::buffer::FieldWindow;
use crate::error::Result;
use crate::toc::{TocField, TocFile};

use super::classifier::Zone;
use super::coverage::CoverageMap;
use super::replacer::PadPolicy;
use super::session::ScanSession;

/// What an index pass saw and did
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub records: u64,
    pub records_changed: u64,
    pub sender_recipient_changes: u64,
    pub subject_changes: u64,
    /// Rule applications that changed at least one byte
    pub changes: u64,
    pub coverage: CoverageMap,
}

/// Rewrite the sender/recipient and subject fields of every usable descriptor
///
/// Fields are compacted to the left when a replacement is shorter than its
/// match. Errors raised after a descriptor was written are wrapped as
/// [`crate::FixError::PartialWrite`] of `path`.
pub fn scan_index<F: Read + Write + Seek>(
    toc: &mut TocFile<F>,
    path: &Path,
    session: &mut ScanSession,
    map_width: usize,
) -> Result<IndexStats> {
    let size = TocFile::<F>::record_position(toc.records_on_disk());
    let mut stats = IndexStats {
        records: 0,
        records_changed: 0,
        sender_recipient_changes: 0,
        subject_changes: 0,
        changes: 0,
        coverage: CoverageMap::new(map_width, size),
    };

    let walked = walk(toc, session, &mut stats).and_then(|()| toc.flush());
    walked.map_err(|e| e.after_writes(path, toc.wrote_to_disk()))?;

    info!(
        "Index pass: {} records, {} changed, {} changes",
        stats.records, stats.records_changed, stats.changes
    );
    Ok(stats)
}

fn walk<F: Read + Write + Seek>(
    toc: &mut TocFile<F>,
    session: &mut ScanSession,
    stats: &mut IndexStats,
) -> Result<()> {
    let zone = Zone::index_field();

    for index in 0..toc.usable_records() {
        let mut record = toc.read_record(index)?;
        let record_at = TocFile::<F>::record_position(index);
        let mut record_changed = false;

        for field in TocField::ALL {
            let field_at = record_at + field.range().start as u64;
            let mut original = record.field(field).to_vec();
            let mut window = FieldWindow::new(&mut original, record.field_mut(field));
            session.begin_field();

            let mut changes = 0;
            for pos in 0..field.width() {
                window.seek(pos);
                let changed = session.try_rules(&mut window, &zone, PadPolicy::CompactField)?;
                if changed > 0 {
                    changes += changed as u64;
                    stats.coverage.mark(field_at + pos as u64);
                }
            }

            if changes > 0 {
                debug!("Record {}: {} changes in {}", index, changes, field.name());
                record_changed = true;
                stats.changes += changes;
                match field {
                    TocField::SenderRecipient => stats.sender_recipient_changes += changes,
                    TocField::Subject => stats.subject_changes += changes,
                }
            }
        }

        stats.records += 1;
        if record_changed {
            stats.records_changed += 1;
            toc.write_record(index, &record)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FixError;
    use crate::rules::parse_rules;
    use crate::scan::test_support::FailingFile;
    use crate::toc::{TocHeader, TocRecord, HEADER_SIZE, RECORD_SIZE};
    use std::io::Cursor;

    fn toc(records: &[TocRecord]) -> TocFile<Cursor<Vec<u8>>> {
        let mut data = TocHeader::new("In", records.len() as u16).as_bytes().to_vec();
        for record in records {
            data.extend_from_slice(record.as_bytes());
        }
        TocFile::open(Cursor::new(data)).unwrap()
    }

    fn session(rules: &str) -> ScanSession {
        ScanSession::new(parse_rules(rules.as_bytes()).unwrap().table)
    }

    #[test]
    fn test_subject_is_compacted() {
        let subject = [b"caf".as_slice(), &[0xC3, 0xA9], b" ouvert"].concat();
        let mut file = toc(&[
            TocRecord::new(0, 10, b"someone", &subject),
            TocRecord::new(10, 10, b"other", b"plain"),
        ]);
        let mut s = session("C3A9 = E9");

        let stats = scan_index(&mut file, Path::new("In.toc"), &mut s, 72).unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.records_changed, 1);
        assert_eq!(stats.subject_changes, 1);
        assert_eq!(stats.sender_recipient_changes, 0);
        assert!(file.wrote_to_disk());

        let record = file.read_record(0).unwrap();
        let field = record.field(TocField::Subject);
        assert_eq!(&field[..11], [b"caf".as_slice(), &[0xE9], b" ouvert"].concat().as_slice());
        assert!(field[11..].iter().all(|b| *b == 0));

        let data = file.into_inner().into_inner();
        assert_eq!(data.len(), HEADER_SIZE + 2 * RECORD_SIZE);
    }

    #[test]
    fn test_body_rules_skip_index_fields() {
        let mut file = toc(&[TocRecord::new(0, 10, b"x", b"x")]);
        let mut s = session("<body> \"x\" = \"y\"");
        let stats = scan_index(&mut file, Path::new("In.toc"), &mut s, 72).unwrap();
        assert_eq!(stats.changes, 0);
        assert!(!file.wrote_to_disk());
    }

    #[test]
    fn test_flags_reset_per_field() {
        // The flag set in the sender field must not reach the subject field
        let mut file = toc(&[TocRecord::new(0, 10, b"[", b"x")]);
        let mut s = session("\"[\" = <noop> <setmatch 1>\n<ifmatch 1> \"x\" = \"y\"");
        let stats = scan_index(&mut file, Path::new("In.toc"), &mut s, 72).unwrap();
        assert_eq!(stats.changes, 0);
    }

    #[test]
    fn test_failed_record_write_is_partial_write() {
        let mut data = TocHeader::new("In", 2).as_bytes().to_vec();
        data.extend_from_slice(TocRecord::new(0, 10, b"x", b"a").as_bytes());
        data.extend_from_slice(TocRecord::new(10, 10, b"x", b"b").as_bytes());
        let mut file = TocFile::open(FailingFile::new(data, 1)).unwrap();
        let mut s = session("\"x\" = \"y\"");

        let err = scan_index(&mut file, Path::new("In.toc"), &mut s, 72).unwrap_err();
        assert!(err.wrote_to_disk());
        assert!(matches!(err, FixError::PartialWrite { ref path, .. } if path == Path::new("In.toc")));

        let mut file = TocFile::open(Cursor::new(file.into_inner().into_inner())).unwrap();
        assert_eq!(file.read_record(0).unwrap().field_text(TocField::SenderRecipient), "y");
        assert_eq!(file.read_record(1).unwrap().field_text(TocField::SenderRecipient), "x");
    }
}
