//! Area classifier
//!
//! Tracks, one byte at a time, which part of a message the cursor is in.
//! Every transition is keyed on a literal at the cursor, so classification
//! does not depend on where buffer reads happen to fall.

use std::collections::HashSet;

use crate::buffer::Window;
use crate::rules::RuleMatcher;

/// Line that starts every message in a mailbox
pub const MESSAGE_SENTINEL: &[u8] = b"From ???@???";

/// Blank line ending the headers
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Body lines after which attachment file names may appear
const FILENAME_TRIGGERS: &[&[u8]] = &[
    b"content-disposition:",
    b"content-description:",
    b"content-type:",
    b"attachment converted:",
];

/// Classification of the byte at the cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zone {
    /// In the headers of a message, or in an index field
    pub header: bool,
    /// In a MIME part header or attachment line that may name a file
    pub filename: bool,
    /// In a message the index no longer lists
    pub deleted: bool,
}

impl Zone {
    /// Zone used for fixed-width index fields
    pub fn index_field() -> Self {
        Zone {
            header: true,
            ..Zone::default()
        }
    }
}

/// Cursor-driven header/body/filename/deleted tracker
#[derive(Debug, Clone)]
pub struct AreaClassifier {
    zone: Zone,
    line_start: bool,
    /// Message offsets present in the index; `None` turns deleted tracking off
    live_offsets: Option<HashSet<u64>>,
}

impl Default for AreaClassifier {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AreaClassifier {
    pub fn new(live_offsets: Option<HashSet<u64>>) -> Self {
        Self {
            zone: Zone::default(),
            line_start: true,
            live_offsets,
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Classify the byte at the cursor, which is at file offset `position`
    ///
    /// Returns true when a new message starts at this byte.
    pub fn step<W: Window + ?Sized>(&mut self, window: &W, position: u64) -> bool {
        let Some(byte) = window.peek(0) else {
            return false;
        };

        let message_start =
            self.line_start && RuleMatcher::starts_with(window, MESSAGE_SENTINEL, false);
        if message_start {
            let deleted = self
                .live_offsets
                .as_ref()
                .is_some_and(|live| !live.contains(&position));
            self.zone = Zone {
                header: true,
                filename: false,
                deleted,
            };
        } else if self.zone.header && RuleMatcher::starts_with(window, HEADER_END, false) {
            self.zone.header = false;
        }

        if self.line_start && !self.zone.header {
            // Only a folded line continues the region; a blank line ends it
            if !matches!(byte, b' ' | b'\t') {
                self.zone.filename = false;
            }
            if FILENAME_TRIGGERS
                .iter()
                .any(|t| RuleMatcher::starts_with(window, t, true))
            {
                self.zone.filename = true;
            }
        }

        // The LF of a CRLF pair belongs to the line it ends
        self.line_start = match byte {
            b'\n' => true,
            b'\r' => window.peek(1) != Some(b'\n'),
            _ => false,
        };
        message_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FieldWindow;

    fn classify(data: &[u8], live: Option<HashSet<u64>>) -> Vec<(Zone, bool)> {
        let mut original = data.to_vec();
        let mut working = data.to_vec();
        let mut window = FieldWindow::new(&mut original, &mut working);
        let mut classifier = AreaClassifier::new(live);
        (0..data.len())
            .map(|pos| {
                window.seek(pos);
                let start = classifier.step(&window, pos as u64);
                (classifier.zone(), start)
            })
            .collect()
    }

    const MESSAGE: &[u8] = b"From ???@??? x\r\nSubject: a\r\n\r\nbody\r\n";

    #[test]
    fn test_header_then_body() {
        let zones = classify(MESSAGE, None);
        assert!(zones[0].1);
        assert!(zones[0].0.header);
        let blank = MESSAGE.windows(4).position(|w| w == HEADER_END).unwrap();
        assert!(zones[blank - 1].0.header);
        // Body starts at the first CR of the blank line
        assert!(!zones[blank].0.header);
        assert!(!zones[MESSAGE.len() - 1].0.header);
        assert_eq!(zones.iter().filter(|(_, start)| *start).count(), 1);
    }

    #[test]
    fn test_sentinel_needs_line_start() {
        let data = b"xFrom ???@??? \r\nFrom ???@???";
        let zones = classify(data, None);
        assert!(!zones[1].1);
        assert!(zones[16].1);
    }

    #[test]
    fn test_deleted_messages() {
        let mut data = MESSAGE.to_vec();
        let second = data.len() as u64;
        data.extend_from_slice(MESSAGE);

        let live: HashSet<u64> = [0].into_iter().collect();
        let zones = classify(&data, Some(live));
        assert!(!zones[0].0.deleted);
        assert!(zones[second as usize].0.deleted);
        assert!(zones[data.len() - 1].0.deleted);

        // Without an index nothing counts as deleted
        let zones = classify(&data, None);
        assert!(zones.iter().all(|(z, _)| !z.deleted));
    }

    #[test]
    fn test_filename_region() {
        let data = b"From ???@???\r\n\r\nhi\r\nContent-Type: image/png;\r\n\tname=\"a.png\"\r\nnext\r\n";
        let zones = classify(data, None);
        let text = String::from_utf8_lossy(data);
        let at = |needle: &str| text.find(needle).unwrap();
        assert!(!zones[at("hi")].0.filename);
        assert!(zones[at("Content-Type")].0.filename);
        assert!(zones[at("a.png")].0.filename);
        assert!(!zones[at("next")].0.filename);
    }

    #[test]
    fn test_blank_line_ends_filename_region() {
        let data = b"From ???@???\r\n\r\nhi\r\nContent-Disposition: attachment;\r\n\tfilename=\"a.txt\"\r\n\r\n  indented body text\r\n";
        let zones = classify(data, None);
        let text = String::from_utf8_lossy(data);
        let at = |needle: &str| text.find(needle).unwrap();
        assert!(zones[at("filename=")].0.filename);
        let blank = at("\"\r\n\r\n") + 3;
        assert!(!zones[blank].0.filename);
        assert!(!zones[at("indented")].0.filename);
        assert!(!zones[at("  indented")].0.filename);
    }

    #[test]
    fn test_lone_cr_and_lf_end_lines() {
        let data = b"From ???@???\r\n\r\nx\rFrom ???@??? a\nFrom ???@??? b";
        let zones = classify(data, None);
        assert_eq!(zones.iter().filter(|(_, start)| *start).count(), 3);
    }

    #[test]
    fn test_filename_trigger_ignored_in_headers() {
        let data = b"From ???@???\r\nContent-Type: text/plain\r\n\r\n";
        let zones = classify(data, None);
        assert!(zones.iter().all(|(z, _)| !z.filename));
    }
}
