//! Scan driver
//!
//! Two passes share the same machinery: the mailbox pass walks the mailbox
//! byte by byte through a [`crate::buffer::DualBuffer`], and the index pass
//! walks each text field of each index descriptor through a
//! [`crate::buffer::FieldWindow`]. At every position the [`ScanSession`]
//! tries all rules in table order.

pub mod classifier;
pub mod coverage;
pub mod index;
pub mod mailbox;
pub mod replacer;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use classifier::{AreaClassifier, Zone, MESSAGE_SENTINEL};
pub use coverage::{CoverageMap, DEFAULT_MAP_WIDTH};
pub use index::{scan_index, IndexStats};
pub use mailbox::{find_message_start, scan_mailbox, MailboxOptions, MailboxStats, DEFAULT_BLOCK_SIZE};
pub use replacer::{PadPolicy, Replacer};
pub use session::ScanSession;
