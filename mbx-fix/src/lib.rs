//! mbx-fix: In-place repair of Eudora mailboxes
//!
//! Applies a table of byte-level search/replace rules to a Eudora mailbox
//! (`.mbx`) and to the text fields of its table of contents (`.toc`)
//! without changing the size of either file, so every message offset in the
//! index stays valid.
//!
//! # Features
//!
//! - Literal, negated, repeated and whitespace search terms
//! - Rules confined to headers, body, or one HTML tag, optionally case-blind
//! - Match flags that let one rule enable or disable others within a message
//! - Matches that straddle disk reads, via a two-block sliding buffer
//! - Shorter replacements zero-padded in the mailbox, left-compacted in the index
//! - Advisory locks, a mail-client check, optional backups
//!
//! # Example Rule File
//!
//! ```text
//! <skip deleted>
//! E28093 = "-"                  ; en dash
//! E2808B = ""                   ; zero-width space
//! !0D 0A !0D = * 0D *           ; isolated linefeed becomes a carriage return
//! <body> <ignorecase> <html meta> "charset=utf-8" = <blanks>
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [scan]
//! block_size = 4096
//! skip = ["filenames"]
//!
//! [client]
//! process_name = "Eudora.exe"
//! protected_mailboxes = ["In", "Out", "Trash"]
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```
//!
//! # Modules
//!
//! - [`rules`]: rule table, rule-file parser, matcher
//! - [`buffer`]: dual sliding buffer and fixed-field windows
//! - [`scan`]: area classifier, replacer, mailbox and index passes
//! - [`toc`]: index file layout
//! - [`storage`]: locks, timestamps, backups
//! - [`fixer`]: one complete run

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod fixer;
pub mod report;
pub mod rules;
pub mod scan;
pub mod storage;
pub mod toc;

// Re-export commonly used types
pub use config::Config;
pub use error::{FixError, Result};
pub use fixer::{FixOutcome, MailboxFixer, MailboxPaths, RunOptions};
pub use report::ScanReport;
