//! Run report
//!
//! Plain data that serializes to JSON, with a human-readable `Display`.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::rules::RuleTable;
use crate::scan::{IndexStats, MailboxStats};

/// How often one rule matched
#[derive(Debug, Clone, Serialize)]
pub struct RuleUsage {
    pub rule: String,
    pub comment: Option<String>,
    pub used: u64,
}

/// Outcome of one run against a mailbox pair
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub mailbox: PathBuf,
    /// Index file, when one was present
    pub index: Option<PathBuf>,
    pub mailbox_pass: MailboxStats,
    pub index_pass: Option<IndexStats>,
    /// Every rule in table order
    pub rules: Vec<RuleUsage>,
    /// Rule applications that changed bytes, over both passes
    pub total_changes: u64,
    /// Consistency problems found along the way
    pub warnings: Vec<String>,
    /// The index must be touched so the mail client keeps it
    pub refresh_index_timestamp: bool,
    pub backups: Vec<PathBuf>,
}

impl ScanReport {
    pub fn new(
        mailbox: PathBuf,
        index: Option<PathBuf>,
        mailbox_pass: MailboxStats,
        index_pass: Option<IndexStats>,
        rules: &RuleTable,
    ) -> Self {
        let total_changes =
            mailbox_pass.changes + index_pass.as_ref().map_or(0, |stats| stats.changes);
        let refresh_index_timestamp = total_changes > 0 && index.is_some();
        Self {
            mailbox,
            index,
            mailbox_pass,
            index_pass,
            rules: rules
                .usage()
                .map(|(rule, used)| RuleUsage {
                    rule: rule.label().to_string(),
                    comment: rule.comment.clone(),
                    used,
                })
                .collect(),
            total_changes,
            warnings: Vec::new(),
            refresh_index_timestamp,
            backups: Vec::new(),
        }
    }

    /// Whether any byte of either file changed
    pub fn changed(&self) -> bool {
        self.total_changes > 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mbx = &self.mailbox_pass;
        writeln!(f, "Mailbox {}", self.mailbox.display())?;
        if !mbx.full_scan() {
            writeln!(f, "  scanned from offset {} of {}", mbx.start, mbx.size)?;
        }
        writeln!(
            f,
            "  {} messages, {} changed, {} deleted",
            mbx.messages, mbx.messages_changed, mbx.deleted_messages
        )?;

        if let Some(index) = &self.index_pass {
            writeln!(
                f,
                "  index: {} records, {} changed ({} sender/recipient, {} subject)",
                index.records,
                index.records_changed,
                index.sender_recipient_changes,
                index.subject_changes
            )?;
        }

        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }

        if !self.changed() {
            return writeln!(f, "No changes were made");
        }

        writeln!(f, "{} changes were made", self.total_changes)?;
        for usage in self.rules.iter().filter(|u| u.used > 0) {
            write!(f, "{:>8}  {}", usage.used, usage.rule)?;
            if let Some(comment) = &usage.comment {
                write!(f, "  ; {}", comment)?;
            }
            writeln!(f)?;
        }

        writeln!(
            f,
            "Areas changed in the {} byte mailbox:",
            mbx.coverage.size()
        )?;
        writeln!(f, "{}", mbx.coverage.render())?;
        if let Some(index) = self.index_pass.as_ref().filter(|i| i.changes > 0) {
            writeln!(f, "Areas changed in the index:")?;
            writeln!(f, "{}", index.coverage.render())?;
        }
        Ok(())
    }
}
