//! One run against a mailbox/index pair

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::client::ClientCheck;
use crate::config::Config;
use crate::error::Result;
use crate::report::ScanReport;
use crate::rules::RuleFile;
use crate::scan::{scan_index, scan_mailbox, ScanSession, MESSAGE_SENTINEL};
use crate::storage::{refresh_timestamp, Backup, LockedFile};
use crate::toc::TocFile;

/// The `.mbx` and `.toc` files of one mailbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxPaths {
    /// Path without extension, e.g. `Eudora/In`
    pub base: PathBuf,
    pub mailbox: PathBuf,
    pub index: PathBuf,
}

impl MailboxPaths {
    /// Paths for a mailbox given by base name, with or without `.mbx`
    pub fn from_arg(arg: &str) -> Self {
        let base = arg
            .strip_suffix(".mbx")
            .or_else(|| arg.strip_suffix(".MBX"))
            .filter(|b| !b.is_empty())
            .unwrap_or(arg);
        Self {
            base: PathBuf::from(base),
            mailbox: PathBuf::from(format!("{}.mbx", base)),
            index: PathBuf::from(format!("{}.toc", base)),
        }
    }

    /// Base name for messages and the client check
    pub fn name(&self) -> String {
        self.base.to_string_lossy().into_owned()
    }
}

/// Run-level switches that are not part of the configuration file
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Copy both files aside before scanning
    pub backup: bool,
    /// Skip the mail-client check
    pub force: bool,
}

/// Report plus what is left to do once the files are unlocked
#[derive(Debug)]
pub struct FixOutcome {
    pub report: ScanReport,
    pub backup: Option<Backup>,
}

impl FixOutcome {
    /// Refresh the index timestamp after a change; drop backups of an
    /// unchanged mailbox
    pub fn finalize(&mut self) -> Result<()> {
        if self.report.refresh_index_timestamp {
            if let Some(index) = &self.report.index {
                refresh_timestamp(index).map_err(|e| e.after_writes(index, true))?;
                info!("Updated the timestamp of {}", index.display());
            }
        }
        if !self.report.changed() {
            if let Some(backup) = self.backup.take() {
                backup.discard();
                self.report.backups.clear();
            }
        }
        Ok(())
    }
}

/// Drives a whole run: checks, locks, both passes, report
pub struct MailboxFixer {
    config: Config,
    rules: RuleFile,
    options: RunOptions,
}

impl MailboxFixer {
    pub fn new(config: Config, rules: RuleFile, options: RunOptions) -> Self {
        Self {
            config,
            rules,
            options,
        }
    }

    /// Rewrite the mailbox and its index in place
    ///
    /// Files are locked for the duration of the call. The returned outcome
    /// still needs [`FixOutcome::finalize`].
    pub fn run(self, paths: &MailboxPaths) -> Result<FixOutcome> {
        self.config.validate()?;

        if self.config.client.check_running && !self.options.force {
            ClientCheck::from_config(&self.config.client).ensure_not_running(&paths.name())?;
        }

        let mut mailbox = LockedFile::lock(open_rw(&paths.mailbox)?, &paths.mailbox)?;
        let mut index = if paths.index.exists() {
            Some(LockedFile::lock(open_rw(&paths.index)?, &paths.index)?)
        } else {
            None
        };

        let mut warnings = Vec::new();
        if index.is_none() {
            let message = format!(
                "no index file {}; index pass and deleted-message tracking are off",
                paths.index.display()
            );
            warn!("{}", message);
            warnings.push(message);
        }

        let backup = if self.options.backup {
            let mut backup = Backup::new();
            backup.save(&paths.mailbox, &mut mailbox)?;
            if let Some(index) = index.as_mut() {
                backup.save(&paths.index, index)?;
            }
            Some(backup)
        } else {
            None
        };

        let mut toc = index.map(TocFile::open).transpose()?;
        let mut live_offsets = None;
        if let Some(toc) = toc.as_mut() {
            let header = toc.header().message_count() as u64;
            if toc.records_on_disk() < header {
                let message = format!(
                    "index lists {} messages but holds only {} records",
                    header,
                    toc.records_on_disk()
                );
                warn!("{}", message);
                warnings.push(message);
            }
            let offsets = toc.offsets()?;
            live_offsets = Some(check_offsets(&mut mailbox, &offsets, &mut warnings)?);
        }

        let mailbox_options = self.config.mailbox_options(self.rules.skip)?;
        let mut session = ScanSession::new(self.rules.table);
        let mailbox_stats = scan_mailbox(
            &mut mailbox,
            &paths.mailbox,
            &mut session,
            &mailbox_options,
            live_offsets,
        )?;
        let mailbox_wrote = mailbox_stats.changes > 0;

        let index_stats = match toc.as_mut() {
            Some(toc) if self.config.scan.index_pass => Some(
                scan_index(toc, &paths.index, &mut session, self.config.report.map_width)
                    .map_err(|e| e.after_writes(&paths.mailbox, mailbox_wrote))?,
            ),
            _ => None,
        };

        if let Some(toc) = &toc {
            let listed = toc.header().message_count() as u64;
            if mailbox_stats.full_scan() && mailbox_stats.messages != listed {
                let message = format!(
                    "index lists {} messages but the mailbox has {}",
                    listed, mailbox_stats.messages
                );
                warn!("{}", message);
                warnings.push(message);
            }
        }

        // Unlock before the caller touches the files again
        let has_index = toc.is_some();
        drop(toc);
        drop(mailbox);

        let mut report = ScanReport::new(
            paths.mailbox.clone(),
            has_index.then(|| paths.index.clone()),
            mailbox_stats,
            index_stats,
            session.rules(),
        );
        report.warnings = warnings;
        report.backups = backup
            .as_ref()
            .map(|b| b.copies().to_vec())
            .unwrap_or_default();

        info!("Done: {} changes", report.total_changes);
        Ok(FixOutcome { report, backup })
    }
}

fn open_rw(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            error!("Cannot open {}: {}", path.display(), e);
            e.into()
        })
}

/// Check that every index offset points at a message start
///
/// Returns every in-range offset, for deleted-message tracking.
fn check_offsets<F: Read + Seek>(
    mailbox: &mut F,
    offsets: &[i32],
    warnings: &mut Vec<String>,
) -> Result<HashSet<u64>> {
    let size = mailbox.seek(SeekFrom::End(0))?;
    let mut live = HashSet::with_capacity(offsets.len());
    let mut sentinel = [0u8; MESSAGE_SENTINEL.len()];

    for (index, offset) in offsets.iter().enumerate() {
        let problem = match u64::try_from(*offset) {
            Err(_) => Some("is negative"),
            Ok(at) if at >= size => Some("is past the end of the mailbox"),
            Ok(at) => {
                live.insert(at);
                mailbox.seek(SeekFrom::Start(at))?;
                let ok = mailbox.read_exact(&mut sentinel).is_ok() && sentinel == MESSAGE_SENTINEL;
                (!ok).then_some("does not point at a message start")
            }
        };
        if let Some(problem) = problem {
            let message = format!("index record {} offset {} {}", index, offset, problem);
            warn!("{}", message);
            warnings.push(message);
        }
    }
    Ok(live)
}
