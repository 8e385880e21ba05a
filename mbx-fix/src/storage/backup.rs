//! Backup copies made before a run
//!
//! Copies are read through the handle that already holds the lock. Opening
//! and closing the file a second time would drop a classic POSIX lock.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;

/// Files copied aside before a run
#[derive(Debug, Clone, Default)]
pub struct Backup {
    copies: Vec<PathBuf>,
}

impl Backup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the whole of `source`, opened from `path`, to `<path>.bak`
    ///
    /// The position of `source` is left at the start of the file.
    pub fn save<R: Read + Seek>(&mut self, path: &Path, source: &mut R) -> Result<()> {
        let copy = backup_path(path);
        source.seek(SeekFrom::Start(0))?;
        let mut out = File::create(&copy)?;
        let bytes = std::io::copy(source, &mut out)?;
        out.sync_all()?;
        source.seek(SeekFrom::Start(0))?;
        info!("Backed up {} ({} bytes) to {}", path.display(), bytes, copy.display());
        self.copies.push(copy);
        Ok(())
    }

    pub fn copies(&self) -> &[PathBuf] {
        &self.copies
    }

    /// Delete the copies, e.g. when the run changed nothing
    pub fn discard(self) {
        for copy in &self.copies {
            match std::fs::remove_file(copy) {
                Ok(()) => info!("Removed unneeded backup {}", copy.display()),
                Err(e) => warn!("Cannot remove backup {}: {}", copy.display(), e),
            }
        }
    }
}

/// `In.mbx` becomes `In.mbx.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}
