//! Modification-time refresh
//!
//! The mail client rebuilds an index whose modification time is older than
//! its mailbox's, discarding any edit made to it. Touching the index after a
//! run keeps it newer.

use std::fs::OpenOptions;
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::error::Result;

/// Set the modification time of `path` to now
pub fn refresh_timestamp(path: &Path) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    let now = SystemTime::now();
    file.set_modified(now)?;
    debug!("Refreshed modification time of {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_refresh_moves_mtime_forward() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("In.toc");
        std::fs::write(&path, b"toc").unwrap();

        let old = SystemTime::now() - Duration::from_secs(3600);
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(old).unwrap();
        drop(file);

        refresh_timestamp(&path).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified > old + Duration::from_secs(1800));
        assert_eq!(std::fs::read(&path).unwrap(), b"toc");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(refresh_timestamp(&temp_dir.path().join("none.toc")).is_err());
    }
}
