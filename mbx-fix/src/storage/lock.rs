//! Whole-file advisory locks
//!
//! On Linux these are open file description locks, which conflict even
//! between two opens of the same file in one process. Other Unix systems
//! fall back to classic POSIX record locks. The lock is released when the
//! [`LockedFile`] is dropped.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use tracing::debug;

use crate::error::{FixError, Result};

/// Attempts made before giving up on a held lock
const LOCK_TRIES: u8 = 3;
const LOCK_WAIT: Duration = Duration::from_millis(100);

// F_OFD_SETLK
#[cfg(any(target_os = "linux", target_os = "android"))]
const F_SETLK: libc::c_int = 37;
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
const F_SETLK: libc::c_int = libc::F_SETLK;

/// A file held under an exclusive advisory lock
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    /// Take an exclusive lock on all of `file`, retrying briefly if it is held
    pub fn lock(file: File, path: &Path) -> Result<Self> {
        let mut last = None;
        for attempt in 0..LOCK_TRIES {
            if attempt > 0 {
                sleep(LOCK_WAIT);
            }
            match set_lock(&file, true) {
                Ok(()) => {
                    debug!("Locked {}", path.display());
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) => last = Some(e),
            }
        }
        Err(FixError::Lock {
            path: path.to_path_buf(),
            reason: last.map_or_else(|| "unknown error".to_string(), |e| e.to_string()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let released = set_lock(&self.file, false);
        debug!("Unlocked {}: {:?}", self.path.display(), released);
    }
}

#[cfg(unix)]
fn set_lock(file: &File, exclusive: bool) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: flock is a plain C struct for which all zero bytes is valid
    let mut flock: libc::flock = unsafe { std::mem::zeroed() };
    let lock_type = if exclusive { libc::F_WRLCK } else { libc::F_UNLCK };
    flock.l_type = lock_type as libc::c_short;
    flock.l_whence = libc::SEEK_SET as libc::c_short;
    // l_start and l_len of 0 cover the whole file however large it grows;
    // l_pid must be 0 for open file description locks

    // SAFETY: the descriptor is open for the lifetime of `file`
    let ret = unsafe { libc::fcntl(file.as_raw_fd(), F_SETLK, &mut flock) };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn set_lock(_file: &File, _exclusive: bool) -> std::io::Result<()> {
    debug!("Advisory locks are not supported on this platform");
    Ok(())
}

impl Read for LockedFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for LockedFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LockedFile {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn open(path: &Path) -> File {
        OpenOptions::new().read(true).write(true).open(path).unwrap()
    }

    #[test]
    fn test_lock_and_io() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("In.mbx");
        std::fs::write(&path, b"hello").unwrap();

        let mut locked = LockedFile::lock(open(&path), &path).unwrap();
        assert_eq!(locked.path(), path.as_path());
        locked.seek(SeekFrom::Start(0)).unwrap();
        locked.write_all(b"J").unwrap();
        drop(locked);
        assert_eq!(std::fs::read(&path).unwrap(), b"Jello");
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn test_second_lock_refused_until_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("In.toc");
        std::fs::write(&path, b"x").unwrap();

        let first = LockedFile::lock(open(&path), &path).unwrap();
        let err = LockedFile::lock(open(&path), &path).unwrap_err();
        assert!(matches!(err, FixError::Lock { .. }));

        drop(first);
        assert!(LockedFile::lock(open(&path), &path).is_ok());
    }
}
