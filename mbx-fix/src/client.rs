//! Mail-client running check
//!
//! Rewriting a mailbox the client has open would be undone, or worse,
//! when the client next saves it.

use std::path::Path;

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{FixError, Result};

/// Refuses to touch protected mailboxes while the client process runs
#[derive(Debug, Clone)]
pub struct ClientCheck {
    process_name: String,
    protected: Vec<String>,
}

impl ClientCheck {
    pub fn new(process_name: impl Into<String>, protected: Vec<String>) -> Self {
        Self {
            process_name: process_name.into(),
            protected,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.process_name.clone(), config.protected_mailboxes.clone())
    }

    /// Whether `mailbox` (a base name or path) needs the check
    pub fn guards(&self, mailbox: &str) -> bool {
        if self.protected.is_empty() {
            return true;
        }
        let name = Path::new(mailbox)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| mailbox.to_string());
        self.protected.iter().any(|p| p.eq_ignore_ascii_case(&name))
    }

    /// Fail with [`FixError::ClientRunning`] if the client holds `mailbox`
    pub fn ensure_not_running(&self, mailbox: &str) -> Result<()> {
        if !self.guards(mailbox) {
            debug!("Mailbox {} is not protected; skipping client check", mailbox);
            return Ok(());
        }
        if self.is_running() {
            return Err(FixError::ClientRunning {
                process: self.process_name.clone(),
                mailbox: mailbox.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            running_in(Path::new("/proc"), &self.process_name)
        }
        #[cfg(not(target_os = "linux"))]
        {
            debug!("Cannot list processes on this platform; assuming {} is not running", self.process_name);
            false
        }
    }
}

/// Scan a procfs-style directory for a process named `name`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn running_in(proc_root: &Path, name: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(proc_root) else {
        debug!("Cannot read {}", proc_root.display());
        return false;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let dir = entry.path();

        // comm is cut to 15 bytes by the kernel
        if let Ok(comm) = std::fs::read_to_string(dir.join("comm")) {
            let comm = comm.trim_end();
            if comm.eq_ignore_ascii_case(name)
                || (comm.len() == 15 && starts_with_ignore_case(name, comm))
            {
                debug!("Found {} as process {:?}", name, file_name);
                return true;
            }
        }

        // Programs run under an emulator show up by their command line
        if let Ok(cmdline) = std::fs::read(dir.join("cmdline")) {
            let found = cmdline
                .split(|b| *b == 0)
                .filter(|arg| !arg.is_empty())
                .take(2)
                .any(|arg| {
                    let arg = String::from_utf8_lossy(arg);
                    let base = arg.rsplit(['/', '\\']).next().unwrap_or(&arg);
                    base.eq_ignore_ascii_case(name)
                });
            if found {
                debug!("Found {} in the command line of process {:?}", name, file_name);
                return true;
            }
        }
    }
    false
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_proc(processes: &[(&str, &str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (pid, comm, cmdline) in processes {
            let dir = temp_dir.path().join(pid);
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("comm"), format!("{}\n", comm)).unwrap();
            std::fs::write(dir.join("cmdline"), cmdline.as_bytes()).unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("self")).unwrap();
        temp_dir
    }

    #[test]
    fn test_finds_process_by_comm() {
        let proc_root = fake_proc(&[("1", "init", "/sbin/init\0"), ("42", "EUDORA.EXE", "")]);
        assert!(running_in(proc_root.path(), "Eudora.exe"));
        assert!(!running_in(proc_root.path(), "Thunderbird"));
    }

    #[test]
    fn test_finds_process_by_cmdline() {
        let proc_root = fake_proc(&[(
            "77",
            "wine64-preload",
            "/usr/bin/wine64-preloader\0C:\\Program Files\\Eudora\\Eudora.exe\0",
        )]);
        assert!(running_in(proc_root.path(), "eudora.exe"));
    }

    #[test]
    fn test_truncated_comm() {
        let proc_root = fake_proc(&[("9", "VeryLongProgram", "")]);
        assert!(running_in(proc_root.path(), "VeryLongProgramName"));
    }

    #[test]
    fn test_missing_proc_root() {
        assert!(!running_in(Path::new("/nonexistent/proc"), "Eudora.exe"));
    }

    #[test]
    fn test_protected_mailboxes() {
        let check = ClientCheck::new("Eudora.exe", vec!["In".to_string(), "Out".to_string()]);
        assert!(check.guards("in"));
        assert!(check.guards("/home/me/Eudora/In"));
        assert!(!check.guards("Archive"));
        // Unprotected mailboxes pass whatever is running
        assert!(check.ensure_not_running("Archive").is_ok());

        let all = ClientCheck::new("Eudora.exe", Vec::new());
        assert!(all.guards("Archive"));
    }
}
