//! File-level helpers around a run
//!
//! - [`lock`]: advisory whole-file locks
//! - [`timestamp`]: modification-time refresh
//! - [`backup`]: backup copies

pub mod backup;
pub mod lock;
pub mod timestamp;

pub use backup::{backup_path, Backup};
pub use lock::LockedFile;
pub use timestamp::refresh_timestamp;
