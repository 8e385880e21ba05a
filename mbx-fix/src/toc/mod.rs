//! Eudora table-of-contents (`.toc`) files

pub mod file;
pub mod types;

pub use file::TocFile;
pub use types::{TocField, TocHeader, TocRecord, HEADER_SIZE, RECORD_SIZE};
