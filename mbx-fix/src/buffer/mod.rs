//! Buffered byte windows the scanner reads and rewrites
//!
//! - [`window`]: dual sliding buffer over a whole file
//! - [`field`]: two-copy view over a fixed-width index field

pub mod field;
pub mod window;

pub use field::FieldWindow;
pub use window::{DualBuffer, Window, MIN_BLOCK_SIZE};
