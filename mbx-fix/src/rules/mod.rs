//! Translation rules
//!
//! Parsed once from the rule file, then consulted at every scan position.

pub mod matcher;
pub mod parser;
pub mod types;

pub use matcher::{Capture, Match, RuleMatcher};
pub use parser::{load_rules, parse_rules, RuleFile};
pub use types::*;
