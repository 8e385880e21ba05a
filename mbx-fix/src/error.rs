//! Error types for mbx-fix

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mailbox fixing operations
pub type Result<T> = std::result::Result<T, FixError>;

#[derive(Error, Debug)]
pub enum FixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A line of the rule file could not be turned into a rule
    #[error("Rule error on line {line}: {reason}: {text}")]
    Rule {
        line: usize,
        text: String,
        reason: String,
    },

    #[error("Cannot lock {}: {reason}", path.display())]
    Lock { path: PathBuf, reason: String },

    #[error("{process} is running; stop it before changing mailbox {mailbox}")]
    ClientRunning { process: String, mailbox: String },

    /// A replacement would write more bytes than its match consumed at this position
    #[error("Replacement for rule `{rule}` needs {output} bytes but only {matched} were matched")]
    ReplacementOverrun {
        rule: String,
        matched: usize,
        output: usize,
    },

    #[error("Invalid table of contents: {0}")]
    InvalidIndex(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A fatal error raised after some bytes of `path` were already written
    #[error("{source} (changes to {} may be incomplete)", path.display())]
    PartialWrite {
        path: PathBuf,
        #[source]
        source: Box<FixError>,
    },
}

impl FixError {
    /// Build a rule error for the given 1-based line of the rule file
    pub fn rule(line: usize, text: &str, reason: impl Into<String>) -> Self {
        FixError::Rule {
            line,
            text: text.trim_end().to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the failing operation may have left a file partially rewritten
    pub fn wrote_to_disk(&self) -> bool {
        matches!(self, FixError::PartialWrite { .. })
    }

    /// Wrap `self` as a partial write of `path` when `wrote` is set
    pub fn after_writes(self, path: impl Into<PathBuf>, wrote: bool) -> Self {
        if wrote && !self.wrote_to_disk() {
            FixError::PartialWrite {
                path: path.into(),
                source: Box::new(self),
            }
        } else {
            self
        }
    }
}
