//! Configuration for mbx-fix
//!
//! Every section and key is optional; missing values take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::buffer::MIN_BLOCK_SIZE;
use crate::error::{FixError, Result};
use crate::rules::SkipAreas;
use crate::scan::{MailboxOptions, DEFAULT_BLOCK_SIZE, DEFAULT_MAP_WIDTH};

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the files are scanned
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    /// Bytes per buffer block; a match spans at most one block plus one byte
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Only scan this many bytes at the end of the mailbox
    pub tail_bytes: Option<u64>,
    /// Areas never touched: headers, body, filenames, deleted
    #[serde(default)]
    pub skip: Vec<String>,
    /// Also rewrite the index descriptors
    #[serde(default = "default_true")]
    pub index_pass: bool,
}

/// Report layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Cells in the map of changed areas
    #[serde(default = "default_map_width")]
    pub map_width: usize,
}

/// Mail-client check
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_process_name")]
    pub process_name: String,
    #[serde(default = "default_true")]
    pub check_running: bool,
    /// Mailboxes the check applies to; empty means all
    #[serde(default)]
    pub protected_mailboxes: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_map_width() -> usize {
    DEFAULT_MAP_WIDTH
}

fn default_process_name() -> String {
    "Eudora.exe".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            tail_bytes: None,
            skip: Vec::new(),
            index_pass: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            map_width: default_map_width(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            process_name: default_process_name(),
            check_running: true,
            protected_mailboxes: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FixError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| FixError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scan.block_size < MIN_BLOCK_SIZE {
            return Err(FixError::Config(format!(
                "scan.block_size must be at least {}, got {}",
                MIN_BLOCK_SIZE, self.scan.block_size
            )));
        }
        if self.scan.tail_bytes == Some(0) {
            return Err(FixError::Config("scan.tail_bytes must be positive".to_string()));
        }
        self.skip_areas()?;
        if self.report.map_width == 0 {
            return Err(FixError::Config("report.map_width must be at least 1".to_string()));
        }
        if self.client.process_name.trim().is_empty() {
            return Err(FixError::Config("client.process_name is empty".to_string()));
        }
        Ok(())
    }

    /// Areas named in `scan.skip`
    pub fn skip_areas(&self) -> Result<SkipAreas> {
        let mut skip = SkipAreas::default();
        for area in &self.scan.skip {
            skip.enable(area)
                .map_err(|e| FixError::Config(format!("scan.skip: {}", e)))?;
        }
        Ok(skip)
    }

    /// Mailbox pass settings, with `rule_skip` from the rule file added
    pub fn mailbox_options(&self, rule_skip: SkipAreas) -> Result<MailboxOptions> {
        Ok(MailboxOptions {
            block_size: self.scan.block_size,
            tail_bytes: self.scan.tail_bytes,
            skip: self.skip_areas()?.merge(rule_skip),
            map_width: self.report.map_width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scan.block_size, 4096);
        assert_eq!(config.report.map_width, 72);
        assert_eq!(config.client.process_name, "Eudora.exe");
        assert!(config.scan.index_pass);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[scan]
block_size = 8192
tail_bytes = 1000000
skip = ["deleted", "filenames"]

[client]
protected_mailboxes = ["In", "Out"]

[logging]
format = "json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.scan.block_size, 8192);
        assert_eq!(config.scan.tail_bytes, Some(1_000_000));
        assert!(config.scan.index_pass);
        assert_eq!(config.client.protected_mailboxes.len(), 2);
        assert!(config.client.check_running);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");

        let skip = config.skip_areas().unwrap();
        assert!(skip.deleted && skip.filenames && !skip.headers);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.report.map_width, 72);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scan.block_size = 64;
        assert!(matches!(config.validate(), Err(FixError::Config(_))));

        let mut config = Config::default();
        config.scan.skip = vec!["signatures".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.report.map_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mailbox_options_merge_skip() {
        let mut config = Config::default();
        config.scan.skip = vec!["headers".to_string()];
        let mut from_rules = SkipAreas::default();
        from_rules.deleted = true;

        let options = config.mailbox_options(from_rules).unwrap();
        assert!(options.skip.headers);
        assert!(options.skip.deleted);
        assert_eq!(options.block_size, 4096);
    }
}
