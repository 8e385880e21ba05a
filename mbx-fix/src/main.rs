//! mbx-fix command line
//!
//! ```bash
//! # Fix In.mbx and In.toc with ./translations.txt
//! mbx-fix In
//!
//! # Only the last megabyte, keeping backups, JSON report
//! mbx-fix --tail 1048576 --backup --json Eudora/In.mbx
//! ```
//!
//! Exit status: 0 no changes, 1 changes made, 8 failed before writing,
//! 9 failed after writing (the mailbox may be partly rewritten).

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use mbx_fix::config::LogFormat;
use mbx_fix::rules::load_rules;
use mbx_fix::{Config, FixError, MailboxFixer, MailboxPaths, RunOptions};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_UNCHANGED: i32 = 0;
const EXIT_CHANGED: i32 = 1;
const EXIT_FAILED: i32 = 8;
const EXIT_PARTIAL: i32 = 9;

const DEFAULT_CONFIG: &str = "mbx-fix.toml";

#[derive(Parser)]
#[command(name = "mbx-fix")]
#[command(version, about = "Repair Eudora mailboxes in place without changing their size", long_about = None)]
struct Cli {
    /// Mailbox base name; a trailing .mbx is ignored
    mailbox: String,

    /// Translation rule file
    #[arg(short, long, default_value = "translations.txt")]
    rules: PathBuf,

    /// Configuration file (default: mbx-fix.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only scan this many bytes at the end of the mailbox
    #[arg(long, value_name = "BYTES")]
    tail: Option<u64>,

    /// Area to leave alone: headers, body, filenames, deleted
    #[arg(long, value_name = "AREA")]
    skip: Vec<String>,

    /// Leave the index file alone
    #[arg(long)]
    no_index: bool,

    /// Copy both files to .bak before changing them
    #[arg(long)]
    backup: bool,

    /// Do not check whether the mail client is running
    #[arg(long)]
    force: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(true) => EXIT_CHANGED,
        Ok(false) => EXIT_UNCHANGED,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            let partial = e
                .downcast_ref::<FixError>()
                .is_some_and(FixError::wrote_to_disk);
            if partial {
                eprintln!("Changes may be incomplete; restore from a backup if needed");
                EXIT_PARTIAL
            } else {
                EXIT_FAILED
            }
        }
    };
    std::process::exit(code);
}

/// Returns whether anything changed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(tail) = cli.tail {
        config.scan.tail_bytes = Some(tail);
    }
    config.scan.skip.extend(cli.skip.iter().cloned());
    if cli.no_index {
        config.scan.index_pass = false;
    }

    init_logging(&config, cli.verbose);
    info!("Starting mbx-fix v{}", env!("CARGO_PKG_VERSION"));

    let rules = load_rules(&cli.rules)
        .with_context(|| format!("loading rules from {}", cli.rules.display()))?;
    let paths = MailboxPaths::from_arg(&cli.mailbox);
    info!("Processing mailbox {}", paths.mailbox.display());

    let options = RunOptions {
        backup: cli.backup,
        force: cli.force,
    };
    let mut outcome = MailboxFixer::new(config, rules, options).run(&paths)?;
    outcome.finalize()?;

    if cli.json {
        println!("{}", outcome.report.to_json()?);
    } else {
        print!("{}", outcome.report);
    }
    Ok(outcome.report.changed())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("loading configuration from {}", DEFAULT_CONFIG))?,
        None => Config::default(),
    };
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mbx_fix={}", level)));
    let registry = tracing_subscriber::registry().with(filter);
    let writer = std::io::stderr;

    match config.logging.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(writer))
            .init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(writer))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
    }
}
