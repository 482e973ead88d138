mod help_text;

use crate::baseline::DEFAULT_BASELINE_FILENAME;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Watch a directory tree for added, removed and modified files
#[derive(Parser, Debug)]
#[command(
    name = "treesentry",
    version,
    about,
    long_about = help_text::ROOT_LONG_ABOUT
)]
pub struct Cli {
    /// Directory to watch
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Seconds to wait between scans
    #[arg(short, long, value_name = "SECONDS", default_value_t = 10)]
    pub interval: u64,

    /// Hash algorithm: sha224, sha256, sha384 or sha512
    #[arg(long = "hash", value_name = "ALGORITHM", default_value = "sha256")]
    pub hash: String,

    /// Record a fresh baseline and exit without monitoring
    #[arg(long)]
    pub init: bool,

    /// Where the baseline is stored
    #[arg(long, value_name = "FILE", default_value = DEFAULT_BASELINE_FILENAME)]
    pub baseline: PathBuf,

    /// Compare every cycle against the baseline present at startup instead of
    /// against the previous cycle
    #[arg(long, conflicts_with = "init")]
    pub fixed_baseline: bool,

    /// Stop after this many cycles
    #[arg(
        long,
        value_name = "N",
        conflicts_with = "init",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cycles: Option<u64>,

    /// Abort after this many consecutive failed baseline saves
    #[arg(
        long,
        value_name = "N",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_save_failures: u32,

    /// Show old and new digests for changed files
    #[arg(long)]
    pub diff: bool,

    /// Also list unchanged files and skipped entries
    #[arg(long)]
    pub all: bool,

    /// Increase log verbosity (-v info, -vv debug). Takes precedence over RUST_LOG.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "log_level")]
    pub verbose: u8,

    /// Set the log level explicitly. Takes precedence over RUST_LOG.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
