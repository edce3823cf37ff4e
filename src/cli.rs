mod help_text;

use crate::digest::DigestAlgorithm;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Largest `--buffer-size-mb`: 4 GiB, or whatever a single allocation can hold
/// on targets with a narrower `usize`.
const MAX_BUFFER_SIZE_MB: i64 = {
    let addressable = (isize::MAX as i64) >> 20;
    if addressable < 4096 { addressable } else { 4096 }
};

/// Checksum a tree of files into a manifest, or verify a tree against one
#[derive(Parser, Debug)]
#[command(
    name = "treesum",
    version,
    about,
    long_about = help_text::ROOT_LONG_ABOUT,
    after_long_help = help_text::ROOT_AFTER_LONG_HELP
)]
pub struct Cli {
    /// Scan the tree and write a manifest
    #[arg(short = 's', long)]
    pub scan: bool,

    /// Verify the tree against an existing manifest and write VERIFY_<FILE>
    #[arg(short = 'v', long)]
    pub verify: bool,

    /// Root of the tree [default: current directory]
    #[arg(short = 'p', long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Manifest file to write (scan) or read (verify)
    #[arg(short = 'f', long, value_name = "FILE", default_value = "checksum.txt")]
    pub file: PathBuf,

    /// Checksum algorithm; scan and verify must use the same one
    #[arg(short = 'a', long, value_enum, default_value_t = DigestAlgorithm::Crc32c)]
    pub algorithm: DigestAlgorithm,

    /// Read buffer size in MiB
    #[arg(
        long,
        value_name = "MIB",
        default_value_t = 32,
        value_parser = clap::value_parser!(u32).range(1..=MAX_BUFFER_SIZE_MB)
    )]
    pub buffer_size_mb: u32,

    /// Change to DIRECTORY before doing anything
    #[arg(short = 'C', value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Increase log verbosity (once for info, twice for debug)
    ///
    /// Takes precedence over RUST_LOG.
    #[arg(long, action = ArgAction::Count, conflicts_with = "log_level")]
    pub verbose: u8,

    /// Set the log level
    ///
    /// Takes precedence over RUST_LOG.
    #[arg(long, value_name = "LEVEL", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Never colour the [OK]/[DIFF]/[NONE] annotations
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Scan,
    Verify,
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

    /// The selected operation, or `None` unless exactly one mode flag was given.
    pub fn mode(&self) -> Option<Mode> {
        match (self.scan, self.verify) {
            (true, false) => Some(Mode::Scan),
            (false, true) => Some(Mode::Verify),
            _ => None,
        }
    }

    pub fn buffer_size(&self) -> usize {
        // Bounded by MAX_BUFFER_SIZE_MB, so this fits in a usize.
        self.buffer_size_mb as usize * 1024 * 1024
    }
}
