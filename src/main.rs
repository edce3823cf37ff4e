mod cli;
mod digest;
mod dir_list;
mod manifest;
mod report;
mod scan;
mod util;
mod verify;

use cli::{Cli, LogLevel, Mode};
use digest::DigestOptions;
use report::ConsoleObserver;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct TreesumExitCode;

impl TreesumExitCode {
    /// Exit code used when verification found DIFF or NONE records.
    fn verify_unclean() -> ExitCode {
        ExitCode::from(1)
    }

    /// Exit code used when neither or both mode flags were given.
    fn invalid_mode() -> ExitCode {
        ExitCode::from(2)
    }

    /// Exit code used for other errors (I/O errors, missing inputs, etc.).
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    // Change working directory if -C was specified
    if let Some(directory) = &cli.directory
        && let Err(e) = std::env::set_current_dir(directory)
    {
        error!(
            "Failed to change directory to {}: {}",
            directory.display(),
            e
        );
        return TreesumExitCode::any_error();
    }

    let Some(mode) = cli.mode() else {
        error!("Specify exactly one of --scan or --verify");
        return TreesumExitCode::invalid_mode();
    };

    let options = DigestOptions {
        algorithm: cli.algorithm,
        buffer_size: cli.buffer_size(),
    };
    let use_color = !cli.no_color && stdout().is_terminal();

    let result: anyhow::Result<ExitCode> = resolve_root(cli.path).and_then(|root| match mode {
        Mode::Scan => handle_scan(&root, &cli.file, &options, use_color),
        Mode::Verify => handle_verify(&root, &cli.file, &options, use_color),
    });

    match result {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            TreesumExitCode::any_error()
        }
    }
}

fn resolve_root(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

fn handle_scan(
    root: &Path,
    manifest: &Path,
    options: &DigestOptions,
    use_color: bool,
) -> anyhow::Result<ExitCode> {
    let mut observer = ConsoleObserver::stdout(use_color);
    let summary = scan::scan(root, manifest, options, &mut observer)?;

    if summary.skipped > 0 {
        info!(
            "Skipped {} files whose paths cannot be stored in a manifest",
            summary.skipped
        );
    }
    info!(
        "Scanned {} files in {}",
        summary.files,
        util::elapsed::format_elapsed(summary.elapsed)
    );

    Ok(ExitCode::SUCCESS)
}

fn handle_verify(
    root: &Path,
    manifest: &Path,
    options: &DigestOptions,
    use_color: bool,
) -> anyhow::Result<ExitCode> {
    let residual = verify::residual_manifest_name(manifest);

    let mut observer = ConsoleObserver::stdout(use_color);
    let summary = verify::verify(root, manifest, &residual, options, &mut observer)?;

    if summary.is_clean() {
        info!(
            "Verification successful: all {} files match",
            summary.processed
        );
        return Ok(ExitCode::SUCCESS);
    }

    error!(
        "Verification failed: {} changed, {} missing (see {})",
        summary.diff,
        summary.missing,
        residual.display()
    );
    Ok(TreesumExitCode::verify_unclean())
}

fn init_tracing(verbose: u8, log_level: Option<LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    // Explicit flags win over RUST_LOG.
    let filter = match (log_level, verbose) {
        (Some(level), _) => EnvFilter::new(level.as_filter()),
        (None, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
        (None, 1) => EnvFilter::new("info"),
        (None, _) => EnvFilter::new("debug"),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                Level::TRACE => writer.write_str("TRACE: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
