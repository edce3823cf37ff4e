//! Progress reporting for scan and verify.
//!
//! The operations only talk to a [`ProgressObserver`]; what gets printed (and
//! whether it is coloured) is decided here. A failed write (e.g. a closed
//! pipe) is returned to the operation, which aborts.

use crate::manifest::ManifestRecord;
use crate::util::elapsed::format_elapsed;
use crate::verify::Outcome;
use std::io::{self, Write};
use std::time::Duration;

/// Receives per-record progress from scan and verify.
pub trait ProgressObserver {
    /// A file was digested during a scan.
    fn on_scanned(&mut self, _record: &ManifestRecord) -> io::Result<()> {
        Ok(())
    }

    /// A manifest record was checked during verification.
    fn on_verified(&mut self, _record: &ManifestRecord, _outcome: &Outcome) -> io::Result<()> {
        Ok(())
    }

    /// The operation processed `count` records in `elapsed`.
    fn on_finished(&mut self, _count: usize, _elapsed: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// Discards all progress.
#[cfg(test)]
pub struct NullObserver;

#[cfg(test)]
impl ProgressObserver for NullObserver {}

/// Human-readable progress lines, one per record.
pub struct ConsoleObserver<W: Write> {
    out: W,
    use_color: bool,
}

impl ConsoleObserver<std::io::Stdout> {
    pub fn stdout(use_color: bool) -> Self {
        ConsoleObserver::new(std::io::stdout(), use_color)
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W, use_color: bool) -> Self {
        ConsoleObserver { out, use_color }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn annotation(&self, outcome: &Outcome) -> String {
        let (label, color) = match outcome {
            Outcome::Ok => ("[OK]", "\x1b[32m"),
            Outcome::Diff { .. } => ("[DIFF]", "\x1b[31m"),
            Outcome::None => ("[NONE]", "\x1b[33m"),
        };
        if self.use_color {
            format!("{color}{label}\x1b[0m")
        } else {
            label.to_string()
        }
    }
}

impl<W: Write> ProgressObserver for ConsoleObserver<W> {
    fn on_scanned(&mut self, record: &ManifestRecord) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} {}",
            record.relative_path(),
            record.digest(),
            record.size()
        )
    }

    fn on_verified(&mut self, record: &ManifestRecord, outcome: &Outcome) -> io::Result<()> {
        let annotation = self.annotation(outcome);
        match outcome {
            Outcome::Ok => writeln!(
                self.out,
                "{} {} {} {}",
                record.relative_path(),
                record.digest(),
                record.size(),
                annotation
            ),
            Outcome::Diff { current } => writeln!(
                self.out,
                "{} {} {} {}",
                current.relative_path(),
                current.digest(),
                current.size(),
                annotation
            ),
            Outcome::None => writeln!(self.out, "{} {}", record.relative_path(), annotation),
        }
    }

    fn on_finished(&mut self, count: usize, elapsed: Duration) -> io::Result<()> {
        writeln!(self.out, "===================================")?;
        writeln!(
            self.out,
            "Done {} files in {}.",
            count,
            format_elapsed(elapsed)
        )?;
        self.out.flush()
    }
}
