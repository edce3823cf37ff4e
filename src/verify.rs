use crate::digest::{DigestError, DigestOptions, Digester};
use crate::dir_list::resolve_manifest_path;
use crate::manifest::{
    Manifest, ManifestBuilder, ManifestError, ManifestKind, ManifestRecord, write_manifest,
};
use crate::report::ProgressObserver;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Prefix of the residual manifest's file name.
pub const RESIDUAL_PREFIX: &str = "VERIFY_";

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Directory {0} does not exist")]
    RootNotFound(PathBuf),
    #[error("Manifest {0} does not exist")]
    ManifestNotFound(PathBuf),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Failed to report progress: {0}")]
    Progress(std::io::Error),
    #[error("Checksum error for {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: DigestError,
    },
}

/// Result of checking one manifest record against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Digest and size both match.
    Ok,
    /// The file exists but its digest and/or size changed. `current` holds the
    /// recomputed values.
    Diff { current: ManifestRecord },
    /// No regular file at the recorded path.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifySummary {
    /// Every record read from the manifest, whatever its outcome.
    pub processed: usize,
    pub ok: usize,
    pub diff: usize,
    pub missing: usize,
    /// Time spent checking records (excludes parsing and writing).
    pub elapsed: Duration,
}

impl VerifySummary {
    /// True when every record was OK.
    pub fn is_clean(&self) -> bool {
        self.diff == 0 && self.missing == 0
    }
}

/// Name of the residual manifest for a given input manifest: `VERIFY_` followed
/// by the input's file name. The result has no directory component.
pub fn residual_manifest_name(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    PathBuf::from(format!("{RESIDUAL_PREFIX}{file_name}"))
}

/// Re-checksum the files listed in the manifest `input` and write the records
/// needing attention to `output`.
///
/// # Behavior
///
/// - `root` must be an existing directory (`RootNotFound`) and `input` an
///   existing file (`ManifestNotFound`); otherwise nothing is written.
/// - The whole manifest is parsed first. A malformed record line aborts the
///   operation with `Manifest(MalformedRecord { .. })` before any file is read
///   and without writing output.
/// - Each record is classified as `Ok`, `Diff` or `None` in manifest order.
/// - The residual manifest contains one `path|digest|size` line per `Diff`
///   (with the *current* digest and size) and one bare `path` line per `None`,
///   in manifest order. `Ok` records are left out. The footer counts every
///   processed record.
///
/// # Errors
///
/// A file that exists but cannot be checksummed aborts the whole run without
/// writing output.
pub fn verify(
    root: &Path,
    input: &Path,
    output: &Path,
    options: &DigestOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<VerifySummary, VerifyError> {
    if !root.is_dir() {
        return Err(VerifyError::RootNotFound(root.to_path_buf()));
    }
    if !input.is_file() {
        return Err(VerifyError::ManifestNotFound(input.to_path_buf()));
    }

    let manifest = Manifest::load(input)?;

    info!(
        "Verifying {} records from {} against {}",
        manifest.records.len(),
        input.display(),
        root.display()
    );
    warn_on_algorithm_mismatch(&manifest, options);

    let start = Instant::now();

    let mut digester = Digester::from_options(options);
    let mut builder = ManifestBuilder::new(ManifestKind::Verification, root, options.algorithm);
    let mut summary = VerifySummary {
        processed: 0,
        ok: 0,
        diff: 0,
        missing: 0,
        elapsed: Duration::ZERO,
    };

    for record in &manifest.records {
        let outcome = check_record(&mut digester, root, record)?;
        observer
            .on_verified(record, &outcome)
            .map_err(VerifyError::Progress)?;

        match &outcome {
            Outcome::Ok => summary.ok += 1,
            Outcome::Diff { current } => {
                builder.push_record(current);
                summary.diff += 1;
            }
            Outcome::None => {
                builder.push_missing(record.relative_path());
                summary.missing += 1;
            }
        }
        summary.processed += 1;
    }

    summary.elapsed = start.elapsed();

    write_manifest(output, &builder.finish(summary.processed, summary.elapsed))?;

    observer
        .on_finished(summary.processed, summary.elapsed)
        .map_err(VerifyError::Progress)?;
    info!(
        "{} OK, {} DIFF, {} NONE; residual written to {}",
        summary.ok,
        summary.diff,
        summary.missing,
        output.display()
    );

    Ok(summary)
}

fn check_record(
    digester: &mut Digester,
    root: &Path,
    record: &ManifestRecord,
) -> Result<Outcome, VerifyError> {
    let path = resolve_manifest_path(root, record.relative_path());

    match std::fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return Ok(Outcome::None),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(Outcome::None);
        }
        Err(e) => {
            let source = if e.kind() == ErrorKind::PermissionDenied {
                DigestError::PermissionDenied(path.clone())
            } else {
                DigestError::Io(e)
            };
            return Err(VerifyError::Digest { path, source });
        }
    }

    let current = digester
        .digest_file(&path)
        .map_err(|source| VerifyError::Digest {
            path: path.clone(),
            source,
        })?;

    if current.digest == record.digest() && current.size == record.size() {
        Ok(Outcome::Ok)
    } else {
        Ok(Outcome::Diff {
            current: ManifestRecord::new(record.relative_path(), current.digest, current.size)?,
        })
    }
}

/// Everything comes out as DIFF when the manifest was produced with another
/// algorithm, so say so up front.
fn warn_on_algorithm_mismatch(manifest: &Manifest, options: &DigestOptions) {
    match manifest.algorithm {
        Some(declared) if declared != options.algorithm => {
            warn!(
                "Manifest was created with {} but verifying with {}; use --algorithm {}",
                declared, options.algorithm, declared
            );
        }
        Some(_) => {}
        None => {
            let expected_width = options.algorithm.hex_width();
            if let Some(record) = manifest
                .records
                .iter()
                .find(|r| r.digest().len() != expected_width)
            {
                warn!(
                    "Digest for {} is {} characters long but {} produces {}; was the manifest created with a different --algorithm?",
                    record.relative_path(),
                    record.digest().len(),
                    options.algorithm,
                    expected_width
                );
            }
        }
    }
}
