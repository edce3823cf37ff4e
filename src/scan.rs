use crate::digest::{DigestError, DigestOptions, Digester};
use crate::dir_list::{DirListError, list_files, to_manifest_path};
use crate::manifest::{
    ManifestBuilder, ManifestError, ManifestKind, ManifestRecord, validate_relative_path,
    write_manifest,
};
use crate::report::ProgressObserver;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Directory {0} does not exist")]
    RootNotFound(PathBuf),
    #[error("Directory listing error: {0}")]
    DirList(#[from] DirListError),
    #[error("Checksum error for {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: DigestError,
    },
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Failed to report progress: {0}")]
    Progress(std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Records written to the manifest.
    pub files: usize,
    /// Files left out because their path cannot be stored in a manifest.
    pub skipped: usize,
    /// Time spent listing and checksumming (excludes writing the manifest).
    pub elapsed: Duration,
}

/// Checksum every regular file under `root` and write a manifest to `output`.
///
/// # Behavior
///
/// - `root` must be an existing directory; otherwise `RootNotFound` is returned
///   and nothing is written.
/// - Files are recorded in directory-walk order (see `dir_list`), one record per
///   file, with `/` separated paths relative to `root`.
/// - If `output` lies inside `root` it is not recorded, so re-scanning does not
///   capture the previous manifest.
/// - Files whose relative path cannot be represented (not UTF-8, leading `#`,
///   line breaks) are skipped with a warning and counted in `skipped`.
/// - Any existing file at `output` is replaced atomically.
///
/// # Errors
///
/// Listing and checksumming errors abort the scan without writing a manifest.
pub fn scan(
    root: &Path,
    output: &Path,
    options: &DigestOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<ScanSummary, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootNotFound(root.to_path_buf()));
    }

    info!(
        "Scanning {} ({}) into {}",
        root.display(),
        options.algorithm,
        output.display()
    );

    let start = Instant::now();

    let excluded = canonical_output_path(output);
    let files = list_files(root, excluded.as_deref())?;

    let mut digester = Digester::from_options(options);
    let mut builder = ManifestBuilder::new(ManifestKind::Checksum, root, options.algorithm);
    let mut count = 0;
    let mut skipped = 0;

    for file in files {
        let Some(relative_path) = to_manifest_path(&file.relative_path)
            .filter(|path| validate_relative_path(path).is_ok())
        else {
            warn!(
                "Skipping {}: path cannot be stored in a manifest",
                file.path.display()
            );
            skipped += 1;
            continue;
        };

        let digest = digester
            .digest_file(&file.path)
            .map_err(|source| ScanError::Digest {
                path: file.path.clone(),
                source,
            })?;

        let record = ManifestRecord::new(relative_path, digest.digest, digest.size)?;
        observer.on_scanned(&record).map_err(ScanError::Progress)?;
        builder.push_record(&record);
        count += 1;
    }

    let elapsed = start.elapsed();

    write_manifest(output, &builder.finish(count, elapsed))?;

    observer
        .on_finished(count, elapsed)
        .map_err(ScanError::Progress)?;
    info!("Wrote {} records to {}", count, output.display());

    Ok(ScanSummary {
        files: count,
        skipped,
        elapsed,
    })
}

/// Where `output` will live once written, in canonical form. The file itself
/// may not exist yet, so only its directory is canonicalized.
fn canonical_output_path(output: &Path) -> Option<PathBuf> {
    let file_name = output.file_name()?;
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(file_name))
}
