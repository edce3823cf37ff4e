//! Recursive listing of the regular files under a scan root.
//!
//! Each directory's children are visited in name order and a subdirectory's
//! contents are listed at the position of the subdirectory itself, so the
//! result is deterministic for an unchanged tree. Symlinks are neither
//! followed nor listed, and neither are other non-regular entries (sockets,
//! FIFOs, devices).

use std::path::{Component, Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum DirListError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    /// Path as reachable from the current directory (root joined with `relative_path`).
    pub path: PathBuf,
    /// Path relative to the listing root.
    pub relative_path: PathBuf,
}

/// Lists every regular file below `root`, recursively.
///
/// `exclude`, when given, is an absolute (canonical) path that is left out of
/// the listing; this keeps a manifest being written inside the tree from
/// recording itself.
pub fn list_files(root: &Path, exclude: Option<&Path>) -> Result<Vec<ListedFile>, DirListError> {
    let canonical_root = root.canonicalize().map_err(|e| map_io_error(e, root))?;

    let mut files = Vec::new();
    walk(root, &canonical_root, Path::new(""), exclude, &mut files)?;
    Ok(files)
}

fn walk(
    root: &Path,
    canonical_root: &Path,
    relative_dir: &Path,
    exclude: Option<&Path>,
    files: &mut Vec<ListedFile>,
) -> Result<(), DirListError> {
    let current_dir = root.join(relative_dir);

    let read_dir = std::fs::read_dir(&current_dir).map_err(|e| map_io_error(e, &current_dir))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(DirListError::Io)?;
        entries.push(entry.file_name());
    }
    entries.sort();

    for name in entries {
        let relative_path = relative_dir.join(&name);
        let path = root.join(&relative_path);

        let metadata = std::fs::symlink_metadata(&path).map_err(|e| map_io_error(e, &path))?;
        let file_type = metadata.file_type();

        if file_type.is_dir() {
            walk(root, canonical_root, &relative_path, exclude, files)?;
        } else if file_type.is_file() {
            let excluded = exclude
                .is_some_and(|excluded| canonical_root.join(&relative_path).as_path() == excluded);
            if excluded {
                debug!("Not listing {}: excluded", path.display());
                continue;
            }
            files.push(ListedFile {
                path,
                relative_path,
            });
        } else {
            debug!("Not listing {}: not a regular file", path.display());
        }
    }

    Ok(())
}

/// Renders a relative path in manifest form: components joined by `/`.
///
/// Returns `None` for paths that are not valid UTF-8 or that are not plain
/// relative paths.
pub fn to_manifest_path(relative_path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative_path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Inverse of [`to_manifest_path`]: joins `root` with a `/`-separated path
/// using the platform's separator.
pub fn resolve_manifest_path(root: &Path, manifest_path: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in manifest_path.split('/').filter(|part| !part.is_empty()) {
        path.push(part);
    }
    path
}

fn map_io_error(e: std::io::Error, path: &Path) -> DirListError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        DirListError::PermissionDenied(path.to_path_buf())
    } else {
        DirListError::Io(e)
    }
}
