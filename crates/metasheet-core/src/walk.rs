use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::ScanError;

fn classify(root: &Path, err: io::Error) -> ScanError {
    match err.kind() {
        io::ErrorKind::NotFound => ScanError::DirectoryNotFound(root.to_path_buf()),
        io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(root.to_path_buf()),
        _ => ScanError::Io {
            path: root.to_path_buf(),
            source: err,
        },
    }
}

/// Make sure `root` is a listable directory before any work starts.
pub fn check_root(root: &Path) -> Result<(), ScanError> {
    let meta = fs::metadata(root).map_err(|e| classify(root, e))?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    // An unreadable root would otherwise walk as an empty tree.
    fs::read_dir(root).map_err(|e| classify(root, e))?;
    Ok(())
}

/// Pre-order walk yielding every non-directory entry under `root`, siblings
/// sorted by name so both passes and repeated runs agree on the order.
///
/// Symlinks are not followed; a symlink whose target is a directory is skipped,
/// any other symlink counts as a file. Entries that fail mid-walk are still
/// yielded when they are not directories, so the caller produces a row for them.
/// Directories that cannot be listed are skipped.
fn entries(root: &Path, report_errors: bool) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                let ft = entry.file_type();
                if ft.is_dir() || (ft.is_symlink() && entry.path().is_dir()) {
                    None
                } else {
                    Some(entry.into_path())
                }
            }
            Err(err) => match err.path() {
                Some(path) if !path.is_dir() => Some(path.to_path_buf()),
                _ => {
                    if report_errors {
                        warn!("Skipping unreadable entry: {}", err);
                    }
                    None
                }
            },
        })
}

/// First pass: how many files the visit pass will yield.
pub fn count_files(root: &Path) -> u64 {
    entries(root, false).count() as u64
}

/// Second pass: the files themselves, in traversal order.
pub fn files(root: &Path) -> impl Iterator<Item = PathBuf> {
    entries(root, true)
}
