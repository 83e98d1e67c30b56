use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fatal problems with the root directory, raised before any file is processed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-file failures of a metadata source. Never fatal to a run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The table could not be persisted. The destination is left untouched.
#[derive(Debug, Error)]
#[error("Cannot write {}: {source}", path.display())]
pub struct ExportError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ExportError {
    pub(crate) fn new(path: impl Into<PathBuf>, source: impl Into<io::Error>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Error indicating the operation was cancelled.
#[derive(Debug, Clone, Error)]
#[error("Operation cancelled")]
pub struct CancelledError;

/// Everything that can abort a run.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
