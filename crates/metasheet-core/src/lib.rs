pub mod cancel;
pub mod error;
pub mod export;
pub mod extract;
pub mod normalize;
pub mod progress;
pub mod record;
pub mod source;
pub mod walk;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub use cancel::CancellationToken;
pub use error::{CancelledError, ExportError, ExtractionError, ProcessError, ScanError};
pub use extract::Extracted;
pub use progress::{ProgressCallback, RunProgress, ThrottledProgress};
pub use record::{FileRecord, COLUMNS};
pub use source::{ExifReader, ExifTool, MetadataFields, MetadataSource, SourceKind};

fn default_exiftool() -> PathBuf {
    PathBuf::from(source::exiftool::DEFAULT_PROGRAM)
}

fn default_timeout_secs() -> u64 {
    source::exiftool::DEFAULT_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Directory to walk
    pub root: PathBuf,
    /// Table to write
    pub output: PathBuf,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default = "default_exiftool")]
    pub exiftool: PathBuf,
    /// Extra arguments placed before the fixed exiftool flags
    #[serde(default)]
    pub exiftool_args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Worker threads, 0 = one per CPU
    #[serde(default)]
    pub jobs: usize,
}

impl ProcessOptions {
    pub fn new(root: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output: output.into(),
            source: SourceKind::default(),
            exiftool: default_exiftool(),
            exiftool_args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            jobs: 0,
        }
    }

    /// Build the metadata source these options describe.
    pub fn metadata_source(&self) -> Box<dyn MetadataSource> {
        match self.source {
            SourceKind::Exiftool => Box::new(
                ExifTool::new(&self.exiftool)
                    .with_args(self.exiftool_args.iter().cloned())
                    .with_timeout(Duration::from_secs(self.timeout_secs)),
            ),
            SourceKind::Builtin => Box::new(ExifReader),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Files counted by the first pass
    pub total_files: u64,
    /// One row per visited file, in visit order
    pub records: Vec<FileRecord>,
    /// Rows whose metadata could not be read at all
    pub extraction_failures: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Control options for process execution (cancellation).
#[derive(Debug, Clone, Default)]
pub struct ProcessControl {
    /// Cancellation token for Ctrl-C support.
    pub cancel_token: Option<CancellationToken>,
}

impl ProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn check(&self) -> Result<(), CancelledError> {
        match &self.cancel_token {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }
}

/// Walk, extract and export with progress reporting.
pub fn process(
    options: &ProcessOptions,
    progress_callback: &ProgressCallback,
) -> Result<ProcessResult, ProcessError> {
    process_with_control(options, &ProcessControl::default(), progress_callback)
}

/// Walk, extract and export with progress reporting and cancellation.
pub fn process_with_control(
    options: &ProcessOptions,
    control: &ProcessControl,
    progress_callback: &ProgressCallback,
) -> Result<ProcessResult, ProcessError> {
    let source = options.metadata_source();
    process_with_source(options, control, source.as_ref(), progress_callback)
}

/// Same as [`process_with_control`] with an explicit metadata source.
pub fn process_with_source(
    options: &ProcessOptions,
    control: &ProcessControl,
    source: &dyn MetadataSource,
    progress_callback: &ProgressCallback,
) -> Result<ProcessResult, ProcessError> {
    let result = collect_records(&options.root, source, options.jobs, control, progress_callback)?;

    // Last chance to bail out before anything lands on disk.
    control.check()?;
    export::write_table(&result.records, &options.output)?;

    Ok(result)
}

/// Build the table for `root` without exporting it.
///
/// Pass 1 counts the files for progress, pass 2 visits them and assigns each a
/// fresh id. Extraction then runs on `jobs` workers; results land in visit order.
pub fn collect_records(
    root: &Path,
    source: &dyn MetadataSource,
    jobs: usize,
    control: &ProcessControl,
    progress_callback: &ProgressCallback,
) -> Result<ProcessResult, ProcessError> {
    walk::check_root(root)?;
    control.check()?;

    let total_files = walk::count_files(root);
    info!(
        "Found {} files under {} (metadata via {})",
        total_files,
        root.display(),
        source.name()
    );

    let progress = RunProgress::start("extract", total_files, progress_callback);
    let discovered: Vec<(Uuid, PathBuf)> = walk::files(root).map(|p| (Uuid::new_v4(), p)).collect();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let rows: Vec<(FileRecord, Option<String>)> = pool.install(|| {
        discovered
            .into_par_iter()
            .map(|(id, path)| -> Result<(FileRecord, Option<String>), CancelledError> {
                control.check()?;
                let (extracted, warning) = match extract::extract(source, &path) {
                    Ok(extracted) => (extracted, None),
                    Err(e) => {
                        let message = format!("Could not read metadata for {}: {}", path.display(), e);
                        warn!("{}", message);
                        (Extracted::default(), Some(message))
                    }
                };
                let record = FileRecord::new(id, &path, extracted);
                progress.advance(&record.filename);
                Ok((record, warning))
            })
            .collect::<Result<Vec<_>, _>>()
    })?;
    progress.finish();

    let mut records = Vec::with_capacity(rows.len());
    let mut warnings = Vec::new();
    for (record, warning) in rows {
        records.push(record);
        warnings.extend(warning);
    }

    info!(
        "Extracted metadata for {} files ({} failures)",
        records.len(),
        warnings.len()
    );

    Ok(ProcessResult {
        total_files,
        records,
        extraction_failures: warnings.len() as u64,
        warnings,
    })
}
