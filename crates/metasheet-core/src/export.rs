use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ExportError;
use crate::record::{FileRecord, COLUMNS};

/// Write `records` as CSV: one header row, then one row per record in order.
///
/// The table goes to a temp file next to `output` and is renamed into place,
/// so `output` is either the complete table or untouched.
pub fn write_table(records: &[FileRecord], output: &Path) -> Result<(), ExportError> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ExportError::new(output, e))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer
            .write_record(COLUMNS)
            .map_err(|e| ExportError::new(output, e))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| ExportError::new(output, e))?;
        }
        writer.flush().map_err(|e| ExportError::new(output, e))?;
    }

    tmp.as_file()
        .sync_all()
        .map_err(|e| ExportError::new(output, e))?;
    tmp.persist(output)
        .map_err(|e| ExportError::new(output, e.error))?;

    debug!("Wrote {} rows to {}", records.len(), output.display());
    Ok(())
}
