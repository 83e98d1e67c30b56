use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extract::Extracted;

/// Column headers, in table order.
pub const COLUMNS: [&str; 7] = [
    "UUID",
    "Filename",
    "Filepath",
    "EXIF Create Time",
    "EXIF GPS Latitude",
    "EXIF GPS Longitude",
    "Video Length (HH:MM:SS)",
];

/// One row of the table. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Run-scoped row identity, not derived from content
    pub id: Uuid,
    /// Base name of the file
    pub filename: String,
    /// Path as walked, root included
    pub filepath: String,
    pub create_time: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub video_length: Option<String>,
}

impl FileRecord {
    pub fn new(id: Uuid, path: &Path, extracted: Extracted) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id,
            filename,
            filepath: path.to_string_lossy().into_owned(),
            create_time: extracted.create_time,
            gps_latitude: extracted.gps_latitude,
            gps_longitude: extracted.gps_longitude,
            video_length: extracted.video_length,
        }
    }
}
