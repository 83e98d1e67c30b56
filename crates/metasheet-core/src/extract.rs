use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::normalize;
use crate::source::{MetadataFields, MetadataSource};

/// Capture time first, then the container/track creation times.
pub const CREATE_TIME_FIELDS: [&str; 4] = [
    "DateTimeOriginal",
    "TrackCreateDate",
    "MediaCreateDate",
    "CreateDate",
];
pub const GPS_LATITUDE_FIELD: &str = "GPSLatitude";
pub const GPS_LONGITUDE_FIELD: &str = "GPSLongitude";
pub const DURATION_FIELD: &str = "Duration";

/// Normalized metadata of one file. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub create_time: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub video_length: Option<String>,
}

/// Inspect `path` with `source` and normalize what comes back.
pub fn extract(source: &dyn MetadataSource, path: &Path) -> Result<Extracted, ExtractionError> {
    let fields = source.inspect(path)?;
    Ok(normalize_fields(&fields, path))
}

/// Apply the fallback chain to already-parsed fields. `path` is only consulted
/// for its modification time when no timestamp field is present.
pub fn normalize_fields(fields: &MetadataFields, path: &Path) -> Extracted {
    Extracted {
        create_time: create_time(fields, path),
        gps_latitude: fields.number(GPS_LATITUDE_FIELD),
        gps_longitude: fields.number(GPS_LONGITUDE_FIELD),
        video_length: fields
            .get(DURATION_FIELD)
            .and_then(|_| fields.number(DURATION_FIELD))
            .and_then(normalize::format_video_length),
    }
}

fn create_time(fields: &MetadataFields, path: &Path) -> Option<String> {
    let Some((name, value)) = fields.first_present(&CREATE_TIME_FIELDS) else {
        return modified_time(path);
    };

    // A present but unreadable timestamp is final: no later field, no mtime.
    let formatted = value.as_str().and_then(normalize::format_timestamp);
    if formatted.is_none() {
        warn!(
            "Unrecognized {} value {} for {}",
            name,
            value,
            path.display()
        );
    }
    formatted
}

fn modified_time(path: &Path) -> Option<String> {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(time) => Some(normalize::format_system_time(time)),
        Err(e) => {
            debug!("No modification time for {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tempfile::tempdir;

    struct Fixed(MetadataFields);

    impl MetadataSource for Fixed {
        fn inspect(&self, _path: &Path) -> Result<MetadataFields, ExtractionError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Broken;

    impl MetadataSource for Broken {
        fn inspect(&self, _path: &Path) -> Result<MetadataFields, ExtractionError> {
            Err(ExtractionError::Malformed("garbage".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn file_with_mtime(dir: &Path, secs: i64) -> std::path::PathBuf {
        let path = dir.join("clip.mov");
        fs::write(&path, b"x").unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
        path
    }

    #[test]
    fn test_capture_time_wins() {
        let fields = MetadataFields::new()
            .with("CreateDate", "2019:01:01 09:00:00")
            .with("DateTimeOriginal", "2018:05:06 07:08:09");
        let out = normalize_fields(&fields, Path::new("/does/not/matter"));
        assert_eq!(out.create_time.as_deref(), Some("2018-05-06 07:08:09"));
    }

    #[test]
    fn test_track_time_before_create_date() {
        let fields = MetadataFields::new()
            .with("CreateDate", "2019:01:01 09:00:00")
            .with("MediaCreateDate", "2019:02:02 10:00:00")
            .with("TrackCreateDate", "2019:03:03 11:00:00");
        let out = normalize_fields(&fields, Path::new("x"));
        assert_eq!(out.create_time.as_deref(), Some("2019-03-03 11:00:00"));
    }

    #[test]
    fn test_falls_back_to_mtime() {
        let dir = tempdir().unwrap();
        let path = file_with_mtime(dir.path(), 1_500_000_000);
        let expected =
            normalize::format_system_time(UNIX_EPOCH + Duration::from_secs(1_500_000_000));

        let out = extract(&Fixed(MetadataFields::new()), &path).unwrap();
        assert_eq!(out.create_time, Some(expected));
        assert_eq!(out.gps_latitude, None);
        assert_eq!(out.video_length, None);
    }

    #[test]
    fn test_no_metadata_no_mtime() {
        let dir = tempdir().unwrap();
        let out = normalize_fields(&MetadataFields::new(), &dir.path().join("vanished.jpg"));
        assert_eq!(out, Extracted::default());
    }

    #[test]
    fn test_unparseable_timestamp_stops_the_chain() {
        let dir = tempdir().unwrap();
        let path = file_with_mtime(dir.path(), 1_500_000_000);
        let fields = MetadataFields::new()
            .with("DateTimeOriginal", "2020:01:01 10:00:00.123+01:00")
            .with("CreateDate", "2020:01:01 09:00:00");
        let out = normalize_fields(&fields, &path);
        assert_eq!(out.create_time, None);
    }

    #[test]
    fn test_gps_and_duration() {
        let fields = MetadataFields::new()
            .with("GPSLatitude", 37.774929)
            .with("GPSLongitude", -122.419416)
            .with("Duration", 125.001);
        let out = normalize_fields(&fields, Path::new("x"));
        assert_eq!(out.gps_latitude, Some(37.774929));
        assert_eq!(out.gps_longitude, Some(-122.419416));
        assert_eq!(out.video_length.as_deref(), Some("00:02:06"));
    }

    #[test]
    fn test_zero_duration_is_absent() {
        let fields = MetadataFields::new().with("Duration", 0);
        assert_eq!(normalize_fields(&fields, Path::new("x")).video_length, None);
    }

    #[test]
    fn test_source_failure_propagates() {
        assert!(extract(&Broken, Path::new("x")).is_err());
    }
}
