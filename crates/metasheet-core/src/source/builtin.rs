use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{Exif, In, Reader, Tag, Value};
use tracing::debug;

use super::{MetadataFields, MetadataSource};
use crate::error::ExtractionError;

/// Larger images are not parsed; some containers are read whole.
pub const MAX_EXIF_BYTES: u64 = 32 * 1024 * 1024;

/// EXIF tags reported under the names `exiftool` uses for them.
const DATE_TAGS: [(Tag, &str); 2] = [
    (Tag::DateTimeOriginal, "DateTimeOriginal"),
    (Tag::DateTimeDigitized, "CreateDate"),
];

/// In-process EXIF reader for machines without `exiftool`.
/// Only image files are read; everything else comes back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

impl MetadataSource for ExifReader {
    fn inspect(&self, path: &Path) -> Result<MetadataFields, ExtractionError> {
        let is_image = mime_guess::from_path(path)
            .first()
            .map_or(false, |mime| mime.type_() == mime_guess::mime::IMAGE);
        if !is_image {
            return Ok(MetadataFields::default());
        }

        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size > MAX_EXIF_BYTES {
            debug!("Not reading EXIF from {} ({} bytes)", path.display(), size);
            return Ok(MetadataFields::default());
        }
        // No EXIF container is not an error, the file simply has nothing to say.
        let Ok(exif) = Reader::new().read_from_container(&mut BufReader::new(file)) else {
            return Ok(MetadataFields::default());
        };

        let mut fields = MetadataFields::new();
        for (tag, name) in DATE_TAGS {
            if let Some(text) = ascii(&exif, tag) {
                fields.insert(name, text);
            }
        }
        if let Some(lat) = coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S') {
            fields.insert("GPSLatitude", lat);
        }
        if let Some(lon) = coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W') {
            fields.insert("GPSLongitude", lon);
        }
        Ok(fields)
    }

    fn name(&self) -> &str {
        "builtin"
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => {
            let text = String::from_utf8_lossy(parts.first()?).trim().to_string();
            Some(text).filter(|t| !t.is_empty())
        }
        _ => None,
    }
}

/// Degrees/minutes/seconds rationals to signed decimal degrees, 6 places.
fn coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.is_empty() {
        return None;
    }

    let degrees = parts
        .iter()
        .take(3)
        .zip([1.0, 60.0, 3600.0])
        .map(|(r, div)| r.to_f64() / div)
        .sum::<f64>();
    if !degrees.is_finite() {
        return None;
    }

    let sign = match exif.get_field(ref_tag, In::PRIMARY).map(|f| &f.value) {
        Some(Value::Ascii(refs)) if refs.first().and_then(|r| r.first()) == Some(&negative_ref) => -1.0,
        _ => 1.0,
    };
    Some((sign * degrees * 1e6).round() / 1e6)
}
