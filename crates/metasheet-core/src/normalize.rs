use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};

/// How every timestamp in the table is written.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How metadata tools write them. No timezone: local time as-is.
const EXIF_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// `2023:07:14 18:02:33` -> `2023-07-14 18:02:33`. Anything else (sub-seconds,
/// zone offsets, zeroed dates) is rejected.
pub fn format_timestamp(raw: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(raw, EXIF_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}

/// File-system time in the local zone.
pub fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string()
}

/// Seconds to `HH:MM:SS`, rounding any fraction up. Hours do not wrap into days.
pub fn format_video_length(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let total = seconds.ceil() as u64;
    Some(format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        total % 3600 / 60,
        total % 60
    ))
}
