//! Raw file naming
//!
//! The instrument writes one file per hour, named `YYMMDDHH.01A`.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

/// Extension of raw data files
pub const RAW_FILE_EXTENSION: &str = "01A";

/// True if `path` has the raw file extension (case-insensitive)
pub fn is_raw_file<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(RAW_FILE_EXTENSION))
        .unwrap_or(false)
}

/// Start of the hour encoded in a raw file name
///
/// Two-digit years are taken as 20YY. Returns `None` if the stem is not
/// eight digits or does not form a calendar hour.
pub fn raw_file_hour<P: AsRef<Path>>(path: P) -> Option<NaiveDateTime> {
    let stem = path.as_ref().file_stem()?.to_str()?;
    if stem.len() != 8 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| stem[range].parse::<u32>().ok();
    let year = 2000 + field(0..2)? as i32;
    NaiveDate::from_ymd_opt(year, field(2..4)?, field(4..6)?)?.and_hms_opt(field(6..8)?, 0, 0)
}
