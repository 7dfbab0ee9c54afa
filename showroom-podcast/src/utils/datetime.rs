//! Archive timestamps.
//!
//! Archive file names use Japan time regardless of the host time zone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Time zone archive file names are stamped in.
pub const ARCHIVE_TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

/// `strftime` pattern for archive file names, second resolution.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y_%m_%d-%H_%M_%S";

/// Source of the current time, swappable in tests.
pub type Clock = fn() -> DateTime<Tz>;

/// Current time in [`ARCHIVE_TIMEZONE`].
pub fn now_jst() -> DateTime<Tz> {
    Utc::now().with_timezone(&ARCHIVE_TIMEZONE)
}

pub fn file_timestamp(at: &DateTime<Tz>) -> String {
    at.format(FILE_TIMESTAMP_FORMAT).to_string()
}
