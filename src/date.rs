use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Local, TimeZone, Timelike, Utc};

use crate::media::MediaFile;

pub const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Seconds between 1904-01-01 (QuickTime epoch) and 1970-01-01.
const MP4_EPOCH_OFFSET: i64 = 2_082_844_800;

/// The date written into a file that has none. Local wall-clock time with
/// sub-second precision dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolvedDate(DateTime<Local>);

impl ResolvedDate {
    pub fn from_system_time(t: SystemTime) -> Self {
        let local: DateTime<Local> = t.into();
        Self(local.with_nanosecond(0).unwrap_or(local))
    }

    pub fn from_mp4_seconds(secs: u64) -> Option<Self> {
        let unix = i64::try_from(secs).ok()?.checked_sub(MP4_EPOCH_OFFSET)?;
        let utc = Utc.timestamp_opt(unix, 0).single()?;
        Some(Self(utc.with_timezone(&Local)))
    }

    pub fn exif_string(&self) -> String {
        self.0.format(EXIF_FORMAT).to_string()
    }

    pub fn iso_string(&self) -> String {
        self.0.format(ISO_FORMAT).to_string()
    }

    /// None for instants before 1904.
    pub fn mp4_seconds(&self) -> Option<u64> {
        u64::try_from(self.0.timestamp() + MP4_EPOCH_OFFSET).ok()
    }
}

impl fmt::Display for ResolvedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iso_string())
    }
}

/// Earlier of the creation and modification times.
pub fn resolve(file: &MediaFile) -> ResolvedDate {
    let earliest = match file.created {
        Some(created) if created < file.modified => created,
        _ => file.modified,
    };
    ResolvedDate::from_system_time(earliest)
}

/// Reads stored values back in tests. Ambiguous local times (DST fold) take
/// the earlier instant.
#[cfg(test)]
fn from_local_naive(naive: chrono::NaiveDateTime) -> Option<ResolvedDate> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| ResolvedDate(dt.with_nanosecond(0).unwrap_or(dt)))
}

#[cfg(test)]
pub fn parse_exif(s: &str) -> Option<ResolvedDate> {
    let naive = chrono::NaiveDateTime::parse_from_str(s.trim_end_matches('\0').trim(), EXIF_FORMAT).ok()?;
    from_local_naive(naive)
}

#[cfg(test)]
pub fn parse_iso(s: &str) -> Option<ResolvedDate> {
    let naive = chrono::NaiveDateTime::parse_from_str(s.trim(), ISO_FORMAT).ok()?;
    from_local_naive(naive)
}
