//! Capture timestamps and how they are derived for a single media file.
//!
//! The canonical form is `YYYYMMDD-HHMMSS`. It is fixed width and zero padded,
//! so comparing two timestamps as strings compares them chronologically.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::IngestError;

const PREFIX_FORMAT: &str = "%Y%m%d-%H%M%S";

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}-[0-9]{6}$").expect("Invalid regex for timestamp"));

static EXIF_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}:[0-9]{2}:[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}")
        .expect("Invalid regex for exif time")
});

/// A capture time at one-second resolution, `YYYYMMDD-HHMMSS`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CaptureTimestamp(String);

impl CaptureTimestamp {
    pub const LEN: usize = 15;

    /// Older than any real capture time. Used as the frontier of an empty archive.
    pub fn sentinel() -> Self {
        CaptureTimestamp("00000000-000000".to_string())
    }

    pub fn parse(s: &str) -> Option<Self> {
        TIMESTAMP_RE
            .is_match(s)
            .then(|| CaptureTimestamp(s.to_string()))
    }

    /// Reads the timestamp from the first 15 characters of an archive file name.
    pub fn from_prefix(name: &str) -> Option<Self> {
        name.get(..Self::LEN).and_then(Self::parse)
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        CaptureTimestamp(dt.format(PREFIX_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `YYYYMMDD` part.
    pub fn date_part(&self) -> &str {
        &self.0[..8]
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, PREFIX_FORMAT).ok()
    }
}

impl fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reformats an EXIF `YYYY:MM:DD HH:MM:SS` value into `YYYYMMDD-HHMMSS`.
///
/// Characters are picked by position; there is no timezone handling. Anything
/// after the first 19 characters (sub-seconds, offsets) is ignored. Values that
/// are not a calendar time, such as the `0000:00:00 00:00:00` an unset camera
/// clock writes, are rejected.
pub fn exif_time_to_prefix(exif_time: &str) -> Option<CaptureTimestamp> {
    if !EXIF_TIME_RE.is_match(exif_time) {
        return None;
    }
    let t = exif_time;
    let prefix = format!(
        "{}{}{}-{}{}{}",
        &t[0..4],
        &t[5..7],
        &t[8..10],
        &t[11..13],
        &t[14..16],
        &t[17..19]
    );
    CaptureTimestamp::parse(&prefix).filter(|ts| ts.to_naive().is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Picture,
    Raw,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "tif" | "tiff" => MediaKind::Picture,
            "nef" | "nrw" | "dng" | "cr2" | "arw" | "orf" | "raw" => MediaKind::Raw,
            "mp4" | "mov" | "avi" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }

    /// Kinds whose files are expected to carry an original capture time.
    pub fn has_embedded_metadata(self) -> bool {
        matches!(self, MediaKind::Picture | MediaKind::Raw)
    }
}

/// Where a record's capture timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    Metadata,
    /// Filesystem creation time. Lower confidence: it reflects when the file
    /// was written, not when the image was captured.
    Filesystem,
}

/// Reads the raw "original capture time" field of a media file.
pub trait CaptureTimeReader: Sync {
    /// Returns the field as written in the file (`YYYY:MM:DD HH:MM:SS`), or
    /// `None` if the file has no such field or cannot be read.
    fn original_capture_time(&self, path: &Path) -> Option<String>;
}

/// Reads `DateTimeOriginal` by running `exiftool -j`.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ExifTool {
            program: program.into(),
        }
    }

    fn exif_data(&self, path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
        let output = Command::new(&self.program)
            .arg("-j")
            .arg("-DateTimeOriginal")
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(format!("exiftool exited with {}", output.status).into());
        }
        let json: Vec<Value> = serde_json::from_slice(&output.stdout)?;
        Ok(json.into_iter().next().unwrap_or(Value::Null))
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        ExifTool::new("exiftool")
    }
}

impl CaptureTimeReader for ExifTool {
    fn original_capture_time(&self, path: &Path) -> Option<String> {
        match self.exif_data(path) {
            Ok(exif) => exif
                .get("DateTimeOriginal")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            Err(e) => {
                log::debug!("exiftool failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Filesystem creation time, or modification time where the platform has no
/// creation time, in local time.
pub fn filesystem_timestamp(path: &Path) -> Result<CaptureTimestamp, IngestError> {
    let metadata = fs::metadata(path)
        .map_err(|e| IngestError::metadata_unavailable(path, format!("cannot stat file: {e}")))?;
    let time = metadata
        .created()
        .or_else(|_| metadata.modified())
        .map_err(|e| IngestError::metadata_unavailable(path, format!("no filesystem time: {e}")))?;
    Ok(CaptureTimestamp::from_datetime(&DateTime::<Local>::from(time)))
}

/// Derives the capture timestamp of one file.
///
/// Metadata-bearing kinds use the embedded capture time when it is present.
/// A present but malformed value is an error rather than a fallback.
pub fn extract_capture_timestamp(
    path: &Path,
    kind: MediaKind,
    reader: &dyn CaptureTimeReader,
) -> Result<(CaptureTimestamp, TimestampSource), IngestError> {
    if kind.has_embedded_metadata() {
        if let Some(raw) = reader.original_capture_time(path) {
            return exif_time_to_prefix(&raw)
                .map(|ts| (ts, TimestampSource::Metadata))
                .ok_or_else(|| {
                    IngestError::metadata_unavailable(path, format!("malformed capture time {raw:?}"))
                });
        }
        log::debug!("no capture time in {}, using filesystem time", path.display());
    }
    filesystem_timestamp(path).map(|ts| (ts, TimestampSource::Filesystem))
}
