//! Locates the boundary between archived and new content for one camera.
//!
//! The archive is a flat set of `YYYY-MM-DD` directories. Walking them newest
//! first, the first directory holding a conforming file supplies the frontier:
//! its lexicographically last conforming name. Today's directory is never
//! considered, as it may already hold files copied earlier in this run from
//! another card of the same camera.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::IngestError;
use crate::events::{EventSink, IngestEvent};
use crate::timestamp::CaptureTimestamp;

static DATED_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("Invalid regex for dated directory"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArchiveFrontier {
    /// No dated directory holds a conforming file (brand-new camera).
    Empty,
    Located {
        last_dated_directory: String,
        last_file_name: String,
        timestamp: CaptureTimestamp,
    },
}

impl ArchiveFrontier {
    /// The frontier timestamp; the sentinel for an empty archive.
    pub fn timestamp(&self) -> CaptureTimestamp {
        match self {
            ArchiveFrontier::Empty => CaptureTimestamp::sentinel(),
            ArchiveFrontier::Located { timestamp, .. } => timestamp.clone(),
        }
    }
}

/// Whether an archive file name starts with a `YYYYMMDD-HHMMSS` timestamp.
pub fn is_conforming_name(name: &str) -> bool {
    CaptureTimestamp::from_prefix(name).is_some()
}

pub fn locate_frontier(
    camera: &str,
    archive_root: &Path,
    today_dir_name: &str,
    sink: &mut dyn EventSink,
) -> Result<ArchiveFrontier, IngestError> {
    let entries = fs::read_dir(archive_root).map_err(|source| IngestError::UnreadableDirectory {
        path: archive_root.to_path_buf(),
        source,
    })?;

    let mut dated_dirs: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            let dated = DATED_DIR_RE.is_match(name);
            if !dated {
                log::debug!("[{}] ignoring undated archive directory {}", camera, name);
            }
            dated && name != today_dir_name
        })
        .collect();
    dated_dirs.sort_unstable_by(|a, b| b.cmp(a));

    for dir_name in dated_dirs {
        let dir = archive_root.join(&dir_name);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(source) => {
                let err = IngestError::UnreadableDirectory {
                    path: dir.clone(),
                    source,
                };
                sink.emit(IngestEvent::Error {
                    camera: camera.to_string(),
                    path: dir,
                    message: err.to_string(),
                });
                continue;
            }
        };

        let mut last: Option<String> = None;
        for entry in listing.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_file = entry.file_type().is_ok_and(|t| t.is_file());
            if !is_file || !is_conforming_name(&name) {
                sink.emit(IngestEvent::SkipNonconforming {
                    camera: camera.to_string(),
                    path: entry.path(),
                });
                continue;
            }
            if last.as_deref().is_none_or(|current| name.as_str() > current) {
                last = Some(name);
            }
        }

        let Some(last_file_name) = last else {
            log::debug!("[{}] find last file: skipping empty dir {}", camera, dir_name);
            continue;
        };
        let Some(timestamp) = CaptureTimestamp::from_prefix(&last_file_name) else {
            continue;
        };
        log::info!(
            "[{}] last archived file: {}/{}",
            camera,
            dir_name,
            last_file_name
        );
        return Ok(ArchiveFrontier::Located {
            last_dated_directory: dir_name,
            last_file_name,
            timestamp,
        });
    }

    log::info!("[{}] archive has no dated files; every record is new", camera);
    Ok(ArchiveFrontier::Empty)
}
