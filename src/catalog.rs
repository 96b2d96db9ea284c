//! Source cataloging: turns a card or backup directory into media records.
//!
//! Cameras write files as `<root>/<media subdirectory>/<folder>/<file>`. Only
//! files at exactly that depth are cataloged; anything shallower or deeper
//! (thumbnail caches, sidecar databases) is reported and skipped.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::events::{EventSink, IngestEvent};
use crate::progress;
use crate::timestamp::{
    CaptureTimeReader, CaptureTimestamp, MediaKind, TimestampSource, extract_capture_timestamp,
};

/// Depth of media files below the media subdirectory.
const MEDIA_FILE_DEPTH: usize = 2;

/// One cataloged source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRecord {
    pub source_path: PathBuf,
    pub capture_timestamp: CaptureTimestamp,
    /// File name as the device wrote it.
    pub base_name: String,
    pub kind: MediaKind,
    pub timestamp_source: TimestampSource,
}

impl MediaRecord {
    /// Archive name: `YYYYMMDD-HHMMSS_<base name>`, lowercased.
    pub fn destination_name(&self) -> String {
        format!("{}_{}", self.capture_timestamp, self.base_name).to_lowercase()
    }

    /// Name of the device folder the file sits in, e.g. `100NIKON`.
    pub fn folder_name(&self) -> Option<String> {
        self.source_path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub records: Vec<MediaRecord>,
    pub nonconforming: usize,
    /// Files left out because their capture time could not be derived.
    pub metadata_failures: usize,
    /// Missing media directories and entries the walk could not read.
    pub unreadable: usize,
}

impl Catalog {
    pub fn extend(&mut self, other: Catalog) {
        self.records.extend(other.records);
        self.nonconforming += other.nonconforming;
        self.metadata_failures += other.metadata_failures;
        self.unreadable += other.unreadable;
    }
}

/// Walks `source_root/media_subdirectory` and catalogs every media file one
/// folder level below it.
///
/// Per-file failures are emitted as events and the file is left out. The
/// walk itself never fails.
pub fn catalog_source(
    camera: &str,
    source_root: &Path,
    media_subdirectory: &Path,
    reader: &dyn CaptureTimeReader,
    sink: &mut dyn EventSink,
    show_progress: bool,
) -> Catalog {
    let media_dir = source_root.join(media_subdirectory);
    let mut catalog = Catalog::default();

    if !media_dir.is_dir() {
        sink.emit(IngestEvent::Error {
            camera: camera.to_string(),
            path: media_dir,
            message: "media subdirectory not found".to_string(),
        });
        catalog.unreadable += 1;
        return catalog;
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&media_dir)
        .min_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| media_dir.clone());
                sink.emit(IngestEvent::Error {
                    camera: camera.to_string(),
                    path,
                    message: e.to_string(),
                });
                catalog.unreadable += 1;
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        if entry.depth() == MEDIA_FILE_DEPTH {
            candidates.push(entry.into_path());
        } else {
            sink.emit(IngestEvent::SkipNonconforming {
                camera: camera.to_string(),
                path: entry.into_path(),
            });
            catalog.nonconforming += 1;
        }
    }

    let pb = progress::bar(candidates.len() as u64, "Reading capture times...", show_progress);
    let extracted: Vec<(PathBuf, Result<MediaRecord, IngestError>)> = candidates
        .into_par_iter()
        .map(|path| {
            let record = to_record(&path, reader);
            pb.inc(1);
            (path, record)
        })
        .collect();
    pb.finish_and_clear();

    for (path, record) in extracted {
        sink.emit(IngestEvent::Found {
            camera: camera.to_string(),
            path: path.clone(),
        });
        match record {
            Ok(record) => catalog.records.push(record),
            Err(e) => {
                sink.emit(IngestEvent::Error {
                    camera: camera.to_string(),
                    path,
                    message: e.to_string(),
                });
                catalog.metadata_failures += 1;
            }
        }
    }

    log::info!(
        "[{}] {} media files cataloged from {}",
        camera,
        catalog.records.len(),
        media_dir.display()
    );
    catalog
}

fn to_record(path: &Path, reader: &dyn CaptureTimeReader) -> Result<MediaRecord, IngestError> {
    let base_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| IngestError::metadata_unavailable(path, "path has no file name"))?;
    let kind = MediaKind::from_path(path);
    let (capture_timestamp, timestamp_source) = extract_capture_timestamp(path, kind, reader)?;
    Ok(MediaRecord {
        source_path: path.to_path_buf(),
        capture_timestamp,
        base_name,
        kind,
        timestamp_source,
    })
}
