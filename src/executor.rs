//! Applies a merge plan: copies new files into today's archive directory under
//! their timestamped names and stamps them with their capture time.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use chrono::{Local, TimeZone};
use filetime::FileTime;
use serde::Serialize;

use crate::error::IngestError;
use crate::events::{EventSink, IngestEvent};
use crate::planner::{MergeAction, MergePlan, SkipReason};
use crate::progress;
use crate::timestamp::CaptureTimestamp;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub copied: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    /// Copied files whose times could not be set to the capture time.
    pub unstamped: usize,
}

/// Seconds since the epoch for a capture timestamp read as local time.
pub fn capture_unix_time(timestamp: &CaptureTimestamp) -> Option<i64> {
    let naive = timestamp.to_naive()?;
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp())
            // local time falls in a DST gap
            .unwrap_or_else(|| naive.and_utc().timestamp()),
    )
}

/// Sets access and modification time of `path` to the capture time.
pub fn set_capture_times(path: &Path, timestamp: &CaptureTimestamp) -> io::Result<()> {
    let secs = capture_unix_time(timestamp).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a calendar time: {timestamp}"),
        )
    })?;
    let time = FileTime::from_unix_time(secs, 0);
    filetime::set_file_times(path, time, time)
}

/// Copies `src` to `dst` byte for byte. Never overwrites: an existing `dst`
/// is reported as [`IngestError::DestinationExists`]. A partially written
/// destination is removed on failure.
pub fn copy_new_file(src: &Path, dst: &Path) -> Result<u64, IngestError> {
    let mut dest = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(IngestError::DestinationExists {
                path: dst.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(IngestError::CopyFailure {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
                source,
            });
        }
    };

    let result = File::open(src)
        .and_then(|mut source| io::copy(&mut source, &mut dest))
        .and_then(|bytes| dest.sync_all().map(|_| bytes));
    drop(dest);

    result.map_err(|source| {
        if let Err(e) = fs::remove_file(dst) {
            log::warn!("could not remove partial copy {}: {}", dst.display(), e);
        }
        IngestError::CopyFailure {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source,
        }
    })
}

/// Carries out every decision of `plan` against `target_dir`.
///
/// Failures are reported per record and never stop the batch. In a dry run
/// the copies are only logged.
pub fn execute_plan(
    camera: &str,
    plan: &MergePlan,
    target_dir: &Path,
    dry_run: bool,
    sink: &mut dyn EventSink,
    show_progress: bool,
) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::default();
    let pb = progress::bar(plan.decisions.len() as u64, "Copying files...", show_progress);

    for decision in &plan.decisions {
        pb.inc(1);
        let record = &decision.record;
        let destination_name = match &decision.action {
            MergeAction::Copy { destination_name } => destination_name,
            MergeAction::SkipAlreadyPresent {
                reason: SkipReason::Frontier,
            } => continue,
            MergeAction::SkipAlreadyPresent { .. } => {
                sink.emit(IngestEvent::SkipExists {
                    camera: camera.to_string(),
                    dst: target_dir.join(record.destination_name()),
                });
                outcome.skipped_existing += 1;
                continue;
            }
        };
        let dst = target_dir.join(destination_name);

        if dry_run {
            log::info!(
                "[{}] would copy {} to {}",
                camera,
                record.source_path.display(),
                dst.display()
            );
            outcome.copied += 1;
            continue;
        }

        match copy_new_file(&record.source_path, &dst) {
            Ok(_) => {
                let stamped = set_capture_times(&dst, &record.capture_timestamp);
                sink.emit(IngestEvent::Copied {
                    camera: camera.to_string(),
                    src: record.source_path.clone(),
                    dst: dst.clone(),
                });
                outcome.copied += 1;
                // the copy stays, but its file times are wrong
                if let Err(e) = stamped {
                    sink.emit(IngestEvent::Error {
                        camera: camera.to_string(),
                        path: dst,
                        message: format!("could not set file times: {e}"),
                    });
                    outcome.unstamped += 1;
                }
            }
            Err(IngestError::DestinationExists { path }) => {
                sink.emit(IngestEvent::SkipExists {
                    camera: camera.to_string(),
                    dst: path,
                });
                outcome.skipped_existing += 1;
            }
            Err(e) => {
                sink.emit(IngestEvent::Error {
                    camera: camera.to_string(),
                    path: record.source_path.clone(),
                    message: e.to_string(),
                });
                outcome.failed += 1;
            }
        }
    }

    pb.finish_and_clear();
    log::info!("[{}] {} files copied", camera, outcome.copied);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MediaRecord;
    use crate::planner::plan_merge;
    use crate::timestamp::{MediaKind, TimestampSource};
    use tempfile::TempDir;

    fn record(src: &Path, ts: &str) -> MediaRecord {
        MediaRecord {
            source_path: src.to_path_buf(),
            capture_timestamp: CaptureTimestamp::parse(ts).unwrap(),
            base_name: src.file_name().unwrap().to_string_lossy().into_owned(),
            kind: MediaKind::from_path(src),
            timestamp_source: TimestampSource::Metadata,
        }
    }

    #[test]
    fn test_copy_preserves_content_and_sets_times() {
        let card = TempDir::new().unwrap();
        let today = TempDir::new().unwrap();
        let src = card.path().join("DSC_0001.JPG");
        fs::write(&src, b"\xff\xd8jpeg bytes").unwrap();

        let plan = plan_merge(
            vec![record(&src, "20230801-101000")],
            &CaptureTimestamp::sentinel(),
            today.path(),
        );
        let mut events = Vec::new();
        let outcome = execute_plan("cam", &plan, today.path(), false, &mut events, false);
        assert_eq!(outcome.copied, 1);

        let dst = today.path().join("20230801-101000_dsc_0001.jpg");
        assert_eq!(fs::read(&dst).unwrap(), b"\xff\xd8jpeg bytes");

        let meta = fs::metadata(&dst).unwrap();
        let mtime = FileTime::from_last_modification_time(&meta);
        let expected = capture_unix_time(&CaptureTimestamp::parse("20230801-101000").unwrap());
        assert_eq!(Some(mtime.unix_seconds()), expected);

        assert_eq!(
            events,
            vec![IngestEvent::Copied {
                camera: "cam".into(),
                src,
                dst
            }]
        );
    }

    #[test]
    fn test_never_overwrites() {
        let card = TempDir::new().unwrap();
        let today = TempDir::new().unwrap();
        let src = card.path().join("a.jpg");
        let dst = today.path().join("20230801-101000_a.jpg");
        fs::write(&src, b"new").unwrap();

        let plan = plan_merge(
            vec![record(&src, "20230801-101000")],
            &CaptureTimestamp::sentinel(),
            today.path(),
        );
        // destination appears between planning and copying
        fs::write(&dst, b"old").unwrap();

        let mut events = Vec::new();
        let outcome = execute_plan("cam", &plan, today.path(), false, &mut events, false);
        assert_eq!(outcome.copied, 0);
        assert_eq!(outcome.skipped_existing, 1);
        assert_eq!(fs::read(&dst).unwrap(), b"old");
        assert!(matches!(events[0], IngestEvent::SkipExists { .. }));
    }

    #[test]
    fn test_failed_copy_does_not_stop_the_batch() {
        let card = TempDir::new().unwrap();
        let today = TempDir::new().unwrap();
        let missing = card.path().join("gone.jpg");
        let present = card.path().join("here.jpg");
        fs::write(&present, b"x").unwrap();

        let plan = plan_merge(
            vec![
                record(&missing, "20230801-101001"),
                record(&present, "20230801-101000"),
            ],
            &CaptureTimestamp::sentinel(),
            today.path(),
        );
        let mut events = Vec::new();
        let outcome = execute_plan("cam", &plan, today.path(), false, &mut events, false);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.copied, 1);
        // no partial file left for the failed copy
        assert!(!today.path().join("20230801-101001_gone.jpg").exists());
        assert!(today.path().join("20230801-101000_here.jpg").exists());
    }

    #[test]
    fn test_impossible_capture_time_keeps_copy_and_reports() {
        let card = TempDir::new().unwrap();
        let today = TempDir::new().unwrap();
        let src = card.path().join("DSC_0009.JPG");
        fs::write(&src, b"x").unwrap();

        let plan = plan_merge(
            vec![record(&src, "20230230-100000")],
            &CaptureTimestamp::sentinel(),
            today.path(),
        );
        let mut events = Vec::new();
        let outcome = execute_plan("cam", &plan, today.path(), false, &mut events, false);
        assert_eq!(outcome.copied, 1);
        assert_eq!(outcome.unstamped, 1);

        let dst = today.path().join("20230230-100000_dsc_0009.jpg");
        assert_eq!(fs::read(&dst).unwrap(), b"x");
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], IngestEvent::Copied { .. }));
        match &events[1] {
            IngestEvent::Error { path, .. } => assert_eq!(path, &dst),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let card = TempDir::new().unwrap();
        let today = TempDir::new().unwrap();
        let src = card.path().join("a.jpg");
        fs::write(&src, b"x").unwrap();

        let plan = plan_merge(
            vec![record(&src, "20230801-101000")],
            &CaptureTimestamp::sentinel(),
            today.path(),
        );
        let mut events = Vec::new();
        let outcome = execute_plan("cam", &plan, today.path(), true, &mut events, false);
        assert_eq!(outcome.copied, 1);
        assert!(events.is_empty());
        assert_eq!(fs::read_dir(today.path()).unwrap().count(), 0);
    }
}
