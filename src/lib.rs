//! Incremental ingest of camera media into per-camera, date-partitioned archives.
//!
//! Files are copied from cards and backup drives into `archive_root/YYYY-MM-DD/`
//! and renamed `YYYYMMDD-HHMMSS_<original name>` so the archive sorts
//! chronologically. Each run only copies what is newer than the newest file
//! already archived for that camera.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod frontier;
pub mod ingest;
pub mod order;
pub mod planner;
pub mod progress;
pub mod sources;
pub mod summary;
pub mod timestamp;

pub use catalog::MediaRecord;
pub use config::{CameraProfile, Config, Profiles};
pub use error::IngestError;
pub use events::{EventSink, IngestEvent, LogSink};
pub use frontier::ArchiveFrontier;
pub use ingest::{CameraReport, RunOptions, RunReport};
pub use planner::{MergeAction, MergeDecision, MergePlan, SkipReason};
pub use sources::CameraRunState;
pub use timestamp::{CaptureTimeReader, CaptureTimestamp, ExifTool};
