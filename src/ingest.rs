//! One ingest run: catalog, order, locate the frontier, plan, copy, clean up.
//!
//! All reads of the archive (frontier location, destination checks) happen
//! before the first write of the copy phase.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use crate::archive;
use crate::catalog::{Catalog, catalog_source};
use crate::config::{CameraProfile, Profiles};
use crate::error::IngestError;
use crate::events::EventSink;
use crate::executor::execute_plan;
use crate::frontier::{ArchiveFrontier, locate_frontier};
use crate::order::order_batch;
use crate::planner::{SkipReason, plan_merge};
use crate::sources::CameraRunState;
use crate::summary::{self, SourceSummary, SummaryFilter};
use crate::timestamp::CaptureTimeReader;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub today: NaiveDate,
    pub dry_run: bool,
    pub summary: Option<SummaryFilter>,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CameraReport {
    pub camera: String,
    pub sources: Vec<PathBuf>,
    pub today_dir: Option<PathBuf>,
    pub frontier: Option<ArchiveFrontier>,
    pub found: usize,
    pub nonconforming: usize,
    pub metadata_failures: usize,
    /// Missing media directories and unreadable source entries.
    pub unreadable: usize,
    pub copied: usize,
    pub skipped_existing: usize,
    /// Records not newer than the frontier, including the one the scan stopped on.
    pub behind_frontier: usize,
    pub failed: usize,
    /// Copied files left with their copy time instead of the capture time.
    pub unstamped: usize,
    pub today_dir_removed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<SourceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub today: String,
    pub dry_run: bool,
    pub cameras: Vec<CameraReport>,
}

impl RunReport {
    pub fn total_copied(&self) -> usize {
        self.cameras.iter().map(|c| c.copied).sum()
    }
}

/// Runs every camera that has at least one source.
pub fn run(
    profiles: &Profiles,
    states: &mut [CameraRunState],
    reader: &dyn CaptureTimeReader,
    options: &RunOptions,
    sink: &mut dyn EventSink,
) -> RunReport {
    let mut cameras = Vec::new();
    for (profile, state) in profiles.cameras.iter().zip(states.iter_mut()) {
        if !state.has_sources() {
            continue;
        }
        let report = match ingest_camera(profile, state, reader, options, sink) {
            Ok(report) => report,
            Err(e) => {
                log::error!("[{}] {}", profile.name, e);
                CameraReport {
                    camera: profile.name.clone(),
                    sources: state.source_roots.clone(),
                    today_dir: state.today_dir.clone(),
                    error: Some(e.to_string()),
                    ..CameraReport::default()
                }
            }
        };
        cameras.push(report);
    }
    if cameras.is_empty() {
        log::warn!("no camera sources found");
    }
    RunReport {
        today: archive::today_dir_name(options.today),
        dry_run: options.dry_run,
        cameras,
    }
}

/// Ingests all sources of one camera into its archive.
pub fn ingest_camera(
    profile: &CameraProfile,
    state: &mut CameraRunState,
    reader: &dyn CaptureTimeReader,
    options: &RunOptions,
    sink: &mut dyn EventSink,
) -> Result<CameraReport, IngestError> {
    let mut report = CameraReport {
        camera: profile.name.clone(),
        sources: state.source_roots.clone(),
        ..CameraReport::default()
    };

    let mut catalog = Catalog::default();
    for root in &state.source_roots {
        catalog.extend(catalog_source(
            &profile.name,
            root,
            &profile.media_subdirectory_name,
            reader,
            sink,
            options.show_progress,
        ));
    }
    report.found = catalog.records.len();
    report.nonconforming = catalog.nonconforming;
    report.metadata_failures = catalog.metadata_failures;
    report.unreadable = catalog.unreadable;
    state.records = catalog.records;
    order_batch(&mut state.records);

    let today_name = archive::today_dir_name(options.today);
    let today_dir = if options.dry_run {
        profile.archive_root.join(&today_name)
    } else {
        archive::ensure_camera_root(profile)?;
        archive::create_today_dir(profile, options.today)?
    };
    state.today_dir = Some(today_dir.clone());
    report.today_dir = Some(today_dir.clone());

    let merged = merge_into(profile, state, &today_dir, &today_name, options, sink, &mut report);

    if !options.dry_run {
        match archive::remove_if_empty(&today_dir) {
            Ok(removed) => report.today_dir_removed = removed,
            Err(e) => log::warn!("[{}] could not clean up {}: {}", profile.name, today_dir.display(), e),
        }
    }

    merged.map(|_| report)
}

fn merge_into(
    profile: &CameraProfile,
    state: &mut CameraRunState,
    today_dir: &Path,
    today_name: &str,
    options: &RunOptions,
    sink: &mut dyn EventSink,
    report: &mut CameraReport,
) -> Result<(), IngestError> {
    let frontier = if options.dry_run && !profile.archive_root.exists() {
        ArchiveFrontier::Empty
    } else {
        locate_frontier(&profile.name, &profile.archive_root, today_name, sink)?
    };
    state.frontier = Some(frontier.clone());
    report.frontier = Some(frontier.clone());
    let frontier_ts = frontier.timestamp();

    if let Some(filter) = options.summary {
        report.summary = summary::apply_filter(
            summary::summarize(&state.records),
            filter,
            frontier_ts.date_part(),
        );
    }

    let plan = plan_merge(std::mem::take(&mut state.records), &frontier_ts, today_dir);
    report.behind_frontier = plan.count_skipped(SkipReason::Frontier) + plan.behind_frontier;
    log::info!(
        "[{}] {} new, {} behind frontier {}",
        profile.name,
        plan.copy_count(),
        report.behind_frontier,
        frontier_ts
    );

    let outcome = execute_plan(
        &profile.name,
        &plan,
        today_dir,
        options.dry_run,
        sink,
        options.show_progress,
    );
    report.copied = outcome.copied;
    report.skipped_existing = outcome.skipped_existing;
    report.failed = outcome.failed;
    report.unstamped = outcome.unstamped;
    Ok(())
}
