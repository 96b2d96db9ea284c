//! The merge planner: decides which records of a batch go into the archive.
//!
//! The batch must already be ordered newest first. Scanning stops at the first
//! record whose capture time is not newer than the frontier; everything from
//! there on is assumed to be archived already. Older files missing from the
//! archive (stragglers) are therefore never picked up here.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::catalog::MediaRecord;
use crate::timestamp::CaptureTimestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Not newer than the frontier. The scan ended on this record.
    Frontier,
    /// The destination file is already in today's directory.
    DestinationExists,
    /// An earlier record of the same batch renders to the same name.
    DuplicateInBatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum MergeAction {
    Copy { destination_name: String },
    SkipAlreadyPresent { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeDecision {
    pub record: MediaRecord,
    pub action: MergeAction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergePlan {
    pub decisions: Vec<MergeDecision>,
    /// Records after the one that reached the frontier; never examined.
    pub behind_frontier: usize,
}

impl MergePlan {
    pub fn copies(&self) -> impl Iterator<Item = (&MediaRecord, &str)> {
        self.decisions.iter().filter_map(|d| match &d.action {
            MergeAction::Copy { destination_name } => Some((&d.record, destination_name.as_str())),
            MergeAction::SkipAlreadyPresent { .. } => None,
        })
    }

    pub fn copy_count(&self) -> usize {
        self.copies().count()
    }

    pub fn count_skipped(&self, reason: SkipReason) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.action == MergeAction::SkipAlreadyPresent { reason })
            .count()
    }
}

/// Classifies a newest-first batch against `frontier`.
///
/// `target_dir` is today's archive directory; a computed destination that
/// already exists there is skipped rather than copied.
pub fn plan_merge(batch: Vec<MediaRecord>, frontier: &CaptureTimestamp, target_dir: &Path) -> MergePlan {
    let total = batch.len();
    let mut plan = MergePlan::default();
    let mut planned: HashSet<String> = HashSet::new();

    for (index, record) in batch.into_iter().enumerate() {
        if record.capture_timestamp <= *frontier {
            log::debug!(
                "{} at {} is not newer than frontier {}; stopping",
                record.base_name,
                record.capture_timestamp,
                frontier
            );
            plan.decisions.push(MergeDecision {
                record,
                action: MergeAction::SkipAlreadyPresent {
                    reason: SkipReason::Frontier,
                },
            });
            plan.behind_frontier = total - index - 1;
            break;
        }

        let destination_name = record.destination_name();
        let action = if planned.contains(&destination_name) {
            MergeAction::SkipAlreadyPresent {
                reason: SkipReason::DuplicateInBatch,
            }
        } else if target_dir.join(&destination_name).exists() {
            MergeAction::SkipAlreadyPresent {
                reason: SkipReason::DestinationExists,
            }
        } else {
            planned.insert(destination_name.clone());
            MergeAction::Copy { destination_name }
        };
        plan.decisions.push(MergeDecision { record, action });
    }

    plan
}
