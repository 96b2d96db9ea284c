//! Batch ordering for the merge planner.
//!
//! Records are sorted newest first by `(capture_timestamp, base_name)`. The
//! file name breaks ties between burst shots taken in the same second and
//! between in-camera edits, which keep the original capture time.
//!
//! Known limitation: when the device's file counter rolls over (9999 -> 0001)
//! inside a single second, the name tiebreak orders those files against their
//! true capture order.

use std::cmp::Ordering;

use crate::catalog::MediaRecord;

fn descending(a: &MediaRecord, b: &MediaRecord) -> Ordering {
    b.capture_timestamp
        .cmp(&a.capture_timestamp)
        .then_with(|| b.base_name.cmp(&a.base_name))
        // identical files on two cards of the same camera
        .then_with(|| b.source_path.cmp(&a.source_path))
}

/// Sorts a batch newest first.
pub fn order_batch(records: &mut [MediaRecord]) {
    records.sort_by(descending);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::{CaptureTimestamp, MediaKind, TimestampSource};
    use std::path::PathBuf;

    fn record(ts: &str, name: &str, card: &str) -> MediaRecord {
        MediaRecord {
            source_path: PathBuf::from(format!("/{card}/DCIM/100NIKON/{name}")),
            capture_timestamp: CaptureTimestamp::parse(ts).unwrap(),
            base_name: name.to_string(),
            kind: MediaKind::Picture,
            timestamp_source: TimestampSource::Metadata,
        }
    }

    fn names(records: &[MediaRecord]) -> Vec<&str> {
        records.iter().map(|r| r.base_name.as_str()).collect()
    }

    #[test]
    fn test_newest_first_with_name_tiebreak() {
        let mut batch = vec![
            record("20230801-101000", "a.jpg", "sd"),
            record("20230801-101001", "b.jpg", "sd"),
            record("20230801-101001", "c.jpg", "sd"),
            record("20230731-235959", "z.jpg", "sd"),
        ];
        order_batch(&mut batch);
        assert_eq!(names(&batch), vec!["c.jpg", "b.jpg", "a.jpg", "z.jpg"]);
    }

    #[test]
    fn test_in_camera_edit_sorts_by_original_capture_time() {
        // DSC_0101.JPG was edited in camera from DSC_0050.NEF and kept its capture time
        let mut batch = vec![
            record("20230801-090000", "DSC_0050.NEF", "sd"),
            record("20230801-120000", "DSC_0100.NEF", "sd"),
            record("20230801-090000", "DSC_0101.JPG", "sd"),
        ];
        order_batch(&mut batch);
        assert_eq!(
            names(&batch),
            vec!["DSC_0100.NEF", "DSC_0101.JPG", "DSC_0050.NEF"]
        );
    }

    #[test]
    fn test_ordering_is_deterministic_across_input_orders() {
        let base = vec![
            record("20230801-101001", "b.jpg", "sd"),
            record("20230801-101000", "a.jpg", "xqd"),
            record("20230801-101001", "c.jpg", "xqd"),
            record("20230801-101001", "c.jpg", "sd"),
        ];
        let mut first = base.clone();
        let mut second: Vec<_> = base.into_iter().rev().collect();
        order_batch(&mut first);
        order_batch(&mut second);
        assert_eq!(first, second);
        assert_eq!(names(&first), vec!["c.jpg", "c.jpg", "b.jpg", "a.jpg"]);
    }
}
