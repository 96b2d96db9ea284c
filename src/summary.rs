//! Per-camera overview of what the sources hold: source -> folder -> capture
//! date -> first and last file of that date.
//!
//! Built in one chronological pass. A new node starts whenever the source,
//! folder or date changes, so interleaved content can list the same folder or
//! date more than once.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::MediaRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySpan {
    /// `YYYYMMDD`
    pub date: String,
    pub first_file: String,
    pub last_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub folder: String,
    pub days: Vec<DaySpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    /// Source path up to and including the media subdirectory.
    pub media_root: PathBuf,
    pub folders: Vec<FolderSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFilter {
    /// Only dates after the archive frontier's date.
    New,
    All,
}

/// Builds the tree from a newest-first batch.
pub fn summarize(records: &[MediaRecord]) -> Vec<SourceSummary> {
    let mut sources: Vec<SourceSummary> = Vec::new();

    for record in records.iter().rev() {
        let folder_dir = record.source_path.parent().unwrap_or(Path::new(""));
        let media_root = folder_dir.parent().unwrap_or(Path::new("")).to_path_buf();
        let folder = record.folder_name().unwrap_or_default();
        let date = record.capture_timestamp.date_part().to_string();
        let file = record.base_name.clone();

        let same_source = sources.last().is_some_and(|s| s.media_root == media_root);
        if !same_source {
            sources.push(SourceSummary {
                media_root,
                folders: Vec::new(),
            });
        }
        let Some(source) = sources.last_mut() else {
            continue;
        };

        let same_folder = same_source && source.folders.last().is_some_and(|f| f.folder == folder);
        if !same_folder {
            source.folders.push(FolderSummary {
                folder,
                days: Vec::new(),
            });
        }
        let Some(folder) = source.folders.last_mut() else {
            continue;
        };

        match folder.days.last_mut() {
            Some(day) if same_folder && day.date == date => day.last_file = file,
            _ => folder.days.push(DaySpan {
                date,
                first_file: file.clone(),
                last_file: file,
            }),
        }
    }

    sources
}

/// Drops dates not later than `frontier_date` (`YYYYMMDD`) for
/// [`SummaryFilter::New`], along with any folder or source left empty.
pub fn apply_filter(mut sources: Vec<SourceSummary>, filter: SummaryFilter, frontier_date: &str) -> Vec<SourceSummary> {
    if filter == SummaryFilter::All {
        return sources;
    }
    for source in &mut sources {
        for folder in &mut source.folders {
            folder.days.retain(|day| day.date.as_str() > frontier_date);
        }
        source.folders.retain(|f| !f.days.is_empty());
    }
    sources.retain(|s| !s.folders.is_empty());
    sources
}

pub fn render(camera: &str, sources: &[SourceSummary]) -> String {
    let mut out = format!("{camera}\n");
    for source in sources {
        out.push_str(&format!("   {}\n", source.media_root.display()));
        for folder in &source.folders {
            out.push_str(&format!("      {}\n", folder.folder));
            for day in &folder.days {
                out.push_str(&format!(
                    "         {}: {} - {}\n",
                    day.date, day.first_file, day.last_file
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::order_batch;
    use crate::timestamp::{CaptureTimestamp, MediaKind, TimestampSource};

    fn record(path: &str, ts: &str) -> MediaRecord {
        let source_path = PathBuf::from(path);
        MediaRecord {
            base_name: source_path.file_name().unwrap().to_string_lossy().into_owned(),
            source_path,
            capture_timestamp: CaptureTimestamp::parse(ts).unwrap(),
            kind: MediaKind::Picture,
            timestamp_source: TimestampSource::Metadata,
        }
    }

    fn batch() -> Vec<MediaRecord> {
        let mut records = vec![
            record("/sd/DCIM/100ND500/DSC_0001.JPG", "20230729-151337"),
            record("/sd/DCIM/100ND500/DSC_0002.JPG", "20230729-151400"),
            record("/sd/DCIM/100ND500/DSC_0003.JPG", "20230730-090000"),
            record("/sd/DCIM/101ND500/DSC_0004.JPG", "20230731-100000"),
            record("/xqd/DCIM/100ND500/DSC_0005.JPG", "20230801-100000"),
        ];
        order_batch(&mut records);
        records
    }

    #[test]
    fn test_summary_tree() {
        let tree = summarize(&batch());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].media_root, PathBuf::from("/sd/DCIM"));
        assert_eq!(tree[0].folders.len(), 2);
        assert_eq!(
            tree[0].folders[0].days,
            vec![
                DaySpan {
                    date: "20230729".into(),
                    first_file: "DSC_0001.JPG".into(),
                    last_file: "DSC_0002.JPG".into(),
                },
                DaySpan {
                    date: "20230730".into(),
                    first_file: "DSC_0003.JPG".into(),
                    last_file: "DSC_0003.JPG".into(),
                },
            ]
        );
        assert_eq!(tree[1].media_root, PathBuf::from("/xqd/DCIM"));
    }

    #[test]
    fn test_filter_new_only() {
        let tree = apply_filter(summarize(&batch()), SummaryFilter::New, "20230730");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].folders.len(), 1);
        assert_eq!(tree[0].folders[0].folder, "101ND500");

        let all = apply_filter(summarize(&batch()), SummaryFilter::All, "20230730");
        assert_eq!(all, summarize(&batch()));
    }

    #[test]
    fn test_render() {
        let text = render("Nikon D500", &summarize(&batch()));
        assert!(text.starts_with("Nikon D500\n"));
        assert!(text.contains("         20230729: DSC_0001.JPG - DSC_0002.JPG\n"));
    }
}
