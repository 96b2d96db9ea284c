use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while ingesting camera media.
///
/// Only the configuration and archive-base variants stop a run. The rest are
/// raised for a single record or directory and end up in the event stream.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("capture timestamp unavailable for {path}: {reason}")]
    MetadataUnavailable { path: PathBuf, reason: String },

    #[error("cannot read directory {path}: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    #[error("copy {src} -> {dst} failed: {source}")]
    CopyFailure {
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("archive base {0} does not exist (pass --init-archive to create it)")]
    ArchiveBaseMissing(PathBuf),

    #[error("source {path} matches more than one camera: {}", cameras.join(", "))]
    AmbiguousSource { path: PathBuf, cameras: Vec<String> },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IngestError {
    pub fn metadata_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IngestError::MetadataUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that must halt the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::ConfigurationMissing(_)
                | IngestError::InvalidConfiguration(_)
                | IngestError::ArchiveBaseMissing(_)
        )
    }
}
