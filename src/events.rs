//! Structured events emitted while cataloging and merging.
//!
//! The core never renders anything itself. A presentation layer (the CLI log
//! output here) implements [`EventSink`] and decides how events look.

use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum IngestEvent {
    Found {
        camera: String,
        path: PathBuf,
    },
    SkipNonconforming {
        camera: String,
        path: PathBuf,
    },
    Copied {
        camera: String,
        src: PathBuf,
        dst: PathBuf,
    },
    SkipExists {
        camera: String,
        dst: PathBuf,
    },
    Error {
        camera: String,
        path: PathBuf,
        message: String,
    },
}

impl IngestEvent {
    pub fn camera(&self) -> &str {
        match self {
            IngestEvent::Found { camera, .. }
            | IngestEvent::SkipNonconforming { camera, .. }
            | IngestEvent::Copied { camera, .. }
            | IngestEvent::SkipExists { camera, .. }
            | IngestEvent::Error { camera, .. } => camera,
        }
    }
}

pub trait EventSink {
    fn emit(&mut self, event: IngestEvent);
}

/// Collects events in memory.
impl EventSink for Vec<IngestEvent> {
    fn emit(&mut self, event: IngestEvent) {
        self.push(event);
    }
}

/// Renders events through the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: IngestEvent) {
        match &event {
            IngestEvent::Found { camera, path } => {
                log::debug!("[{}] found {}", camera, path.display())
            }
            IngestEvent::SkipNonconforming { camera, path } => {
                log::info!("[{}] skipping {}", camera, path.display())
            }
            IngestEvent::Copied { camera, src, dst } => {
                log::info!("[{}] {} \u{279C} {}", camera, src.display(), dst.display())
            }
            IngestEvent::SkipExists { camera, dst } => {
                log::info!("[{}] {} exists - skipping", camera, dst.display())
            }
            IngestEvent::Error {
                camera,
                path,
                message,
            } => log::warn!("[{}] {}: {}", camera, path.display(), message),
        }
    }
}
