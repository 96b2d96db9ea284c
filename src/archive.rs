//! Archive directory housekeeping: the common base, per-camera roots and the
//! `YYYY-MM-DD` directory that receives today's copies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::config::CameraProfile;
use crate::error::IngestError;

/// Checks the archive base exists, creating it only when asked to. A missing
/// base usually means a wrong setting, so it is not created silently.
pub fn prepare_archive_base(base: &Path, create: bool) -> Result<(), IngestError> {
    if base.is_dir() {
        return Ok(());
    }
    if !create {
        return Err(IngestError::ArchiveBaseMissing(base.to_path_buf()));
    }
    log::info!("creating archive base {}", base.display());
    fs::create_dir_all(base)?;
    Ok(())
}

/// Creates the camera's archive root if this is its first run.
pub fn ensure_camera_root(profile: &CameraProfile) -> io::Result<()> {
    if !profile.archive_root.is_dir() {
        log::info!(
            "[{}] creating archive root {}",
            profile.name,
            profile.archive_root.display()
        );
        fs::create_dir_all(&profile.archive_root)?;
    }
    Ok(())
}

pub fn today_dir_name(today: NaiveDate) -> String {
    today.format("%Y-%m-%d").to_string()
}

/// Creates `archive_root/YYYY-MM-DD` unless it already exists (an earlier
/// card of the same camera today).
pub fn create_today_dir(profile: &CameraProfile, today: NaiveDate) -> io::Result<PathBuf> {
    let dir = profile.archive_root.join(today_dir_name(today));
    if dir.is_dir() {
        log::info!("[{}] repository dir {} already exists", profile.name, dir.display());
    } else {
        fs::create_dir(&dir)?;
        log::info!("[{}] making repository dir {}", profile.name, dir.display());
    }
    Ok(dir)
}

/// Removes `dir` if nothing was copied into it. Returns whether it was removed.
pub fn remove_if_empty(dir: &Path) -> io::Result<bool> {
    if !dir.is_dir() || fs::read_dir(dir)?.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir)?;
    log::debug!("removed empty directory {}", dir.display());
    Ok(true)
}
