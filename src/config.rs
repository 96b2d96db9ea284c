//! Camera configuration loaded once at startup.
//!
//! The TOML file lists the cameras (name, card label pattern, archive directory,
//! media subdirectory) and optionally a backup drive layout. The archive base
//! is usually supplied by the environment so each machine can keep its own
//! archive.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::IngestError;

pub const ARCHIVE_BASE_ENV: &str = "CAM_REPOSITORY_COMMON_PATH";
pub const CONFIG_ENV: &str = "CAM_INGEST_CONFIG";

fn default_media_subdirectory() -> String {
    "DCIM".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub archive_base: Option<PathBuf>,
    #[serde(rename = "camera", default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub backup_drive: Option<BackupDriveConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraConfig {
    pub name: String,
    pub card_label_pattern: String,
    pub archive_directory: String,
    #[serde(default = "default_media_subdirectory")]
    pub media_subdirectory: String,
    /// A source that is always present, e.g. a phone mounted at a fixed path.
    #[serde(default)]
    pub fixed_source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupDriveConfig {
    pub label_pattern: String,
    #[serde(rename = "camera", default)]
    pub cameras: Vec<BackupCameraConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupCameraConfig {
    pub name: String,
    pub directory_pattern: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => IngestError::ConfigurationMissing(format!(
                "camera configuration file {} not found",
                path.display()
            )),
            _ => IngestError::Io(e),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, IngestError> {
        toml::from_str(text).map_err(|e| IngestError::InvalidConfiguration(e.to_string()))
    }

    /// Picks the archive base: explicit value (CLI or environment) first, then
    /// the config file.
    pub fn resolve_archive_base(&self, explicit: Option<PathBuf>) -> Result<PathBuf, IngestError> {
        explicit
            .or_else(|| self.archive_base.clone())
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                IngestError::ConfigurationMissing(format!(
                    "archive base is not set; define {ARCHIVE_BASE_ENV}, pass --archive-base, \
                     or set archive_base in the configuration file"
                ))
            })
    }

    /// Compiles the configured cameras against a resolved archive base.
    pub fn profiles(&self, archive_base: &Path) -> Result<Profiles, IngestError> {
        if self.cameras.is_empty() {
            return Err(IngestError::InvalidConfiguration(
                "no cameras configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut cameras = Vec::with_capacity(self.cameras.len());
        for cam in &self.cameras {
            if !seen.insert(cam.name.as_str()) {
                return Err(IngestError::InvalidConfiguration(format!(
                    "camera {:?} is defined twice",
                    cam.name
                )));
            }
            let mut profile = CameraProfile::new(
                &cam.name,
                &cam.card_label_pattern,
                archive_base.join(&cam.archive_directory),
                &cam.media_subdirectory,
            )?;
            profile.fixed_source = cam.fixed_source.clone();
            cameras.push(profile);
        }

        let backup_drive = match &self.backup_drive {
            Some(backup) => {
                let mut entries = Vec::with_capacity(backup.cameras.len());
                for entry in &backup.cameras {
                    let index = cameras
                        .iter()
                        .position(|c| c.name == entry.name)
                        .ok_or_else(|| {
                            IngestError::InvalidConfiguration(format!(
                                "backup drive refers to unknown camera {:?}",
                                entry.name
                            ))
                        })?;
                    entries.push((index, label_regex(&entry.directory_pattern)?));
                }
                Some(BackupDriveProfile {
                    label_pattern: label_regex(&backup.label_pattern)?,
                    cameras: entries,
                })
            }
            None => None,
        };

        Ok(Profiles {
            cameras,
            backup_drive,
        })
    }
}

fn label_regex(pattern: &str) -> Result<Regex, IngestError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| IngestError::InvalidConfiguration(format!("bad pattern {pattern:?}: {e}")))
}

/// Static identity of one physical camera.
#[derive(Debug, Clone)]
pub struct CameraProfile {
    pub name: String,
    pub card_label_pattern: Regex,
    /// Directory holding this camera's `YYYY-MM-DD` subdirectories.
    pub archive_root: PathBuf,
    /// Device directory under a source root, e.g. `DCIM`.
    pub media_subdirectory_name: PathBuf,
    pub fixed_source: Option<PathBuf>,
}

impl CameraProfile {
    pub fn new(
        name: &str,
        card_label_pattern: &str,
        archive_root: PathBuf,
        media_subdirectory: &str,
    ) -> Result<Self, IngestError> {
        let media_subdirectory_name: PathBuf = media_subdirectory
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .collect();
        if media_subdirectory_name.as_os_str().is_empty() {
            return Err(IngestError::InvalidConfiguration(format!(
                "camera {name:?} has an empty media subdirectory"
            )));
        }
        Ok(CameraProfile {
            name: name.to_string(),
            card_label_pattern: label_regex(card_label_pattern)?,
            archive_root,
            media_subdirectory_name,
            fixed_source: None,
        })
    }

    /// Case-insensitive search of the pattern in a volume label or directory name.
    pub fn matches_label(&self, label: &str) -> bool {
        self.card_label_pattern.is_match(label)
    }
}

#[derive(Debug, Clone)]
pub struct BackupDriveProfile {
    pub label_pattern: Regex,
    /// Index into [`Profiles::cameras`] paired with the top-level directory pattern.
    pub cameras: Vec<(usize, Regex)>,
}

#[derive(Debug, Clone)]
pub struct Profiles {
    pub cameras: Vec<CameraProfile>,
    pub backup_drive: Option<BackupDriveProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
archive_base = "/srv/cameras"

[[camera]]
name = "Nikon D500"
card_label_pattern = "d500"
archive_directory = "nikon-d500"

[[camera]]
name = "Phone"
card_label_pattern = "phone"
archive_directory = "phone"
media_subdirectory = "DCIM/Camera"
fixed_source = "/mnt/phone"

[backup_drive]
label_pattern = "travel"

[[backup_drive.camera]]
name = "Nikon D500"
directory_pattern = "d500"
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[0].media_subdirectory, "DCIM");

        let profiles = config.profiles(Path::new("/srv/cameras")).unwrap();
        let d500 = &profiles.cameras[0];
        assert_eq!(d500.archive_root, PathBuf::from("/srv/cameras/nikon-d500"));
        assert!(d500.matches_label("NIKON D500 "));
        assert!(!d500.matches_label("B700"));

        let phone = &profiles.cameras[1];
        assert_eq!(phone.media_subdirectory_name, Path::new("DCIM").join("Camera"));
        assert_eq!(phone.fixed_source, Some(PathBuf::from("/mnt/phone")));

        let backup = profiles.backup_drive.unwrap();
        assert!(backup.label_pattern.is_match("TRAVEL_DRIVE"));
        assert_eq!(backup.cameras[0].0, 0);
    }

    #[test]
    fn test_archive_base_resolution_order() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.resolve_archive_base(Some(PathBuf::from("/override"))).unwrap(),
            PathBuf::from("/override")
        );
        assert_eq!(
            config.resolve_archive_base(None).unwrap(),
            PathBuf::from("/srv/cameras")
        );
    }

    #[test]
    fn test_missing_archive_base_is_fatal() {
        let config = Config::from_toml_str(
            "[[camera]]\nname = \"a\"\ncard_label_pattern = \"a\"\narchive_directory = \"a\"\n",
        )
        .unwrap();
        let err = config.resolve_archive_base(None).unwrap_err();
        assert!(matches!(err, IngestError::ConfigurationMissing(_)));
        assert!(err.is_fatal());

        let err = config.resolve_archive_base(Some(PathBuf::new())).unwrap_err();
        assert!(matches!(err, IngestError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, IngestError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_invalid_configurations() {
        let dup = r#"
[[camera]]
name = "a"
card_label_pattern = "a"
archive_directory = "a"
[[camera]]
name = "a"
card_label_pattern = "b"
archive_directory = "b"
"#;
        let config = Config::from_toml_str(dup).unwrap();
        assert!(matches!(
            config.profiles(Path::new("/x")),
            Err(IngestError::InvalidConfiguration(_))
        ));

        let bad_regex = "[[camera]]\nname = \"a\"\ncard_label_pattern = \"(\"\narchive_directory = \"a\"\n";
        let config = Config::from_toml_str(bad_regex).unwrap();
        assert!(config.profiles(Path::new("/x")).is_err());

        let unknown_backup = r#"
[[camera]]
name = "a"
card_label_pattern = "a"
archive_directory = "a"
[backup_drive]
label_pattern = "travel"
[[backup_drive.camera]]
name = "b"
directory_pattern = "b"
"#;
        let config = Config::from_toml_str(unknown_backup).unwrap();
        assert!(config.profiles(Path::new("/x")).is_err());

        assert!(Config::from_toml_str("bogus_key = 1").is_err());
        assert!(Config::from_toml_str("").unwrap().profiles(Path::new("/x")).is_err());
    }
}
