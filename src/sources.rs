//! Assigns source roots (cards, backup drives, fixed paths) to cameras.

use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::MediaRecord;
use crate::config::Profiles;
use crate::error::IngestError;
use crate::frontier::ArchiveFrontier;

/// Run-scoped state of one camera. The matching [`crate::config::CameraProfile`]
/// stays untouched; everything discovered during the run lives here.
#[derive(Debug, Clone, Default)]
pub struct CameraRunState {
    pub source_roots: Vec<PathBuf>,
    pub today_dir: Option<PathBuf>,
    pub frontier: Option<ArchiveFrontier>,
    pub records: Vec<MediaRecord>,
}

impl CameraRunState {
    pub fn has_sources(&self) -> bool {
        !self.source_roots.is_empty()
    }

    fn add_source(&mut self, root: PathBuf) {
        if !self.source_roots.contains(&root) {
            self.source_roots.push(root);
        }
    }
}

/// The name a root is matched by: its last path component, which is the
/// volume label for a mounted card. Falls back to the whole path.
pub fn source_label(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

/// Returns one state per configured camera, in configuration order, with the
/// source roots that belong to it.
///
/// A root matching more than one camera is skipped with an
/// [`IngestError::AmbiguousSource`] warning.
pub fn assign_sources(profiles: &Profiles, roots: &[PathBuf]) -> Vec<CameraRunState> {
    let mut states = vec![CameraRunState::default(); profiles.cameras.len()];

    for root in roots {
        let label = source_label(root);

        if let Some(backup) = &profiles.backup_drive
            && backup.label_pattern.is_match(&label)
        {
            log::info!("{} is a backup drive", root.display());
            let dirs = match fs::read_dir(root) {
                Ok(listing) => listing,
                Err(source) => {
                    log::warn!(
                        "{}",
                        IngestError::UnreadableDirectory {
                            path: root.clone(),
                            source
                        }
                    );
                    continue;
                }
            };
            let mut dir_names: Vec<String> = dirs
                .flatten()
                .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .filter_map(|e| e.file_name().into_string().ok())
                .collect();
            dir_names.sort();
            for dir_name in dir_names {
                let matches: Vec<usize> = backup
                    .cameras
                    .iter()
                    .filter(|(_, pattern)| pattern.is_match(&dir_name))
                    .map(|(index, _)| *index)
                    .collect();
                assign_one(profiles, &mut states, root.join(&dir_name), &matches);
            }
            continue;
        }

        let matches: Vec<usize> = profiles
            .cameras
            .iter()
            .enumerate()
            .filter(|(_, cam)| cam.matches_label(&label))
            .map(|(index, _)| index)
            .collect();
        if matches.is_empty() {
            log::warn!("{} does not match any configured camera", root.display());
            continue;
        }
        assign_one(profiles, &mut states, root.clone(), &matches);
    }

    for (profile, state) in profiles.cameras.iter().zip(states.iter_mut()) {
        if let Some(fixed) = &profile.fixed_source {
            if fixed.is_dir() {
                state.add_source(fixed.clone());
            } else {
                log::debug!("[{}] fixed source {} not present", profile.name, fixed.display());
            }
        }
    }

    states
}

fn assign_one(profiles: &Profiles, states: &mut [CameraRunState], root: PathBuf, matches: &[usize]) {
    match matches {
        [] => {}
        [index] => {
            log::info!("[{}] source {}", profiles.cameras[*index].name, root.display());
            states[*index].add_source(root);
        }
        _ => {
            let err = IngestError::AmbiguousSource {
                path: root,
                cameras: matches
                    .iter()
                    .map(|i| profiles.cameras[*i].name.clone())
                    .collect(),
            };
            log::warn!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn profiles(fixed: Option<&Path>) -> Profiles {
        let fixed_line = fixed
            .map(|p| format!("fixed_source = {:?}\n", p.to_string_lossy()))
            .unwrap_or_default();
        let text = format!(
            r#"
[[camera]]
name = "Nikon D500"
card_label_pattern = "d500"
archive_directory = "nikon-d500"

[[camera]]
name = "Nikon Coolpix B700"
card_label_pattern = "b700"
archive_directory = "nikon-b700"

[[camera]]
name = "Phone"
card_label_pattern = "phone"
archive_directory = "phone"
media_subdirectory = "DCIM/Camera"
{fixed_line}
[backup_drive]
label_pattern = "travel"

[[backup_drive.camera]]
name = "Nikon D500"
directory_pattern = "d500"

[[backup_drive.camera]]
name = "Nikon Coolpix B700"
directory_pattern = "b700"
"#
        );
        Config::from_toml_str(&text)
            .unwrap()
            .profiles(Path::new("/archive"))
            .unwrap()
    }

    #[test]
    fn test_cards_match_by_label() {
        let media = TempDir::new().unwrap();
        let sd = media.path().join("NIKON D500");
        let xqd = media.path().join("D500_XQD");
        let b700 = media.path().join("B700");
        let unknown = media.path().join("USB STICK");
        let states = assign_sources(
            &profiles(None),
            &[sd.clone(), xqd.clone(), b700.clone(), unknown, sd.clone()],
        );
        assert_eq!(states[0].source_roots, vec![sd, xqd]);
        assert_eq!(states[1].source_roots, vec![b700]);
        assert!(!states[2].has_sources());
    }

    #[test]
    fn test_ambiguous_label_is_skipped() {
        let states = assign_sources(&profiles(None), &[PathBuf::from("/media/d500-b700")]);
        assert!(states.iter().all(|s| !s.has_sources()));
    }

    #[test]
    fn test_backup_drive_expands_camera_directories() {
        let media = TempDir::new().unwrap();
        let drive = media.path().join("Travel_Drive");
        fs::create_dir_all(drive.join("d500").join("DCIM")).unwrap();
        fs::create_dir_all(drive.join("b700").join("DCIM")).unwrap();
        fs::create_dir_all(drive.join("misc")).unwrap();

        let states = assign_sources(&profiles(None), &[drive.clone()]);
        assert_eq!(states[0].source_roots, vec![drive.join("d500")]);
        assert_eq!(states[1].source_roots, vec![drive.join("b700")]);
    }

    #[test]
    fn test_fixed_source_is_added_when_present() {
        let phone = TempDir::new().unwrap();
        let states = assign_sources(&profiles(Some(phone.path())), &[]);
        assert_eq!(states[2].source_roots, vec![phone.path().to_path_buf()]);

        let states = assign_sources(&profiles(Some(&phone.path().join("missing"))), &[]);
        assert!(!states[2].has_sources());
    }

    #[test]
    fn test_source_label() {
        assert_eq!(source_label(Path::new("/media/me/NIKON D500")), "NIKON D500");
        assert_eq!(source_label(Path::new("/")), "/");
    }
}
