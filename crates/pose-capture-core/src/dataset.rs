use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::error::Error;
use crate::indexer::parse_index;

/// Sample counts for one slot folder.
#[derive(Debug, Clone)]
pub struct SlotSummary {
    /// Relative to the dataset root.
    pub folder: PathBuf,
    pub pose: String,
    pub person: Option<String>,
    pub samples: usize,
    pub with_landmarks: usize,
    pub image_only: usize,
    /// Landmark files with no image for the same index.
    pub orphaned_landmarks: usize,
    /// `None` once index `u32::MAX` is taken.
    pub next_index: Option<u32>,
    pub last_capture: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetSummary {
    pub slots: Vec<SlotSummary>,
}

impl DatasetSummary {
    pub fn total_samples(&self) -> usize {
        self.slots.iter().map(|s| s.samples).sum()
    }

    pub fn total_orphans(&self) -> usize {
        self.slots.iter().map(|s| s.orphaned_landmarks).sum()
    }
}

#[derive(Default)]
struct IndexEntry {
    image: bool,
    landmarks: bool,
}

/// Walk `root` (`<root>/<pose>[/<person>]`) and summarize every folder that
/// holds samples for one of the configured poses.
pub fn summarize(root: &Path, config: &AppConfig) -> Result<DatasetSummary, Error> {
    let mut folders: BTreeMap<PathBuf, Vec<(String, Option<std::time::SystemTime>)>> =
        BTreeMap::new();

    if !root.is_dir() {
        debug!("Dataset root {} does not exist yet", root.display());
        return Ok(DatasetSummary::default());
    }

    for entry in WalkDir::new(root).min_depth(2).max_depth(3) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error walking {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(parent) = entry.path().parent() else {
            continue;
        };
        let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
        folders
            .entry(parent.to_path_buf())
            .or_default()
            .push((entry.file_name().to_string_lossy().into_owned(), modified));
    }

    let mut slots = Vec::new();
    for (folder, files) in folders {
        let Ok(relative) = folder.strip_prefix(root) else {
            continue;
        };
        let mut components = relative.components().map(|c| c.as_os_str().to_string_lossy());
        let Some(pose) = components.next().map(|c| c.into_owned()) else {
            continue;
        };
        if !config.poses.contains(&pose) {
            continue;
        }
        let person = components.next().map(|c| c.into_owned());

        let naming = config.file_naming.naming_for(&pose);

        let mut indices: BTreeMap<u32, IndexEntry> = BTreeMap::new();
        let mut last_capture = None;
        for (name, modified) in &files {
            let Some(index) = parse_index(name, &naming) else {
                continue;
            };
            let slot = indices.entry(index).or_default();
            if name.to_ascii_lowercase().ends_with(".json") {
                slot.landmarks = true;
            } else {
                slot.image = true;
            }
            if let Some(modified) = modified {
                last_capture = last_capture.max(Some(*modified));
            }
        }
        let Some(highest) = indices.keys().next_back().copied() else {
            continue;
        };

        slots.push(SlotSummary {
            folder: relative.to_path_buf(),
            pose,
            person,
            samples: indices.values().filter(|e| e.image).count(),
            with_landmarks: indices.values().filter(|e| e.image && e.landmarks).count(),
            image_only: indices.values().filter(|e| e.image && !e.landmarks).count(),
            orphaned_landmarks: indices.values().filter(|e| !e.image && e.landmarks).count(),
            next_index: highest.checked_add(1),
            last_capture: last_capture.map(DateTime::<Local>::from),
        });
    }

    Ok(DatasetSummary { slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_summarize_missing_root() {
        let tmp = tempdir().unwrap();
        let summary = summarize(&tmp.path().join("nope"), &AppConfig::default()).unwrap();
        assert!(summary.slots.is_empty());
    }

    #[test]
    fn test_summarize_counts_pairs_and_orphans() {
        let tmp = tempdir().unwrap();
        let pose1 = tmp.path().join("pose1");
        let person = tmp.path().join("pose2").join("person1");
        let unknown = tmp.path().join("scratch");
        fs::create_dir_all(&pose1).unwrap();
        fs::create_dir_all(&person).unwrap();
        fs::create_dir_all(&unknown).unwrap();

        fs::write(pose1.join("pose1_001.jpg"), b"x").unwrap();
        fs::write(pose1.join("pose1_001.json"), b"{}").unwrap();
        fs::write(pose1.join("pose1_002.jpg"), b"x").unwrap();
        fs::write(pose1.join("pose1_005.json"), b"{}").unwrap();
        fs::write(pose1.join("notes.txt"), b"x").unwrap();
        fs::write(person.join("pose2_003_raw.jpg"), b"x").unwrap();
        fs::write(person.join("pose2_003_nodes.jpg"), b"x").unwrap();
        fs::write(unknown.join("scratch_001.jpg"), b"x").unwrap();

        let summary = summarize(tmp.path(), &AppConfig::default()).unwrap();
        assert_eq!(summary.slots.len(), 2);

        let first = &summary.slots[0];
        assert_eq!(first.pose, "pose1");
        assert_eq!(first.person, None);
        assert_eq!(first.samples, 2);
        assert_eq!(first.with_landmarks, 1);
        assert_eq!(first.image_only, 1);
        assert_eq!(first.orphaned_landmarks, 1);
        assert_eq!(first.next_index, Some(6));
        assert!(first.last_capture.is_some());

        let second = &summary.slots[1];
        assert_eq!(second.folder, PathBuf::from("pose2").join("person1"));
        assert_eq!(second.person.as_deref(), Some("person1"));
        assert_eq!(second.samples, 1);
        assert_eq!(second.next_index, Some(4));

        assert_eq!(summary.total_samples(), 3);
        assert_eq!(summary.total_orphans(), 1);
    }
}
