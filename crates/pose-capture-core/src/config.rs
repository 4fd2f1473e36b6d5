use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::indexer::SampleNaming;
use crate::landmarks::LandmarkSchema;
use crate::writer::ImageVariant;

/// Digit keys `1`..`9` select poses.
pub const MAX_POSES: usize = 9;
/// Function keys `F1`..`F12` select persons.
pub const MAX_PERSONS: u32 = 12;

/// How a held or pressed capture key turns into writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// One sample per key press.
    Manual,
    /// Stream samples while the key is held down.
    Hold,
    /// Key press toggles a paced burst that runs until the quota is reached.
    Burst,
}

/// Filename convention for samples inside a slot folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileNaming {
    /// `<pose>_<index:03>.jpg`
    Prefixed,
    /// `<index:03>.jpg`
    Bare,
}

impl FileNaming {
    /// Naming of the sample files inside the folders of `pose`.
    pub fn naming_for(self, pose: &str) -> SampleNaming {
        match self {
            FileNaming::Prefixed => SampleNaming::Prefixed(pose.to_string()),
            FileNaming::Bare => SampleNaming::Bare,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: usize,
    pub width: u32,
    pub height: u32,
    /// Replay images from this folder instead of opening a device.
    pub replay_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            replay_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Program and arguments of an external landmark detector.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dataset_root: PathBuf,
    pub poses: Vec<String>,
    pub max_samples: u32,
    /// 0 disables the person dimension.
    pub max_persons: u32,
    pub person_prefix: String,
    pub capture_delay_ms: u64,
    pub capture_mode: CaptureMode,
    pub file_naming: FileNaming,
    pub image_variant: ImageVariant,
    pub landmark_schema: LandmarkSchema,
    pub jpeg_quality: u8,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("dataset"),
            poses: (1..=6).map(|n| format!("pose{}", n)).collect(),
            max_samples: 300,
            max_persons: 0,
            person_prefix: "person".to_string(),
            capture_delay_ms: 150,
            capture_mode: CaptureMode::Manual,
            file_naming: FileNaming::Prefixed,
            image_variant: ImageVariant::Raw,
            landmark_schema: LandmarkSchema::Holistic,
            jpeg_quality: 90,
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay_ms)
    }

    /// Folder name for a 1-based person id.
    pub fn person_name(&self, person: u32) -> String {
        format!("{}{}", self.person_prefix, person)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.poses.is_empty() {
            return Err(Error::InvalidConfig("at least one pose is required".into()));
        }
        if self.poses.len() > MAX_POSES {
            return Err(Error::InvalidConfig(format!(
                "{} poses configured, at most {} can be bound to digit keys",
                self.poses.len(),
                MAX_POSES
            )));
        }

        let mut seen = HashSet::new();
        for pose in &self.poses {
            if !is_safe_folder_name(pose) {
                return Err(Error::InvalidConfig(format!(
                    "pose name '{}' is not usable as a folder name",
                    pose
                )));
            }
            if !seen.insert(pose.as_str()) {
                return Err(Error::InvalidConfig(format!("duplicate pose name '{}'", pose)));
            }
        }

        if self.max_persons > 0 && !is_safe_folder_name(&self.person_name(1)) {
            return Err(Error::InvalidConfig(format!(
                "person prefix '{}' is not usable as a folder name",
                self.person_prefix
            )));
        }
        if self.max_samples == 0 {
            return Err(Error::InvalidConfig("max_samples must be at least 1".into()));
        }
        if self.max_persons > MAX_PERSONS {
            return Err(Error::InvalidConfig(format!(
                "{} persons configured, at most {} can be bound to function keys",
                self.max_persons, MAX_PERSONS
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidConfig(format!(
                "jpeg_quality {} is outside 1..=100",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

fn is_safe_folder_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

/// Load `Config.toml` (optional) overlaid with `POSE_CAPTURE__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("POSE_CAPTURE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("poses")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
