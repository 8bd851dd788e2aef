use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::sampler::SamplingMethod;
use crate::error::CaptureError;

const CONFIG_DIR_NAME: &str = "camreel";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: i32,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Pixel format requested from the device, e.g. "MJPG".
    pub fourcc: String,
    pub buffer_size: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 2,
            width: 3840,
            height: 2160,
            fps: 31.0,
            fourcc: "MJPG".to_string(),
            buffer_size: 1,
        }
    }
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    pub output_dir: PathBuf,
    pub codec: String,
    pub container: String,
    /// Measured fps is refreshed every this many recorded frames.
    pub stats_interval: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Recordings"),
            codec: "XVID".to_string(),
            container: "avi".to_string(),
            stats_interval: 31,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub images_dir: PathBuf,
    pub image_count: usize,
    pub method: SamplingMethod,
    /// Stride used by the `interval` method.
    pub frame_interval: usize,
    pub jpeg_quality: i32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("Images"),
            image_count: 100,
            method: SamplingMethod::EvenlySpaced,
            frame_interval: 30,
            jpeg_quality: 95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    pub refresh_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            refresh_ms: 16,
            join_timeout_ms: 1000,
        }
    }
}

impl PreviewConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: [".png", ".jpg", ".jpeg", ".gif", ".bmp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub recording: RecordingConfig,
    pub extraction: ExtractionConfig,
    pub preview: PreviewConfig,
    pub viewer: ViewerConfig,
}

impl AppConfig {
    /// Default location: `<config dir>/camreel/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path, else from the default location if a file
    /// exists there, else fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => {
                    log::debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        let invalid = |msg: &str| Err(CaptureError::InvalidConfig(msg.to_string()));

        if !(self.camera.fps > 0.0) {
            return invalid("camera.fps must be positive");
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return invalid("camera resolution must be non-zero");
        }
        if self.preview.width == 0 || self.preview.height == 0 {
            return invalid("preview size must be non-zero");
        }
        if self.preview.refresh_ms == 0 {
            return invalid("preview.refresh_ms must be non-zero");
        }
        if !is_fourcc(&self.camera.fourcc) {
            return invalid("camera.fourcc must be four ASCII characters");
        }
        if !is_fourcc(&self.recording.codec) {
            return invalid("recording.codec must be four ASCII characters");
        }
        if self.recording.stats_interval == 0 {
            return invalid("recording.stats_interval must be non-zero");
        }
        if self.extraction.image_count == 0 {
            return invalid("extraction.image_count must be non-zero");
        }
        if self.extraction.frame_interval == 0 {
            return invalid("extraction.frame_interval must be non-zero");
        }
        if !(0..=100).contains(&self.extraction.jpeg_quality) {
            return invalid("extraction.jpeg_quality must be within 0..=100");
        }
        Ok(())
    }
}

fn is_fourcc(tag: &str) -> bool {
    tag.len() == 4 && tag.is_ascii()
}

/// Split a four character code into the chars OpenCV expects.
pub fn fourcc_chars(tag: &str) -> Result<[char; 4], CaptureError> {
    let chars: Vec<char> = tag.chars().collect();
    match chars.as_slice() {
        [a, b, c, d] => Ok([*a, *b, *c, *d]),
        _ => Err(CaptureError::InvalidConfig(format!("bad fourcc {:?}", tag))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recorder_constants() {
        let config = AppConfig::default();
        assert_eq!(config.camera.device_index, 2);
        assert_eq!((config.camera.width, config.camera.height), (3840, 2160));
        assert_eq!(config.camera.fps, 31.0);
        assert_eq!(config.recording.codec, "XVID");
        assert_eq!(config.extraction.image_count, 100);
        assert_eq!(config.extraction.method, SamplingMethod::EvenlySpaced);
        assert_eq!(config.extraction.jpeg_quality, 95);
        assert_eq!((config.preview.width, config.preview.height), (960, 540));
        assert_eq!(config.viewer.max_file_size, 50 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let json = r#"{ "camera": { "device_index": 0 }, "extraction": { "image_count": 5, "method": "interval" } }"#;
        let config: AppConfig = serde_json::from_str(json).expect("Failed to parse partial config");
        assert_eq!(config.camera.device_index, 0);
        assert_eq!(config.camera.fps, 31.0);
        assert_eq!(config.extraction.image_count, 5);
        assert_eq!(config.extraction.method, SamplingMethod::Interval);
        assert_eq!(config.extraction.frame_interval, 30);
        assert_eq!(config.recording, RecordingConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.extraction.image_count = 12;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("absent.json"))).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.extraction.jpeg_quality = 101;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recording.codec = "XVID2".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.camera.fps = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.extraction.frame_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fourcc_chars() {
        assert_eq!(fourcc_chars("MJPG").unwrap(), ['M', 'J', 'P', 'G']);
        assert!(fourcc_chars("MJP").is_err());
    }
}
