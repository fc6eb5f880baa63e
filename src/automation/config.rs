//! Configuration types for the scanner.
//!
//! Loads settings from config.json at startup. Provides the button color,
//! size and correlation thresholds, OCR settings, and timing parameters.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detection::ColorRange;
use crate::ocr::PreprocessOptions;

/// Complete scanner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptConfig {
    /// Text the button must contain (case-insensitive substring)
    #[serde(default = "default_target_text")]
    pub target_text: String,
    /// HSV range of the button color
    #[serde(default)]
    pub color_range: ColorRange,
    /// Candidate regions narrower than this are treated as noise
    #[serde(default = "default_min_region_width")]
    pub min_region_width: u32,
    /// Candidate regions shorter than this are treated as noise
    #[serde(default = "default_min_region_height")]
    pub min_region_height: u32,
    /// Upscale factor applied to a crop before OCR
    #[serde(default = "default_ocr_scale")]
    pub ocr_scale: f32,
    /// Neighborhood size for adaptive thresholding (odd)
    #[serde(default = "default_threshold_block_size")]
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean during adaptive thresholding
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: i32,
    /// Reference image for the template fallback
    #[serde(default = "default_template_path")]
    pub template_path: PathBuf,
    /// Minimum normalized correlation for a template hit (-1.0 to 1.0)
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    /// Pause between unsuccessful scan iterations (milliseconds)
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// Explicit Tesseract executable; searched for when unset
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// Tesseract page segmentation mode (6 = single uniform block of text)
    #[serde(default = "default_page_segmentation_mode")]
    pub page_segmentation_mode: u8,
    /// Tesseract OCR engine mode (3 = default engine)
    #[serde(default = "default_engine_mode")]
    pub engine_mode: u8,
    /// Letter or digit that starts a scan
    #[serde(default = "default_trigger_key")]
    pub trigger_key: char,
    /// Remove this program's leftover temp files after a successful click
    #[serde(default = "default_cleanup_temp_files")]
    pub cleanup_temp_files: bool,
    /// Delay before cleanup (milliseconds)
    #[serde(default = "default_cleanup_delay_ms")]
    pub cleanup_delay_ms: u64,
    /// Save the frame in which the button was found, with the hit outlined
    #[serde(default)]
    pub save_debug_frames: bool,
}

fn default_target_text() -> String {
    "ACCEPT".to_string()
}

fn default_min_region_width() -> u32 {
    100
}

fn default_min_region_height() -> u32 {
    30
}

fn default_ocr_scale() -> f32 {
    2.0
}

fn default_threshold_block_size() -> u32 {
    11
}

fn default_threshold_offset() -> i32 {
    2
}

fn default_template_path() -> PathBuf {
    crate::paths::get_resources_dir().join("accept.png")
}

fn default_match_threshold() -> f64 {
    0.8
}

fn default_scan_interval_ms() -> u64 {
    1000
}

fn default_page_segmentation_mode() -> u8 {
    6
}

fn default_engine_mode() -> u8 {
    3
}

fn default_trigger_key() -> char {
    'P'
}

fn default_cleanup_temp_files() -> bool {
    true
}

fn default_cleanup_delay_ms() -> u64 {
    3000
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            target_text: default_target_text(),
            color_range: ColorRange::default(),
            min_region_width: default_min_region_width(),
            min_region_height: default_min_region_height(),
            ocr_scale: default_ocr_scale(),
            threshold_block_size: default_threshold_block_size(),
            threshold_offset: default_threshold_offset(),
            template_path: default_template_path(),
            match_threshold: default_match_threshold(),
            scan_interval_ms: default_scan_interval_ms(),
            tesseract_path: None,
            page_segmentation_mode: default_page_segmentation_mode(),
            engine_mode: default_engine_mode(),
            trigger_key: default_trigger_key(),
            cleanup_temp_files: default_cleanup_temp_files(),
            cleanup_delay_ms: default_cleanup_delay_ms(),
            save_debug_frames: false,
        }
    }
}

impl AcceptConfig {
    /// Loads configuration from `path`, or returns defaults if the file is
    /// missing or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        tracing::info!("Looking for config at: {}", path.display());

        if !path.exists() {
            tracing::info!("{} not found. Using default config.", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn preprocess_options(&self) -> PreprocessOptions {
        PreprocessOptions {
            scale: self.ocr_scale,
            block_size: self.threshold_block_size,
            offset: self.threshold_offset,
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AcceptConfig::default();
        assert_eq!(config.target_text, "ACCEPT");
        assert_eq!(config.color_range.lower, [50, 100, 100]);
        assert_eq!(config.color_range.upper, [80, 255, 255]);
        assert_eq!((config.min_region_width, config.min_region_height), (100, 30));
        assert_eq!(config.match_threshold, 0.8);
        assert_eq!(config.scan_interval(), Duration::from_secs(1));
        assert_eq!(config.preprocess_options(), PreprocessOptions::default());
        assert!(config.template_path.ends_with("accept.png"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "target_text": "JOIN",
            "color_range": { "lower": [90, 80, 80], "upper": [130, 255, 255] },
            "match_threshold": 0.9
        }"#;
        let config: AcceptConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.target_text, "JOIN");
        assert_eq!(config.color_range.lower, [90, 80, 80]);
        assert_eq!(config.match_threshold, 0.9);
        assert_eq!(config.min_region_width, 100);
        assert_eq!(config.trigger_key, 'P');
        assert!(config.tesseract_path.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "scan_interval_ms": 250, "trigger_key": "F" }"#).unwrap();

        let config = AcceptConfig::load(&path);
        assert_eq!(config.scan_interval(), Duration::from_millis(250));
        assert_eq!(config.trigger_key, 'F');
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let missing = AcceptConfig::load(&dir.path().join("missing.json"));
        assert_eq!(missing.target_text, "ACCEPT");

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let broken = AcceptConfig::load(&path);
        assert_eq!(broken.scan_interval_ms, 1000);
    }
}
