//! Detection pipeline for the "ACCEPT" button.
//!
//! This module provides:
//! - Color segmentation of button-colored regions (`color`)
//! - OCR confirmation of candidate regions (`confirm`)
//! - Template matching fallback (`template`)
//!
//! `Detector::detect` chains the three stages on one frame.

pub mod color;
pub mod confirm;
pub mod template;

pub use color::{find_regions, ColorRange};
pub use confirm::TextConfirmer;
pub use template::TemplateMatcher;

use crate::automation::config::AcceptConfig;
use crate::capture::Frame;
use crate::ocr::TextRecognizer;

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Geometric center, rounded down.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_at_least(&self, min_width: u32, min_height: u32) -> bool {
        self.width >= min_width && self.height >= min_height
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Which stage of the pipeline produced a detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionPath {
    /// Color segmentation confirmed by OCR
    Color,
    /// Template matching fallback
    Template,
}

impl std::fmt::Display for DetectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionPath::Color => write!(f, "color detection"),
            DetectionPath::Template => write!(f, "template matching"),
        }
    }
}

/// Outcome of running the pipeline on one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionResult {
    Empty,
    Found { region: Region, path: DetectionPath },
}

/// The full color → OCR → template pipeline.
///
/// Holds only read-only configuration and the cached template; each call to
/// `detect` works on its own frame.
pub struct Detector<R: TextRecognizer> {
    color_range: ColorRange,
    confirmer: TextConfirmer,
    matcher: TemplateMatcher,
    recognizer: R,
}

impl<R: TextRecognizer> Detector<R> {
    pub fn new(config: &AcceptConfig, recognizer: R) -> Self {
        Self {
            color_range: config.color_range,
            confirmer: TextConfirmer::from_config(config),
            matcher: TemplateMatcher::from_config(config),
            recognizer,
        }
    }

    #[cfg(test)]
    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Runs the pipeline on `frame`.
    ///
    /// Color candidates are confirmed by OCR first; only if none is confirmed
    /// is the template matched against the same frame.
    pub fn detect(&self, frame: &Frame) -> DetectionResult {
        let regions = find_regions(frame, &self.color_range);
        if regions.is_empty() {
            tracing::debug!("No color regions detected.");
        } else if let Some(region) = self.confirmer.confirm(frame, &regions, &self.recognizer) {
            return DetectionResult::Found {
                region,
                path: DetectionPath::Color,
            };
        } else {
            tracing::debug!(
                "No '{}' button found in color regions.",
                self.confirmer.target_text()
            );
        }

        // Fall back to template matching on the same frame
        match self.matcher.find_in(frame) {
            Some(region) => DetectionResult::Found {
                region,
                path: DetectionPath::Template,
            },
            None => DetectionResult::Empty,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ocr::tests::ScriptedRecognizer;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::path::Path;

    pub const BUTTON_GREEN: Rgb<u8> = Rgb([52, 182, 81]);
    pub const BACKGROUND: Rgb<u8> = Rgb([30, 30, 30]);

    /// Deterministic high-entropy texture, used so a template matches only at its true offset.
    pub fn noise(x: u32, y: u32) -> u8 {
        let mut h = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263);
        h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
        (h >> 24) as u8
    }

    pub fn noise_template(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([noise(x, y)]))
    }

    pub fn contains(r: &Region, x: u32, y: u32) -> bool {
        x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height
    }

    /// Builds a frame with green rectangles and an optional grayscale patch at an offset.
    pub fn build_frame(
        w: u32,
        h: u32,
        rects: &[Region],
        patch: Option<(&GrayImage, u32, u32)>,
    ) -> Frame {
        let img = RgbImage::from_fn(w, h, |x, y| {
            if let Some((tpl, px, py)) = patch {
                if contains(&Region::new(px, py, tpl.width(), tpl.height()), x, y) {
                    let v = tpl.get_pixel(x - px, y - py)[0];
                    return Rgb([v, v, v]);
                }
            }
            if rects.iter().any(|r| contains(r, x, y)) {
                BUTTON_GREEN
            } else {
                BACKGROUND
            }
        });
        Frame::from_image(img)
    }

    pub fn config_with_template(path: &Path) -> AcceptConfig {
        AcceptConfig {
            template_path: path.to_path_buf(),
            ..AcceptConfig::default()
        }
    }

    #[test]
    fn test_region_center_rounds_down() {
        assert_eq!(Region::new(10, 20, 101, 31).center(), (60, 35));
        assert_eq!(Region::new(0, 0, 1, 1).center(), (0, 0));
    }

    #[test]
    fn test_color_path_returns_button_bounds() {
        let button = Region::new(60, 40, 160, 50);
        let frame = build_frame(400, 200, &[button], None);
        let config = config_with_template(Path::new("missing/accept.png"));
        let detector = Detector::new(&config, ScriptedRecognizer::always("ACCEPT"));

        let result = detector.detect(&frame);

        assert_eq!(
            result,
            DetectionResult::Found {
                region: button,
                path: DetectionPath::Color
            }
        );
        assert_eq!(detector.recognizer().calls().len(), 1);
    }

    #[test]
    fn test_falls_back_to_template_when_text_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("accept.png");
        let template = noise_template(40, 24);
        template.save(&template_path).unwrap();

        let decoy = Region::new(10, 10, 150, 40);
        let frame = build_frame(320, 200, &[decoy], Some((&template, 200, 120)));
        let detector = Detector::new(
            &config_with_template(&template_path),
            ScriptedRecognizer::always("DECLINE"),
        );

        let result = detector.detect(&frame);

        assert_eq!(
            result,
            DetectionResult::Found {
                region: Region::new(200, 120, 40, 24),
                path: DetectionPath::Template
            }
        );
        // The decoy was checked by OCR before falling back
        assert_eq!(detector.recognizer().calls().len(), 1);
    }

    #[test]
    fn test_empty_when_nothing_matches() {
        let frame = build_frame(200, 100, &[], None);
        let detector = Detector::new(
            &config_with_template(Path::new("missing/accept.png")),
            ScriptedRecognizer::always("ACCEPT"),
        );

        assert_eq!(detector.detect(&frame), DetectionResult::Empty);
        assert!(detector.recognizer().calls().is_empty());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("accept.png");
        let template = noise_template(30, 20);
        template.save(&template_path).unwrap();

        let rects = [Region::new(5, 5, 120, 40), Region::new(5, 100, 130, 45)];
        let frame = build_frame(300, 200, &rects, Some((&template, 180, 60)));
        let config = config_with_template(&template_path);

        let first = Detector::new(&config, ScriptedRecognizer::always("")).detect(&frame);
        let second = Detector::new(&config, ScriptedRecognizer::always("")).detect(&frame);

        assert_eq!(first, second);
        assert_eq!(
            first,
            DetectionResult::Found {
                region: Region::new(180, 60, 30, 20),
                path: DetectionPath::Template
            }
        );
    }
}
