//! OCR confirmation of color candidates.

use super::Region;
use crate::automation::config::AcceptConfig;
use crate::capture::Frame;
use crate::ocr::{prepare_for_ocr, PreprocessOptions, TextRecognizer};

/// Confirms which candidate region carries the target text.
#[derive(Clone, Debug)]
pub struct TextConfirmer {
    target_text: String,
    min_width: u32,
    min_height: u32,
    preprocess: PreprocessOptions,
}

impl TextConfirmer {
    pub fn new(
        target_text: &str,
        min_width: u32,
        min_height: u32,
        preprocess: PreprocessOptions,
    ) -> Self {
        Self {
            target_text: target_text.to_uppercase(),
            min_width,
            min_height,
            preprocess,
        }
    }

    pub fn from_config(config: &AcceptConfig) -> Self {
        Self::new(
            &config.target_text,
            config.min_region_width,
            config.min_region_height,
            config.preprocess_options(),
        )
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    /// Returns the first region, in the given order, whose OCR text contains the target.
    ///
    /// Regions below the minimum size are skipped without running OCR. A
    /// region whose preprocessing or OCR fails is skipped; scanning continues
    /// with the next one.
    pub fn confirm(
        &self,
        frame: &Frame,
        regions: &[Region],
        recognizer: &dyn TextRecognizer,
    ) -> Option<Region> {
        for region in regions {
            if !region.is_at_least(self.min_width, self.min_height) {
                tracing::trace!("Ignoring small region at {}", region);
                continue;
            }

            tracing::debug!("Checking area at {}", region);
            let cropped = frame.crop(region);

            let processed = match prepare_for_ocr(&cropped, &self.preprocess) {
                Ok(img) => img,
                Err(e) => {
                    tracing::error!("Error preprocessing region {}: {}", region, e);
                    continue;
                }
            };

            let text = match recognizer.recognize_text(&processed) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("OCR failed for region {}: {}", region, e);
                    continue;
                }
            };
            tracing::debug!("OCR Result: {:?}", text.trim());

            if self.matches(&text) {
                tracing::info!("Found '{}' button at {}", self.target_text, region);
                return Some(*region);
            }
        }

        None
    }

    /// Case-insensitive substring match; OCR noise around the word is tolerated.
    pub fn matches(&self, text: &str) -> bool {
        text.to_uppercase().contains(&self.target_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::tests::build_frame;
    use crate::ocr::tests::ScriptedRecognizer;

    fn confirmer() -> TextConfirmer {
        TextConfirmer::new("Accept", 100, 30, PreprocessOptions::default())
    }

    #[test]
    fn test_small_regions_are_not_sent_to_ocr() {
        let small = Region::new(10, 10, 99, 40);
        let short = Region::new(10, 70, 150, 29);
        let frame = build_frame(300, 120, &[small, short], None);
        let recognizer = ScriptedRecognizer::always("ACCEPT");

        let found = confirmer().confirm(&frame, &[small, short], &recognizer);

        assert_eq!(found, None);
        assert!(recognizer.calls().is_empty());
    }

    #[test]
    fn test_ocr_sees_upscaled_crop() {
        let region = Region::new(20, 20, 120, 40);
        let frame = build_frame(200, 100, &[region], None);
        let recognizer = ScriptedRecognizer::always("ACCEPT");

        let found = confirmer().confirm(&frame, &[region], &recognizer);

        assert_eq!(found, Some(region));
        assert_eq!(recognizer.calls(), vec![(240, 80)]);
    }

    #[test]
    fn test_first_match_short_circuits() {
        let first = Region::new(0, 0, 120, 40);
        let second = Region::new(0, 50, 120, 40);
        let frame = build_frame(200, 100, &[first, second], None);
        let recognizer = ScriptedRecognizer::always("ACCEPT");

        let found = confirmer().confirm(&frame, &[first, second], &recognizer);

        assert_eq!(found, Some(first));
        assert_eq!(recognizer.calls().len(), 1);
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let c = confirmer();
        assert!(c.matches("  accept!\n"));
        assert!(c.matches("|ACCEPTI"));
        assert!(!c.matches("ACCE PT"));
        assert!(!c.matches(""));
    }

    #[test]
    fn test_ocr_failure_skips_only_that_region() {
        let first = Region::new(0, 0, 120, 40);
        let second = Region::new(0, 50, 120, 40);
        let frame = build_frame(200, 100, &[first, second], None);
        let recognizer = ScriptedRecognizer::scripted(
            vec![Err("tesseract crashed".to_string()), Ok("ACCEPT".to_string())],
            "",
        );

        let found = confirmer().confirm(&frame, &[first, second], &recognizer);

        assert_eq!(found, Some(second));
        assert_eq!(recognizer.calls().len(), 2);
    }

    #[test]
    fn test_no_matching_text_returns_none() {
        let region = Region::new(0, 0, 150, 50);
        let frame = build_frame(200, 100, &[region], None);
        let recognizer = ScriptedRecognizer::always("DECLINE");

        assert_eq!(confirmer().confirm(&frame, &[region], &recognizer), None);
    }
}
