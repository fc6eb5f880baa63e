pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::{Tesseract, TextRecognizer, TEMP_FILE_PREFIX};
pub use preprocess::{prepare_for_ocr, PreprocessOptions};
pub use setup::ensure_tesseract;

#[cfg(test)]
pub(crate) mod tests {
    use anyhow::{anyhow, Result};
    use image::GrayImage;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::TextRecognizer;

    /// Test double that replays scripted OCR output and records every image size it sees.
    pub struct ScriptedRecognizer {
        responses: RefCell<VecDeque<Result<String, String>>>,
        fallback: String,
        calls: RefCell<Vec<(u32, u32)>>,
    }

    impl ScriptedRecognizer {
        /// Returns `text` for every call.
        pub fn always(text: &str) -> Self {
            Self::scripted(Vec::new(), text)
        }

        /// Returns the scripted responses in order, then `fallback`.
        pub fn scripted(responses: Vec<Result<String, String>>, fallback: &str) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                fallback: fallback.to_string(),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(u32, u32)> {
            self.calls.borrow().clone()
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize_text(&self, img: &GrayImage) -> Result<String> {
            self.calls.borrow_mut().push(img.dimensions());
            match self.responses.borrow_mut().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(anyhow!(msg)),
                None => Ok(self.fallback.clone()),
            }
        }
    }
}
