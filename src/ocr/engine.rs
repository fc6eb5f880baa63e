use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use super::setup::TesseractPaths;
use crate::automation::config::AcceptConfig;

/// Prefix of every temporary file this program creates, used by post-run cleanup.
pub const TEMP_FILE_PREFIX: &str = "accept-clicker-";

/// Black-box text recognition on a binarized image.
pub trait TextRecognizer {
    /// Returns all text recognized in `img`.
    fn recognize_text(&self, img: &GrayImage) -> Result<String>;
}

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Tesseract command-line engine.
#[derive(Debug, Clone)]
pub struct Tesseract {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    page_segmentation_mode: u8,
    engine_mode: u8,
}

impl Tesseract {
    pub fn new(paths: TesseractPaths, page_segmentation_mode: u8, engine_mode: u8) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            page_segmentation_mode,
            engine_mode,
        }
    }

    /// Locates Tesseract using the configured path or the usual search order.
    ///
    /// If no installation is found, falls back to invoking `tesseract` from
    /// `PATH` so the scan can still run; OCR calls will then fail per region
    /// and the template fallback takes over.
    pub fn from_config(config: &AcceptConfig) -> Self {
        let paths = match super::ensure_tesseract(config.tesseract_path.as_deref()) {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!("Failed to set up Tesseract: {}", e);
                tracing::warn!("OCR confirmation will not work; relying on template matching.");
                TesseractPaths::fallback()
            }
        };
        Self::new(paths, config.page_segmentation_mode, config.engine_mode)
    }

    fn options(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(tessdata) = &self.tessdata {
            args.push("--tessdata-dir".into());
            args.push(tessdata.into());
        }
        args.push("-l".into());
        args.push("eng".into());
        args.push("--psm".into());
        args.push(self.page_segmentation_mode.to_string().into());
        args.push("--oem".into());
        args.push(self.engine_mode.to_string().into());
        args
    }

    /// Runs Tesseract on a preprocessed grayscale image.
    /// Returns structured output with lines and confidence scores.
    pub fn recognize_lines(&self, img: &GrayImage) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(".png")
            .tempfile()?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base name
        let temp_output = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        // Input and output base must precede the options
        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg(&output_base)
            .args(self.options())
            .arg("tsv") // Output TSV format
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;

        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

impl TextRecognizer for Tesseract {
    fn recognize_text(&self, img: &GrayImage) -> Result<String> {
        let lines = self.recognize_lines(img)?;
        for line in &lines {
            tracing::trace!(
                "OCR line {:?} ({} words, confidence {:.1})",
                line.text,
                line.words.len(),
                line.confidence
            );
        }
        Ok(lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Parses Tesseract TSV output into structured OcrLine data
fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    // Skip header
    for row in tsv.lines().skip(1) {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Level 5 = word
        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }

        let text = fields[11].trim();
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        // Line numbers restart in every block and paragraph
        let key = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_key.is_some_and(|k| k != key) {
            push_line(&mut lines, std::mem::take(&mut current_words));
        }
        current_key = Some(key);

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    push_line(&mut lines, current_words);
    lines
}

fn push_line(lines: &mut Vec<OcrLine>, words: Vec<OcrWord>) {
    if words.is_empty() {
        return;
    }
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine {
        text,
        words,
        confidence,
    });
}
