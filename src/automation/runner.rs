//! Scan loop - capture, detect, click.
//!
//! One call to `scan_until_found` captures a frame per iteration, runs the
//! detection pipeline on it and clicks the first button found. Errors inside
//! an iteration are logged and the loop continues after the scan interval;
//! only capture errors that retrying cannot fix end the run.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::automation::config::AcceptConfig;
use crate::automation::input::{dispatch, Clicker};
use crate::capture::{is_fatal, Frame, FrameSource};
use crate::detection::{DetectionResult, Detector, Region};
use crate::ocr::TextRecognizer;

const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub struct Runner<S: FrameSource, C: Clicker, R: TextRecognizer> {
    source: S,
    clicker: C,
    detector: Detector<R>,
    interval: Duration,
    debug_dir: Option<PathBuf>,
}

impl<S: FrameSource, C: Clicker, R: TextRecognizer> Runner<S, C, R> {
    pub fn new(source: S, clicker: C, detector: Detector<R>, config: &AcceptConfig) -> Self {
        Self {
            source,
            clicker,
            detector,
            interval: config.scan_interval(),
            debug_dir: config
                .save_debug_frames
                .then(crate::paths::get_screenshots_dir),
        }
    }

    /// Overrides where debug frames are written. `None` disables them.
    #[cfg(test)]
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    #[cfg(test)]
    pub fn clicker(&self) -> &C {
        &self.clicker
    }

    /// Runs one iteration. Returns the clicked region, if any.
    pub fn scan_once(&mut self) -> Result<Option<Region>> {
        let frame = self.source.capture().context("Failed to capture screen")?;
        tracing::debug!(
            "Captured {}x{} frame at {:?}",
            frame.width(),
            frame.height(),
            frame.origin()
        );

        let (region, path) = match self.detector.detect(&frame) {
            DetectionResult::Empty => return Ok(None),
            DetectionResult::Found { region, path } => (region, path),
        };
        tracing::info!("Button found by {} at {}", path, region);

        if let Some(dir) = &self.debug_dir {
            match save_debug_frame(dir, &frame, &region) {
                Ok(saved) => tracing::info!("Debug frame saved: {}", saved.display()),
                Err(e) => tracing::warn!("Failed to save debug frame: {:#}", e),
            }
        }

        dispatch(&mut self.clicker, &frame, &region)?;
        Ok(Some(region))
    }

    /// Scans until a button is found and clicked.
    ///
    /// Returns the clicked region, or the first fatal capture error.
    pub fn scan_until_found(&mut self) -> Result<Region> {
        let span = tracing::info_span!("scan", iteration = tracing::field::Empty);
        let _guard = span.enter();
        tracing::info!("Scanning for button...");

        let mut iteration: u64 = 0;
        loop {
            iteration += 1;
            span.record("iteration", iteration);

            match self.scan_once() {
                Ok(Some(region)) => {
                    tracing::info!("Clicked button after {} iteration(s)", iteration);
                    return Ok(region);
                }
                Ok(None) => tracing::debug!("Button not found, retrying"),
                Err(e) if is_fatal(&e) => {
                    tracing::error!("Stopping scan: {:#}", e);
                    return Err(e);
                }
                Err(e) => tracing::error!("Error in scan loop: {:#}", e),
            }

            thread::sleep(self.interval);
        }
    }
}

/// Saves `frame` with `region` outlined to `<dir>/accept_<timestamp>.png`.
fn save_debug_frame(dir: &Path, frame: &Frame, region: &Region) -> Result<PathBuf> {
    if region.width == 0 || region.height == 0 {
        return Err(anyhow!("Cannot outline empty region {}", region));
    }

    let mut image = frame.image().clone();
    draw_hollow_rect_mut(
        &mut image,
        Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height),
        OUTLINE_COLOR,
    );

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("accept_{}.png", timestamp));
    image
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::input::tests::RecordingClicker;
    use crate::capture::CaptureError;
    use crate::detection::tests::{build_frame, config_with_template, noise_template};
    use crate::ocr::tests::ScriptedRecognizer;
    use std::collections::VecDeque;

    /// Replays queued capture results, then repeats the last frame.
    struct QueueSource {
        queue: VecDeque<Result<Frame>>,
        last: Option<Frame>,
        captures: usize,
    }

    impl QueueSource {
        fn new(queue: Vec<Result<Frame>>) -> Self {
            Self {
                queue: queue.into(),
                last: None,
                captures: 0,
            }
        }
    }

    impl FrameSource for QueueSource {
        fn capture(&mut self) -> Result<Frame> {
            self.captures += 1;
            match self.queue.pop_front() {
                Some(Ok(frame)) => {
                    self.last = Some(frame.clone());
                    Ok(frame)
                }
                Some(Err(e)) => Err(e),
                None => self
                    .last
                    .clone()
                    .ok_or_else(|| anyhow!("no frames queued")),
            }
        }
    }

    fn runner(
        frames: Vec<Result<Frame>>,
        recognizer: ScriptedRecognizer,
        template: &Path,
    ) -> Runner<QueueSource, RecordingClicker, ScriptedRecognizer> {
        let config = AcceptConfig {
            scan_interval_ms: 0,
            ..config_with_template(template)
        };
        let detector = Detector::new(&config, recognizer);
        Runner::new(
            QueueSource::new(frames),
            RecordingClicker::default(),
            detector,
            &config,
        )
        .with_debug_dir(None)
    }

    #[test]
    fn test_clicks_center_of_confirmed_button_once() {
        let button = Region::new(100, 60, 150, 40);
        let frame = build_frame(400, 200, &[button], None);
        let mut runner = runner(
            vec![Ok(frame)],
            ScriptedRecognizer::always("ACCEPT"),
            Path::new("missing/accept.png"),
        );

        let clicked = runner.scan_until_found().unwrap();

        assert_eq!(clicked, button);
        assert_eq!(runner.clicker().clicks, vec![(175, 80)]);
    }

    #[test]
    fn test_click_is_offset_by_frame_origin() {
        let button = Region::new(10, 10, 120, 40);
        let frame = build_frame(200, 100, &[button], None);
        let frame = Frame::new(frame.image().clone(), (1920, -200));
        let mut runner = runner(
            vec![Ok(frame)],
            ScriptedRecognizer::always("Accept"),
            Path::new("missing/accept.png"),
        );

        runner.scan_until_found().unwrap();

        assert_eq!(runner.clicker().clicks, vec![(1920 + 70, -200 + 30)]);
    }

    #[test]
    fn test_retries_until_button_appears() {
        let button = Region::new(20, 20, 120, 40);
        let frames = vec![
            Ok(build_frame(200, 100, &[], None)),
            Err(anyhow!("BitBlt failed")),
            Ok(build_frame(200, 100, &[button], None)),
        ];
        let mut runner = runner(
            frames,
            ScriptedRecognizer::always("ACCEPT"),
            Path::new("missing/accept.png"),
        );

        assert_eq!(runner.scan_until_found().unwrap(), button);
        assert_eq!(runner.source.captures, 3);
        assert_eq!(runner.clicker().clicks.len(), 1);
    }

    #[test]
    fn test_template_fallback_clicks_template_center() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("accept.png");
        let template = noise_template(40, 20);
        template.save(&template_path).unwrap();

        let frame = build_frame(300, 200, &[], Some((&template, 150, 100)));
        let mut runner = runner(
            vec![Ok(frame)],
            ScriptedRecognizer::always(""),
            &template_path,
        );

        assert_eq!(runner.scan_once().unwrap(), Some(Region::new(150, 100, 40, 20)));
        assert_eq!(runner.clicker().clicks, vec![(170, 110)]);
    }

    #[test]
    fn test_no_monitor_stops_the_run() {
        let mut runner = runner(
            vec![Err(CaptureError::NoMonitor.into())],
            ScriptedRecognizer::always("ACCEPT"),
            Path::new("missing/accept.png"),
        );

        let err = runner.scan_until_found().unwrap_err();

        assert!(is_fatal(&err));
        assert!(runner.clicker().clicks.is_empty());
    }

    #[test]
    fn test_empty_frame_is_not_clicked() {
        let mut runner = runner(
            vec![Ok(build_frame(200, 100, &[], None))],
            ScriptedRecognizer::always("ACCEPT"),
            Path::new("missing/accept.png"),
        );

        assert_eq!(runner.scan_once().unwrap(), None);
        assert!(runner.clicker().clicks.is_empty());
    }

    #[test]
    fn test_debug_frame_has_outline() {
        let dir = tempfile::tempdir().unwrap();
        let button = Region::new(20, 20, 120, 40);
        let frame = build_frame(200, 100, &[button], None);
        let mut runner = runner(
            vec![Ok(frame)],
            ScriptedRecognizer::always("ACCEPT"),
            Path::new("missing/accept.png"),
        )
        .with_debug_dir(Some(dir.path().to_path_buf()));

        runner.scan_until_found().unwrap();

        let saved: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(saved.len(), 1);
        let name = saved[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("accept_") && name.ends_with(".png"));

        let image = image::open(&saved[0]).unwrap().to_rgb8();
        assert_eq!(*image.get_pixel(20, 20), OUTLINE_COLOR);
        assert_eq!(*image.get_pixel(139, 59), OUTLINE_COLOR);
        assert_ne!(*image.get_pixel(70, 40), OUTLINE_COLOR);
    }
}
