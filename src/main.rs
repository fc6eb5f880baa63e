//! Accept Clicker
//!
//! Waits for a trigger key, then scans the primary monitor until it finds the
//! "ACCEPT" button and clicks it. Buttons are located by color and confirmed
//! with OCR, with template matching as the fallback.

mod automation;
mod capture;
mod detection;
mod logging;
mod ocr;
mod paths;

use anyhow::{anyhow, Result};

use automation::{AcceptConfig, Runner, SystemClicker};
use capture::ScreenSource;
use detection::Detector;
use ocr::{Tesseract, TEMP_FILE_PREFIX};

fn main() -> Result<()> {
    // Ensure output directories exist
    paths::ensure_directories()?;
    logging::init_logging(&paths::get_logs_dir())?;

    let config = AcceptConfig::load(&paths::get_config_path());

    if !config.template_path.exists() {
        tracing::warn!(
            "Template image not found at {}. Template fallback will not match.",
            config.template_path.display()
        );
    }

    let recognizer = Tesseract::from_config(&config);
    let detector = Detector::new(&config, recognizer);
    let mut runner = Runner::new(ScreenSource::new(), SystemClicker::new(), detector, &config);

    let trigger = automation::spawn_listener(config.trigger_key)?;
    if cfg!(windows) {
        tracing::info!("Press '{}' to start scanning", config.trigger_key);
    } else {
        tracing::info!("Press Enter to start scanning");
    }
    trigger
        .recv()
        .map_err(|_| anyhow!("Trigger listener stopped before a key press"))?;

    let region = runner.scan_until_found()?;
    tracing::info!("Clicked button at {}", region);

    if config.cleanup_temp_files {
        std::thread::sleep(config.cleanup_delay());
        automation::remove_transient_files(&std::env::temp_dir(), TEMP_FILE_PREFIX);
    }

    tracing::info!("Done");
    Ok(())
}
