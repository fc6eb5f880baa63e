//! On-disk layout. Everything the clicker reads or writes lives beside the
//! executable:
//!
//! ```text
//! <exe_dir>/
//!   config.json          optional overrides for AcceptConfig
//!   resources/accept.png template for the fallback matcher
//!   logs/                accept_clicker.log
//!   screenshots/         debug frames (save_debug_frames)
//! ```

use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Folder holding the executable; `.` if it cannot be determined.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Destination of frames saved when a button is found.
pub fn get_screenshots_dir() -> PathBuf {
    get_exe_dir().join("screenshots")
}

/// Default home of the reference template.
pub fn get_resources_dir() -> PathBuf {
    get_exe_dir().join("resources")
}

pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Creates the log, screenshot and resource folders if missing.
pub fn ensure_directories() -> std::io::Result<()> {
    for dir in [get_logs_dir(), get_screenshots_dir(), get_resources_dir()] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
