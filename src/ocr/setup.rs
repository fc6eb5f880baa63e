use anyhow::{anyhow, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const ENG_TRAINEDDATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_EXECUTABLE_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_EXECUTABLE_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets Tesseract use its built-in data directory.
    pub tessdata: Option<PathBuf>,
}

impl TesseractPaths {
    /// Plain `tesseract` from `PATH` with its default data directory.
    pub fn fallback() -> Self {
        Self {
            executable: PathBuf::from(EXECUTABLE_NAME),
            tessdata: None,
        }
    }
}

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("accept-clicker")
        .join("tesseract")
}

/// Ensures Tesseract and English trained data are available.
///
/// The executable must already be installed; missing trained data is
/// downloaded into the local data directory.
pub fn ensure_tesseract(explicit: Option<&Path>) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(explicit)?;
    tracing::info!("Tesseract found at: {}", executable.display());

    let tessdata = match find_tessdata_dir() {
        Some(dir) => Some(dir),
        None => {
            let local = get_tesseract_dir().join("tessdata");
            match download_tessdata(&local) {
                Ok(()) => Some(local),
                Err(e) => {
                    tracing::warn!(
                        "Could not download {}: {}. Using Tesseract's default data directory.",
                        ENG_TRAINEDDATA,
                        e
                    );
                    None
                }
            }
        }
    };

    if let Some(dir) = &tessdata {
        tracing::info!("Using tessdata at: {}", dir.display());
    }

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Downloads English trained data
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let eng_url = format!("{}/{}", TESSDATA_REPO, ENG_TRAINEDDATA);
    let eng_path = tessdata_dir.join(ENG_TRAINEDDATA);

    fs::create_dir_all(tessdata_dir)?;
    tracing::info!("Downloading {}...", ENG_TRAINEDDATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&eng_url)
        .header("User-Agent", "accept-clicker")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            ENG_TRAINEDDATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&eng_path)?;
    file.write_all(&bytes)?;

    tracing::info!("Downloaded {} ({} bytes)", ENG_TRAINEDDATA, bytes.len());

    Ok(())
}

/// Finds the Tesseract executable.
///
/// Search order: explicit path, local data dir, `PATH`, common install paths.
/// An explicit path that does not exist is an error rather than silently ignored.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!(
            "Configured Tesseract executable not found: {}",
            path.display()
        ));
    }

    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory containing English trained data.
pub fn find_tessdata_dir() -> Option<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];

    // TESSDATA_PREFIX may point at the data dir itself or its parent
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }

    candidates.extend(SYSTEM_TESSDATA_PATHS.iter().map(PathBuf::from));
    first_with_traineddata(&candidates)
}

fn first_with_traineddata(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join(ENG_TRAINEDDATA).exists())
        .cloned()
}
