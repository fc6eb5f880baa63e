//! Post-run removal of leftover temp files.

use std::fs;
use std::path::Path;

/// Deletes entries in `dir` whose file names start with `prefix`.
///
/// Best effort: failures are logged and skipped. Returns the number of
/// entries removed.
pub fn remove_transient_files(dir: &Path, prefix: &str) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }

        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Failed to delete {}: {}", path.display(), e),
        }
    }

    tracing::info!("Removed {} temporary file(s) from {}", removed, dir.display());
    removed
}
