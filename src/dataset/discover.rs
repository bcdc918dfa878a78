//! File discovery: deterministic enumeration of dataset sources in the data
//! directory. Direct children only, recognized extensions only, sorted by
//! path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::SUPPORTED_EXTENSIONS;
use crate::error::AppError;

/// Return true if the path carries one of the recognized source extensions
/// (case-insensitive).
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|s| *s == lower)
        })
        .unwrap_or(false)
}

/// List recognized source files directly under `dir`, sorted by path.
///
/// Fails with `DirectoryNotFound` if `dir` does not exist or is not a
/// directory. An empty result is valid here; treating it as a startup error
/// is the caller's concern.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(AppError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::internal(format!("failed to read {}: {e}", dir.display())))?;

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && has_supported_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
