//! Concurrent-safe dataset registry.
//!
//! The registry owns the current `RegistrySnapshot` behind a
//! `parking_lot::RwLock<Arc<...>>`. Readers clone the `Arc` out of the lock,
//! so a read is a pointer copy and an in-flight reader keeps a coherent view
//! even while a reload installs the next snapshot. The writer path is
//! serialized by a separate mutex and builds the entire next snapshot off to
//! the side; the write lock is held only for the final swap.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::dataset::{discover, normalize};
use crate::dataset::{
    DatasetInfo, FileRecord, FileSummary, Record, RegistrySnapshot, SourceKind,
};
use crate::error::AppError;

#[derive(Default)]
pub struct DataRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    /// Serializes writers; readers are never blocked by a reload in progress.
    reload_gate: Mutex<()>,
}

impl DataRegistry {
    pub fn new() -> DataRegistry {
        DataRegistry::default()
    }

    /// Current snapshot handle. All reads derived from one handle are
    /// mutually consistent; request handlers should take one per request.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().clone()
    }

    /// Discover, normalize and atomically install the full dataset set from
    /// `dir`.
    ///
    /// Per-file failures are logged and skipped; a discovery failure
    /// (directory gone) aborts the reload and leaves the previous snapshot in
    /// effect.
    pub fn reload(&self, dir: &Path) -> Result<(), AppError> {
        let _gate = self.reload_gate.lock();
        info!(target: "datadock::registry", "loading data from directory: {}", dir.display());

        let files = discover::discover(dir)?;
        if files.is_empty() {
            warn!(target: "datadock::registry", "no supported files found in {}", dir.display());
        }

        let mut next = RegistrySnapshot::default();
        for path in &files {
            match load_file(path) {
                Ok((file_record, groups)) => {
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    for (suffix, records) in groups {
                        let name = match suffix {
                            Some(suffix) => format!("{stem}_{suffix}"),
                            None => stem.clone(),
                        };
                        if next.datasets.contains_key(&name) {
                            // Later files win; see DESIGN.md on name collisions.
                            warn!(
                                target: "datadock::registry",
                                "dataset '{}' redefined by {}, overwriting earlier definition",
                                name,
                                path.display()
                            );
                        }
                        next.datasets.insert(name, records);
                    }
                    next.files.push(file_record);
                }
                Err(err) => {
                    error!(
                        target: "datadock::registry",
                        "failed to load file {}: {err}",
                        path.display()
                    );
                }
            }
        }
        next.fingerprint = compute_fingerprint(&next);

        let total_records: usize = next.datasets.values().map(|d| d.len()).sum();
        info!(
            target: "datadock::registry",
            "loaded {} datasets with {} total records from {} files",
            next.datasets.len(),
            total_records,
            next.files.len()
        );
        for (name, records) in &next.datasets {
            info!(target: "datadock::registry", "  - {}: {} records", name, records.len());
        }

        *self.snapshot.write() = Arc::new(next);
        Ok(())
    }

    pub fn datasets_info(&self) -> Vec<DatasetInfo> {
        self.snapshot().datasets_info()
    }

    pub fn dataset(&self, name: &str) -> Option<Vec<Record>> {
        self.snapshot().dataset(name).cloned()
    }

    /// Missing names map to an empty sequence.
    pub fn datasets(&self, names: &[String]) -> BTreeMap<String, Vec<Record>> {
        let snapshot = self.snapshot();
        names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    snapshot.dataset(name).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Full copy of all datasets; callers never observe later reloads.
    pub fn all_datasets(&self) -> BTreeMap<String, Vec<Record>> {
        self.snapshot().datasets.clone()
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.snapshot().dataset_names()
    }

    pub fn file_summary(&self) -> FileSummary {
        self.snapshot().file_summary()
    }

    pub fn fingerprint(&self) -> Option<String> {
        self.snapshot().fingerprint().map(str::to_string)
    }
}

type LoadedFile = (FileRecord, Vec<(Option<String>, Vec<Record>)>);

/// Normalize one file and capture its metadata. Either both succeed or the
/// file is skipped as a whole.
fn load_file(path: &Path) -> Result<LoadedFile, AppError> {
    info!(target: "datadock::registry", "loading file: {}", path.display());

    let kind = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceKind::from_extension)
        .ok_or_else(|| AppError::UnsupportedFormat {
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string(),
        })?;

    let metadata = std::fs::metadata(path)
        .map_err(|e| AppError::parse(path, format!("stat failed: {e}")))?;
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());

    let normalized = normalize::normalize(path)?;

    Ok((
        FileRecord {
            path: absolute.to_string_lossy().into_owned(),
            kind,
            last_modified,
            size: metadata.len(),
        },
        normalized.groups,
    ))
}

/// XXH3-64 over (path, mtime) pairs plus the sorted dataset names, rendered
/// as a quoted hex token. Changes whenever a file is added, removed or
/// touched, or the dataset set changes; `None` when nothing is loaded.
fn compute_fingerprint(snapshot: &RegistrySnapshot) -> Option<String> {
    if snapshot.files.is_empty() {
        return None;
    }
    let file_signature: Vec<String> = snapshot
        .files
        .iter()
        .map(|f| format!("{}:{}", f.path, f.last_modified))
        .collect();
    // BTreeMap keys are already sorted.
    let dataset_signature: Vec<String> = snapshot.datasets.keys().cloned().collect();
    let combined = format!(
        "{}|{}",
        file_signature.join("|"),
        dataset_signature.join("|")
    );
    Some(format!("\"{:016x}\"", xxh3_64(combined.as_bytes())))
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
