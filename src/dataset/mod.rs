//!
//! datadock dataset module
//! -----------------------
//! This module implements the in-memory dataset model for datadock. Source
//! files found in the data directory are converted into named datasets of
//! uniform JSON records; the registry holds the whole set behind an atomically
//! swappable snapshot so HTTP readers are never exposed to a half-loaded
//! state.
//!
//! Key responsibilities:
//! - Uniform record model for heterogeneous sources (spreadsheet, JSON, CSV).
//! - Deterministic discovery of source files in the data directory.
//! - Concurrent-safe registry with bulk-replace reload and a content
//!   fingerprint used as an HTTP cache-validation token.
//!
//! The public API centers around the `DataRegistry` type, which is shared as
//! an `Arc<DataRegistry>` between the HTTP handlers and the directory watcher.

use std::collections::BTreeMap;

use serde::Serialize;

pub mod discover;
pub mod normalize;
pub mod registry;

pub use registry::DataRegistry;

/// File extensions recognized as dataset sources (matched case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "json", "csv"];

/// One row/entry of a dataset.
///
/// Tabular sources (spreadsheet sheets, CSV) always produce a JSON object
/// whose field order follows the source column order; JSON sources pass their
/// elements through as parsed. Field sets may differ between records of the
/// same dataset.
pub type Record = serde_json::Value;

/// Detected type of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Spreadsheet,
    Json,
    Csv,
}

impl SourceKind {
    pub fn from_extension(extension: &str) -> Option<SourceKind> {
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" | "xls" => Some(SourceKind::Spreadsheet),
            "json" => Some(SourceKind::Json),
            "csv" => Some(SourceKind::Csv),
            _ => None,
        }
    }
}

/// Metadata for one successfully loaded source file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Absolute path of the source file.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Last modification time as fractional epoch seconds.
    pub last_modified: f64,
    /// File size in bytes.
    pub size: u64,
}

/// Name and record count of one dataset, as listed by `GET /datasets`.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub records: usize,
}

/// Summary of the loaded source files. `source`/`type` carry an explicit
/// empty-state description when nothing is loaded.
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub last_modified: Option<f64>,
    pub file_count: usize,
    pub files: Vec<FileRecord>,
}

/// An immutable, internally consistent view of all datasets and file metadata
/// at one point in time. Built off to the side during a reload and installed
/// with a single swap; readers holding an older snapshot keep a coherent view.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    datasets: BTreeMap<String, Vec<Record>>,
    files: Vec<FileRecord>,
    fingerprint: Option<String>,
}

impl RegistrySnapshot {
    pub fn dataset(&self, name: &str) -> Option<&Vec<Record>> {
        self.datasets.get(name)
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn datasets_info(&self) -> Vec<DatasetInfo> {
        self.datasets
            .iter()
            .map(|(name, records)| DatasetInfo {
                name: name.clone(),
                records: records.len(),
            })
            .collect()
    }

    /// Cache-validation token for the loaded state; `None` until something is
    /// loaded.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Most recent modification time across all loaded files.
    pub fn last_modified(&self) -> Option<f64> {
        self.files
            .iter()
            .map(|f| f.last_modified)
            .fold(None, |acc, t| Some(acc.map_or(t, |a: f64| a.max(t))))
    }

    pub fn file_summary(&self) -> FileSummary {
        if self.files.is_empty() {
            return FileSummary {
                source: "No files loaded".to_string(),
                kind: "none".to_string(),
                last_modified: None,
                file_count: 0,
                files: Vec::new(),
            };
        }
        FileSummary {
            source: format!("Directory with {} files", self.files.len()),
            kind: "multiple".to_string(),
            last_modified: self.last_modified(),
            file_count: self.files.len(),
            files: self.files.clone(),
        }
    }
}
