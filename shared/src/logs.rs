//! Log folder housekeeping: listing, expiry preview, deletion and summaries.
//!
//! Every path handed in by a caller is resolved against a [`LogRoot`] and
//! must stay inside it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

use crate::{Error, Result};

const SECONDS_PER_DAY: u64 = 86_400;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Confines log operations to one folder tree.
#[derive(Debug, Clone)]
pub struct LogRoot {
    root: PathBuf,
}

/// A file in the log folder.
#[derive(Debug, Clone, Serialize)]
pub struct LogFile {
    pub file: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogListing {
    pub folder: String,
    pub files: Vec<LogFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpiredFile {
    pub file: String,
    pub size_bytes: u64,
}

/// What a confirmed deletion would remove.
#[derive(Debug, Serialize)]
pub struct DeletionPreview {
    pub files_to_delete: Vec<ExpiredFile>,
    pub total_space_to_free_mb: f64,
    pub delete_url: String,
}

/// Per-file outcome of a deletion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeletionOutcome {
    Deleted(String),
    Failed { file: String, error: String },
}

#[derive(Debug, Serialize)]
pub struct DeletionReport {
    pub deleted_files: Vec<DeletionOutcome>,
    pub space_freed_mb: f64,
    pub folder: String,
    pub days: u32,
}

/// Returned when deletion was requested without confirmation.
#[derive(Debug, Serialize)]
pub struct DeletionSkipped {
    pub message: String,
    pub folder: String,
    pub days: u32,
}

/// Keyword counts for a single log file.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct LogSummary {
    pub errors: u64,
    pub warnings: u64,
    pub info: u64,
    pub total_lines: u64,
}

impl LogRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolves a caller-supplied path (absolute or relative to the root).
    ///
    /// Fails with `NotFound` when the target does not exist and with
    /// `Validation` when it resolves outside the root.
    pub fn resolve(&self, requested: Option<&str>) -> Result<PathBuf> {
        let root = self.root.canonicalize().map_err(|_| {
            Error::NotFound(format!("Folder not found: {}", self.root.display()))
        })?;

        let candidate = match requested.map(str::trim).filter(|r| !r.is_empty()) {
            Some(requested) => {
                let requested = Path::new(requested);
                if requested.is_absolute() {
                    requested.to_path_buf()
                } else {
                    root.join(requested)
                }
            }
            None => return Ok(root),
        };

        let resolved = candidate
            .canonicalize()
            .map_err(|_| Error::NotFound(format!("Path not found: {}", candidate.display())))?;

        if !resolved.starts_with(&root) {
            return Err(Error::Validation(format!(
                "{} is outside the log folder",
                candidate.display()
            )));
        }

        Ok(resolved)
    }
}

/// Newest files first, at most `limit`.
pub fn list_recent(folder: &Path, limit: usize) -> Result<Vec<LogFile>> {
    let mut files: Vec<LogFile> = read_files(folder)?
        .into_iter()
        .map(|entry| LogFile {
            file: entry.name,
            size_bytes: entry.size,
            modified: DateTime::<Utc>::from(entry.modified),
        })
        .collect();

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.file.cmp(&b.file)));
    files.truncate(limit);
    Ok(files)
}

/// Lists files older than `days` without touching them.
pub fn preview_expired(folder: &Path, days: u32, now: SystemTime) -> Result<DeletionPreview> {
    let expired = expired_files(folder, days, now)?;
    let total: u64 = expired.iter().map(|e| e.size).sum();
    let folder_display = folder.display().to_string();

    Ok(DeletionPreview {
        files_to_delete: expired
            .into_iter()
            .map(|e| ExpiredFile {
                file: e.name,
                size_bytes: e.size,
            })
            .collect(),
        total_space_to_free_mb: to_mb(total),
        delete_url: format!(
            "/logs/delete-confirmed?folder={}&days={}&confirm=yes",
            urlencoding::encode(&folder_display),
            days
        ),
    })
}

/// Deletes files older than `days`; failures are reported per file.
pub fn delete_expired(folder: &Path, days: u32, now: SystemTime) -> Result<DeletionReport> {
    let mut deleted_files = Vec::new();
    let mut freed = 0u64;

    for entry in expired_files(folder, days, now)? {
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                freed += entry.size;
                deleted_files.push(DeletionOutcome::Deleted(entry.name));
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", entry.path.display(), e);
                deleted_files.push(DeletionOutcome::Failed {
                    file: entry.name,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Deleted {} expired log files from {}",
        deleted_files.len(),
        folder.display()
    );

    Ok(DeletionReport {
        deleted_files,
        space_freed_mb: to_mb(freed),
        folder: folder.display().to_string(),
        days,
    })
}

/// Counts error, warning and info lines. Each line lands in at most one
/// bucket, checked in that order.
pub fn summarize(path: &Path) -> Result<LogSummary> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("File not found: {}", path.display())));
    }

    let bytes = fs::read(path)?;
    Ok(summarize_text(&String::from_utf8_lossy(&bytes)))
}

fn summarize_text(text: &str) -> LogSummary {
    let mut summary = LogSummary::default();
    for line in text.lines() {
        summary.total_lines += 1;
        let lower = line.to_ascii_lowercase();
        if lower.contains("error") {
            summary.errors += 1;
        } else if lower.contains("warn") {
            summary.warnings += 1;
        } else if lower.contains("info") {
            summary.info += 1;
        }
    }
    summary
}

struct FileEntry {
    name: String,
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

fn read_files(folder: &Path) -> Result<Vec<FileEntry>> {
    if !folder.is_dir() {
        return Err(Error::NotFound(format!("Folder not found: {}", folder.display())));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            size: metadata.len(),
            modified: metadata.modified()?,
        });
    }
    Ok(files)
}

fn expired_files(folder: &Path, days: u32, now: SystemTime) -> Result<Vec<FileEntry>> {
    let max_age = u64::from(days) * SECONDS_PER_DAY;
    let mut expired: Vec<FileEntry> = read_files(folder)?
        .into_iter()
        .filter(|entry| {
            now.duration_since(entry.modified)
                .map(|age| age.as_secs_f64() > max_age as f64)
                .unwrap_or(false)
        })
        .collect();
    expired.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(expired)
}

fn to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
