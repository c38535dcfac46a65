use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use tracing::{debug, warn};

use crate::domain::FileCategory;
use crate::error::NotegrabError;

/// A scratch directory partitioned into typed subdirectories, with
/// collision-avoiding path allocation and age-based cleanup.
///
/// The area holds no index; every listing and aggregation call re-walks the
/// tree, so results reflect the filesystem at query time.
#[derive(Debug, Clone)]
pub struct ScratchArea {
    root: Utf8PathBuf,
    retention: Duration,
}

/// Live snapshot of a single regular file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: Utf8PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

#[derive(Debug, Clone)]
pub struct Inventory {
    pub root: Utf8PathBuf,
    pub total_size_bytes: u64,
    pub file_count: usize,
    pub retention: Duration,
}

/// Result of a purge pass. With `dry_run` set, `deleted` lists the files
/// that would have been removed and nothing was touched. Otherwise `deleted`
/// contains only successful removals; each failed attempt is reported
/// separately in `failed`.
#[derive(Debug, Clone)]
pub struct PurgeReport {
    pub dry_run: bool,
    pub deleted: Vec<Utf8PathBuf>,
    pub failed: Vec<PurgeFailure>,
}

#[derive(Debug, Clone)]
pub struct PurgeFailure {
    pub path: Utf8PathBuf,
    pub reason: String,
}

impl ScratchArea {
    /// Opens the scratch area at `root`, creating the root and every
    /// category subdirectory if missing. Idempotent: opening an existing
    /// layout succeeds and leaves it unchanged.
    pub fn open(root: Utf8PathBuf, retention: Duration) -> Result<Self, NotegrabError> {
        let area = Self { root, retention };
        area.ensure_layout()?;
        Ok(area)
    }

    fn ensure_layout(&self) -> Result<(), NotegrabError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| NotegrabError::storage(self.root.clone(), err))?;
        for category in FileCategory::ALL {
            if let Some(subdir) = category.subdir() {
                let dir = self.root.join(subdir);
                fs::create_dir_all(dir.as_std_path())
                    .map_err(|err| NotegrabError::storage(dir.clone(), err))?;
            }
        }
        Ok(())
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn category_dir(&self, category: FileCategory) -> Utf8PathBuf {
        match category.subdir() {
            Some(subdir) => self.root.join(subdir),
            None => self.root.clone(),
        }
    }

    /// Computes a destination path for `logical_name` under the category's
    /// directory, with a second-granularity timestamp token inserted between
    /// stem and extension. Pure path computation: the file is neither created
    /// nor reserved, and two allocations for the same name within the same
    /// second return the same path. Callers are expected to write promptly.
    pub fn allocate_path(&self, logical_name: &str, category: FileCategory) -> Utf8PathBuf {
        let name = Utf8Path::new(logical_name);
        let stem = name.file_stem().unwrap_or("file");
        let token = Local::now().format("%Y%m%d_%H%M%S");
        let filename = match name.extension() {
            Some(ext) => format!("{stem}_{token}.{ext}"),
            None => format!("{stem}_{token}"),
        };
        self.category_dir(category).join(filename)
    }

    /// Lists regular files under one category's directory, or under the whole
    /// scratch root when `category` is `None`. Enumeration order is whatever
    /// the filesystem yields; callers needing order must sort.
    pub fn list_files(
        &self,
        category: Option<FileCategory>,
    ) -> Result<Vec<FileRecord>, NotegrabError> {
        let dir = match category {
            Some(category) => self.category_dir(category),
            None => self.root.clone(),
        };
        let mut records = Vec::new();
        for path in walk_files(dir.as_std_path())? {
            if let Some(record) = FileRecord::from_path(&path) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn inventory(&self) -> Result<Inventory, NotegrabError> {
        let files = self.list_files(None)?;
        Ok(Inventory {
            root: self.root.clone(),
            total_size_bytes: files.iter().map(|record| record.size_bytes).sum(),
            file_count: files.len(),
            retention: self.retention,
        })
    }

    /// Files whose last-modified time precedes `now - retention`.
    pub fn stale_files(&self) -> Result<Vec<Utf8PathBuf>, NotegrabError> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(self
            .list_files(None)?
            .into_iter()
            .filter(|record| record.modified < cutoff)
            .map(|record| record.path)
            .collect())
    }

    /// Age-based cleanup over the whole tree. A single retention window
    /// applies regardless of category; directories are never removed.
    pub fn purge_stale(&self, dry_run: bool) -> Result<PurgeReport, NotegrabError> {
        let stale = self.stale_files()?;
        if dry_run {
            debug!(count = stale.len(), "dry run, nothing deleted");
            return Ok(PurgeReport {
                dry_run: true,
                deleted: stale,
                failed: Vec::new(),
            });
        }
        Ok(self.delete_files(stale))
    }

    /// Attempts each deletion independently; one failure never aborts the
    /// batch. Files that vanished or became undeletable since listing end up
    /// in `failed` with the underlying reason. Paths outside the scratch
    /// root are refused.
    pub fn delete_files(&self, paths: Vec<Utf8PathBuf>) -> PurgeReport {
        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for path in paths {
            if !path.starts_with(&self.root) {
                failed.push(PurgeFailure {
                    path,
                    reason: "outside scratch root".to_string(),
                });
                continue;
            }
            match fs::remove_file(path.as_std_path()) {
                Ok(()) => {
                    debug!(%path, "deleted stale file");
                    deleted.push(path);
                }
                Err(err) => {
                    warn!(%path, error = %err, "failed to delete stale file");
                    failed.push(PurgeFailure {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }
        PurgeReport {
            dry_run: false,
            deleted,
            failed,
        }
    }
}

impl FileRecord {
    /// Reads a live snapshot of a regular file, yielding `None` for
    /// directories and for entries that vanished or cannot be stat'ed
    /// between enumeration and here.
    pub fn from_path(path: &Path) -> Option<Self> {
        let path = Utf8PathBuf::from_path_buf(path.to_path_buf()).ok()?;
        let metadata = match fs::metadata(path.as_std_path()) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(%path, error = %err, "skipping unreadable entry");
                return None;
            }
        };
        if !metadata.is_file() {
            return None;
        }
        let modified = metadata.modified().ok()?;
        Some(Self {
            path,
            size_bytes: metadata.len(),
            modified,
        })
    }
}

/// Recursive walk returning regular files only.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>, NotegrabError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries =
            fs::read_dir(&dir).map_err(|err| NotegrabError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| NotegrabError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_path_shape() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let area = ScratchArea::open(root.clone(), Duration::from_secs(60)).unwrap();

        let path = area.allocate_path("report.pdf", FileCategory::Notes);
        assert!(path.starts_with(root.join("notes")));
        let name = path.file_name().unwrap();
        assert!(name.starts_with("report_"));
        assert!(name.ends_with(".pdf"));
        // stem + `_` + YYYYMMDD_HHMMSS + `.pdf`
        assert_eq!(name.len(), "report_".len() + 15 + ".pdf".len());
    }

    #[test]
    fn general_allocates_at_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let area = ScratchArea::open(root.clone(), Duration::from_secs(60)).unwrap();

        let path = area.allocate_path("readme", FileCategory::General);
        assert_eq!(path.parent().unwrap(), root);
        assert!(path.extension().is_none());
    }
}
