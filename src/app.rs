use std::fs;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::config::Locations;
use crate::domain::{FileCategory, filename_from_url};
use crate::error::NotegrabError;
use crate::scratch::{FileRecord, ScratchArea};
use crate::transcripts::{FetchRequest, Sidecar, TranscriptFetcher};
use crate::transfer::{ProgressObserver, Transfer};

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Explicit destination filename; derived from the URL when absent.
    pub filename: Option<String>,
    /// Route to the scratch area instead of the persistent downloads folder.
    pub use_temp: bool,
    pub category: FileCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub url: String,
    pub path: String,
    pub size_bytes: u64,
    pub elapsed_secs: f64,
    pub temp: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListReport {
    pub root: String,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub size_bytes: u64,
    pub modified: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryReport {
    pub root: String,
    pub total_size_bytes: u64,
    pub file_count: usize,
    pub retention_hours: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeSummary {
    pub dry_run: bool,
    pub deleted: Vec<String>,
    pub failed: Vec<PurgeFailureEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeFailureEntry {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFetchReport {
    pub items: Vec<BatchFetchItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFetchItem {
    pub url: String,
    pub status: String,
    pub path: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptListReport {
    pub transcripts: Vec<TranscriptListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptListEntry {
    pub path: String,
    pub size_bytes: u64,
    pub modified: String,
    pub metadata: Option<Sidecar>,
}

/// Wires the directory configuration, the scratch area and a transfer
/// executor behind the operations the CLI exposes.
pub struct App<T: Transfer> {
    locations: Locations,
    transfer: T,
}

impl<T: Transfer> App<T> {
    pub fn new(locations: Locations, transfer: T) -> Self {
        Self {
            locations,
            transfer,
        }
    }

    pub fn locations(&self) -> &Locations {
        &self.locations
    }

    fn scratch(&self) -> Result<ScratchArea, NotegrabError> {
        ScratchArea::open(self.locations.scratch_root.clone(), self.locations.retention)
    }

    pub fn download(
        &self,
        url: &str,
        options: DownloadOptions,
        observer: &dyn ProgressObserver,
    ) -> Result<DownloadReport, NotegrabError> {
        let filename = match options.filename {
            Some(filename) => filename,
            None => filename_from_url(url)?,
        };

        let destination = if options.use_temp {
            self.scratch()?.allocate_path(&filename, options.category)
        } else {
            self.locations.ensure_download_root()?;
            self.locations.download_root.join(filename)
        };

        let transfer_info = self.transfer.stream(url, &destination, observer)?;
        info!(url, path = %destination, bytes = transfer_info.bytes_transferred, "download complete");

        Ok(DownloadReport {
            url: url.to_string(),
            path: destination.to_string(),
            size_bytes: transfer_info.bytes_transferred,
            elapsed_secs: transfer_info.elapsed.as_secs_f64(),
            temp: options.use_temp,
        })
    }

    /// Lists the scratch area (optionally one category) when `temp` is set,
    /// otherwise the persistent downloads folder.
    pub fn list(
        &self,
        temp: bool,
        category: Option<FileCategory>,
    ) -> Result<ListReport, NotegrabError> {
        if temp {
            let scratch = self.scratch()?;
            let root = match category {
                Some(category) => scratch.category_dir(category),
                None => scratch.root().to_owned(),
            };
            let files = scratch
                .list_files(category)?
                .into_iter()
                .map(file_entry)
                .collect();
            return Ok(ListReport {
                root: root.to_string(),
                files,
            });
        }

        let root = &self.locations.download_root;
        let mut files = Vec::new();
        if root.as_std_path().exists() {
            let entries = fs::read_dir(root.as_std_path())
                .map_err(|err| NotegrabError::storage(root.clone(), err))?;
            for entry in entries {
                let entry = entry.map_err(|err| NotegrabError::Filesystem(err.to_string()))?;
                if let Some(record) = FileRecord::from_path(&entry.path()) {
                    files.push(file_entry(record));
                }
            }
        }
        Ok(ListReport {
            root: root.to_string(),
            files,
        })
    }

    pub fn inventory(&self) -> Result<InventoryReport, NotegrabError> {
        let inventory = self.scratch()?.inventory()?;
        Ok(InventoryReport {
            root: inventory.root.to_string(),
            total_size_bytes: inventory.total_size_bytes,
            file_count: inventory.file_count,
            retention_hours: inventory.retention.as_secs() / 3600,
        })
    }

    pub fn purge(&self, dry_run: bool) -> Result<PurgeSummary, NotegrabError> {
        let report = self.scratch()?.purge_stale(dry_run)?;
        Ok(PurgeSummary {
            dry_run: report.dry_run,
            deleted: report
                .deleted
                .into_iter()
                .map(|path| path.to_string())
                .collect(),
            failed: report
                .failed
                .into_iter()
                .map(|failure| PurgeFailureEntry {
                    path: failure.path.to_string(),
                    reason: failure.reason,
                })
                .collect(),
        })
    }

    pub fn fetch_transcripts(
        &self,
        requests: &[FetchRequest],
        observer: &dyn ProgressObserver,
    ) -> Result<BatchFetchReport, NotegrabError> {
        let fetcher = TranscriptFetcher::new(self.scratch()?, &self.transfer);
        let items = fetcher
            .fetch_many(requests, observer)
            .into_iter()
            .map(|(url, result)| match result {
                Ok(sidecar) => BatchFetchItem {
                    url,
                    status: "success".to_string(),
                    path: Some(sidecar.file_path),
                    error: None,
                },
                Err(err) => BatchFetchItem {
                    url,
                    status: "failed".to_string(),
                    path: None,
                    error: Some(err.to_string()),
                },
            })
            .collect();
        Ok(BatchFetchReport { items })
    }

    pub fn list_transcripts(&self) -> Result<TranscriptListReport, NotegrabError> {
        let fetcher = TranscriptFetcher::new(self.scratch()?, &self.transfer);
        let transcripts = fetcher
            .list_with_metadata()?
            .into_iter()
            .map(|entry| TranscriptListEntry {
                path: entry.record.path.to_string(),
                size_bytes: entry.record.size_bytes,
                modified: format_time(entry.record.modified),
                metadata: entry.metadata,
            })
            .collect();
        Ok(TranscriptListReport { transcripts })
    }
}

fn file_entry(record: FileRecord) -> FileEntry {
    FileEntry {
        path: record.path.to_string(),
        size_bytes: record.size_bytes,
        modified: format_time(record.modified),
    }
}

fn format_time(time: std::time::SystemTime) -> String {
    DateTime::<Local>::from(time).to_rfc3339()
}
