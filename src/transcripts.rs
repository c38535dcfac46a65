use std::fs;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::FileCategory;
use crate::error::NotegrabError;
use crate::scratch::{FileRecord, ScratchArea};
use crate::transfer::{ProgressObserver, Transfer, TransferInfo};

/// Pause between batch downloads. Politeness toward the remote server, not a
/// rate limiter.
const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// JSON file written next to each fetched artifact, same base name with a
/// `.json` extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub file_path: String,
    pub file_size: u64,
    pub download_time: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub meeting_id: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub record: FileRecord,
    /// `None` when the artifact has no sidecar, or its sidecar is unreadable.
    pub metadata: Option<Sidecar>,
}

/// Convenience layer over the scratch area and the transfer executor:
/// assigns transcript naming, attaches sidecar metadata, joins listings.
pub struct TranscriptFetcher<T: Transfer> {
    scratch: ScratchArea,
    transfer: T,
}

impl<T: Transfer> TranscriptFetcher<T> {
    pub fn new(scratch: ScratchArea, transfer: T) -> Self {
        Self { scratch, transfer }
    }

    pub fn fetch(
        &self,
        url: &str,
        meeting_id: Option<&str>,
        metadata: Option<Value>,
        observer: &dyn ProgressObserver,
    ) -> Result<Sidecar, NotegrabError> {
        let logical_name = match meeting_id {
            Some(id) => format!("meeting_{id}_transcript"),
            None => format!("meeting_transcript_{}", Utc::now().timestamp()),
        };
        let destination = self
            .scratch
            .allocate_path(&logical_name, FileCategory::Transcripts);

        let TransferInfo {
            bytes_transferred, ..
        } = self.transfer.stream(url, &destination, observer)?;
        info!(url, path = %destination, bytes = bytes_transferred, "transcript fetched");

        let sidecar = Sidecar {
            file_path: destination.to_string(),
            file_size: bytes_transferred,
            download_time: Local::now().to_rfc3339(),
            url: url.to_string(),
            meeting_id: meeting_id.map(str::to_string),
            metadata: metadata.unwrap_or(Value::Null),
            status: "success".to_string(),
        };
        write_sidecar(&sidecar_path(&destination), &sidecar)?;
        Ok(sidecar)
    }

    /// Sequential batch fetch. Individual failures are collected, never
    /// abort the batch.
    pub fn fetch_many(
        &self,
        requests: &[FetchRequest],
        observer: &dyn ProgressObserver,
    ) -> Vec<(String, Result<Sidecar, NotegrabError>)> {
        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            if index > 0 {
                thread::sleep(BATCH_PAUSE);
            }
            let result = self.fetch(
                &request.url,
                request.meeting_id.as_deref(),
                request.metadata.clone(),
                observer,
            );
            if let Err(err) = &result {
                warn!(url = %request.url, error = %err, "transcript fetch failed");
            }
            results.push((request.url.clone(), result));
        }
        results
    }

    /// Lists transcript artifacts joined with their sidecars. Sidecar files
    /// themselves are not listed as artifacts. A missing or corrupt sidecar
    /// degrades the entry to `metadata: None` rather than failing the call.
    pub fn list_with_metadata(&self) -> Result<Vec<TranscriptEntry>, NotegrabError> {
        let mut entries = Vec::new();
        for record in self.scratch.list_files(Some(FileCategory::Transcripts))? {
            if record.path.extension() == Some("json") {
                continue;
            }
            let metadata = match load_sidecar(&record.path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %record.path, error = %err, "unreadable sidecar");
                    None
                }
            };
            entries.push(TranscriptEntry { record, metadata });
        }
        Ok(entries)
    }

    pub fn scratch(&self) -> &ScratchArea {
        &self.scratch
    }
}

pub fn sidecar_path(artifact: &Utf8Path) -> Utf8PathBuf {
    artifact.with_extension("json")
}

/// Loads the sidecar for an artifact. `Ok(None)` means no sidecar exists;
/// a present but unreadable sidecar is a `MetadataCorrupt` error, so callers
/// can tell the two apart.
pub fn load_sidecar(artifact: &Utf8Path) -> Result<Option<Sidecar>, NotegrabError> {
    let path = sidecar_path(artifact);
    if !path.as_std_path().exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path.as_std_path()).map_err(|err| NotegrabError::MetadataCorrupt {
            path: path.clone(),
            message: err.to_string(),
        })?;
    let sidecar =
        serde_json::from_str(&content).map_err(|err| NotegrabError::MetadataCorrupt {
            path: path.clone(),
            message: err.to_string(),
        })?;
    Ok(Some(sidecar))
}

fn write_sidecar(path: &Utf8Path, sidecar: &Sidecar) -> Result<(), NotegrabError> {
    let parent = path
        .parent()
        .ok_or_else(|| NotegrabError::Filesystem("invalid sidecar path".to_string()))?;
    let content = serde_json::to_vec_pretty(sidecar)
        .map_err(|err| NotegrabError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("notegrab-sidecar")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| NotegrabError::io(path, err))?;
    fs::write(temp.path(), &content).map_err(|err| NotegrabError::io(path, err))?;
    temp.persist(path.as_std_path())
        .map_err(|err| NotegrabError::io(path, err.error))?;
    Ok(())
}
