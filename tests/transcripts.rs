use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;

use notegrab::error::NotegrabError;
use notegrab::scratch::ScratchArea;
use notegrab::transcripts::{FetchRequest, TranscriptFetcher, load_sidecar, sidecar_path};
use notegrab::transfer::{NoProgress, Progress, ProgressObserver, Transfer, TransferInfo};

struct MockTransfer {
    payload: &'static [u8],
}

impl Transfer for MockTransfer {
    fn stream(
        &self,
        _url: &str,
        destination: &Utf8Path,
        observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError> {
        fs::write(destination.as_std_path(), self.payload)
            .map_err(|err| NotegrabError::io(destination, err))?;
        observer.progress(Progress {
            bytes_transferred: self.payload.len() as u64,
            total_bytes: Some(self.payload.len() as u64),
            elapsed: Duration::from_millis(1),
        });
        Ok(TransferInfo {
            bytes_transferred: self.payload.len() as u64,
            elapsed: Duration::from_millis(1),
        })
    }
}

/// Fails any URL containing "bad", writes a fixed payload otherwise.
struct SelectiveTransfer;

impl Transfer for SelectiveTransfer {
    fn stream(
        &self,
        url: &str,
        destination: &Utf8Path,
        observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError> {
        if url.contains("bad") {
            return Err(NotegrabError::Transport("connection refused".to_string()));
        }
        MockTransfer { payload: b"transcript" }.stream(url, destination, observer)
    }
}

fn open_area(temp: &tempfile::TempDir) -> ScratchArea {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    ScratchArea::open(root, Duration::from_secs(3600)).unwrap()
}

#[test]
fn fetch_writes_artifact_and_sidecar() {
    let temp = tempfile::tempdir().unwrap();
    let area = open_area(&temp);
    let fetcher = TranscriptFetcher::new(area.clone(), MockTransfer { payload: b"hello" });

    let sidecar = fetcher
        .fetch(
            "https://example.com/call.txt",
            Some("TEST_001"),
            Some(json!({"team": "platform"})),
            &NoProgress,
        )
        .unwrap();

    let artifact = Utf8PathBuf::from(&sidecar.file_path);
    assert!(artifact.starts_with(area.root().join("transcripts")));
    assert!(artifact.as_std_path().exists());
    assert_eq!(sidecar.file_size, 5);
    assert_eq!(sidecar.url, "https://example.com/call.txt");
    assert_eq!(sidecar.meeting_id.as_deref(), Some("TEST_001"));
    assert_eq!(sidecar.status, "success");

    let reloaded = load_sidecar(&artifact).unwrap().unwrap();
    assert_eq!(reloaded.metadata, json!({"team": "platform"}));
}

#[test]
fn missing_sidecar_is_absent_not_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let area = open_area(&temp);

    let artifact = area.root().join("transcripts").join("loose_artifact");
    fs::write(artifact.as_std_path(), b"text").unwrap();

    assert!(load_sidecar(&artifact).unwrap().is_none());
}

#[test]
fn corrupt_sidecar_is_a_distinct_error() {
    let temp = tempfile::tempdir().unwrap();
    let area = open_area(&temp);

    let artifact = area.root().join("transcripts").join("broken_artifact");
    fs::write(artifact.as_std_path(), b"text").unwrap();
    fs::write(sidecar_path(&artifact).as_std_path(), b"{not json").unwrap();

    let err = load_sidecar(&artifact).unwrap_err();
    assert_matches!(err, NotegrabError::MetadataCorrupt { .. });
}

#[test]
fn listing_joins_sidecars_and_degrades_corrupt_ones() {
    let temp = tempfile::tempdir().unwrap();
    let area = open_area(&temp);
    let fetcher = TranscriptFetcher::new(area.clone(), MockTransfer { payload: b"hello" });

    fetcher
        .fetch("https://example.com/good.txt", Some("M1"), None, &NoProgress)
        .unwrap();

    let broken = area.root().join("transcripts").join("broken_artifact");
    fs::write(broken.as_std_path(), b"text").unwrap();
    fs::write(sidecar_path(&broken).as_std_path(), b"{not json").unwrap();

    let entries = fetcher.list_with_metadata().unwrap();
    assert_eq!(entries.len(), 2);
    // Sidecar files themselves are never listed as artifacts.
    assert!(entries
        .iter()
        .all(|entry| entry.record.path.extension() != Some("json")));

    let good = entries
        .iter()
        .find(|entry| entry.record.path != broken)
        .unwrap();
    assert_eq!(
        good.metadata.as_ref().unwrap().meeting_id.as_deref(),
        Some("M1")
    );
    let degraded = entries
        .iter()
        .find(|entry| entry.record.path == broken)
        .unwrap();
    assert!(degraded.metadata.is_none());
}

#[test]
fn batch_fetch_continues_past_failures() {
    let temp = tempfile::tempdir().unwrap();
    let area = open_area(&temp);
    let fetcher = TranscriptFetcher::new(area, SelectiveTransfer);

    let requests: Vec<FetchRequest> = ["https://example.com/one.txt", "https://example.com/bad.txt"]
        .iter()
        .map(|url| FetchRequest {
            url: url.to_string(),
            meeting_id: None,
            metadata: None,
        })
        .collect();

    let results = fetcher.fetch_many(&requests, &NoProgress);
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_ok());
    assert_matches!(results[1].1, Err(NotegrabError::Transport(_)));
}
