use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use notegrab::app::{App, DownloadOptions};
use notegrab::config::Locations;
use notegrab::domain::FileCategory;
use notegrab::error::NotegrabError;
use notegrab::transfer::{NoProgress, ProgressObserver, Transfer, TransferInfo};

struct MockTransfer;

impl Transfer for MockTransfer {
    fn stream(
        &self,
        _url: &str,
        destination: &Utf8Path,
        _observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError> {
        fs::write(destination.as_std_path(), b"payload")
            .map_err(|err| NotegrabError::io(destination, err))?;
        Ok(TransferInfo {
            bytes_transferred: 7,
            elapsed: Duration::from_millis(1),
        })
    }
}

struct FailingTransfer;

impl Transfer for FailingTransfer {
    fn stream(
        &self,
        _url: &str,
        _destination: &Utf8Path,
        _observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError> {
        Err(NotegrabError::Transport("connection reset".to_string()))
    }
}

fn test_locations(temp: &tempfile::TempDir) -> Locations {
    let downloads = Utf8PathBuf::from_path_buf(temp.path().join("downloads")).unwrap();
    let scratch = Utf8PathBuf::from_path_buf(temp.path().join("scratch")).unwrap();
    Locations::with_roots(downloads, scratch)
}

#[test]
fn download_to_persistent_dir_derives_filename_from_url() {
    let temp = tempfile::tempdir().unwrap();
    let locations = test_locations(&temp);
    let app = App::new(locations.clone(), MockTransfer);

    let options = DownloadOptions {
        filename: None,
        use_temp: false,
        category: FileCategory::General,
    };
    let report = app
        .download("https://example.com/files/report.pdf", options, &NoProgress)
        .unwrap();

    assert_eq!(
        report.path,
        locations.download_root.join("report.pdf").as_str()
    );
    assert!(locations.download_root.join("report.pdf").as_std_path().exists());
    assert_eq!(report.size_bytes, 7);
    assert!(!report.temp);
}

#[test]
fn download_with_temp_routes_to_category_dir() {
    let temp = tempfile::tempdir().unwrap();
    let locations = test_locations(&temp);
    let app = App::new(locations.clone(), MockTransfer);

    let options = DownloadOptions {
        filename: Some("agenda.txt".to_string()),
        use_temp: true,
        category: FileCategory::Notes,
    };
    let report = app
        .download("https://example.com/agenda", options, &NoProgress)
        .unwrap();

    let path = Utf8PathBuf::from(&report.path);
    assert!(path.starts_with(locations.scratch_root.join("notes")));
    let name = path.file_name().unwrap();
    assert!(name.starts_with("agenda_"));
    assert!(name.ends_with(".txt"));
    assert!(path.as_std_path().exists());
}

#[test]
fn transport_failure_propagates() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(test_locations(&temp), FailingTransfer);

    let options = DownloadOptions {
        filename: Some("x.txt".to_string()),
        use_temp: false,
        category: FileCategory::General,
    };
    let err = app
        .download("https://example.com/x.txt", options, &NoProgress)
        .unwrap_err();
    assert_matches!(err, NotegrabError::Transport(_));
}

#[test]
fn list_persistent_downloads() {
    let temp = tempfile::tempdir().unwrap();
    let locations = test_locations(&temp);
    let app = App::new(locations.clone(), MockTransfer);

    // Empty (not yet created) download dir lists as empty, not an error.
    let report = app.list(false, None).unwrap();
    assert!(report.files.is_empty());

    let options = DownloadOptions {
        filename: None,
        use_temp: false,
        category: FileCategory::General,
    };
    app.download("https://example.com/one.txt", options, &NoProgress)
        .unwrap();

    let report = app.list(false, None).unwrap();
    assert_eq!(report.files.len(), 1);
    assert!(report.files[0].path.ends_with("one.txt"));
    assert_eq!(report.files[0].size_bytes, 7);
}

#[test]
fn list_temp_filters_by_category() {
    let temp = tempfile::tempdir().unwrap();
    let locations = test_locations(&temp);
    let app = App::new(locations.clone(), MockTransfer);

    for (name, category) in [
        ("a.txt", FileCategory::Notes),
        ("b.txt", FileCategory::Attachments),
    ] {
        let options = DownloadOptions {
            filename: Some(name.to_string()),
            use_temp: true,
            category,
        };
        app.download("https://example.com/f", options, &NoProgress)
            .unwrap();
    }

    let notes = app.list(true, Some(FileCategory::Notes)).unwrap();
    assert_eq!(notes.files.len(), 1);
    assert!(notes.files[0].path.contains("/notes/"));

    let everything = app.list(true, None).unwrap();
    assert_eq!(everything.files.len(), 2);
}

#[test]
fn inventory_reports_retention_hours() {
    let temp = tempfile::tempdir().unwrap();
    let locations = test_locations(&temp).retention(Duration::from_secs(48 * 3600));
    let app = App::new(locations, MockTransfer);

    let inventory = app.inventory().unwrap();
    assert_eq!(inventory.retention_hours, 48);
    assert_eq!(inventory.file_count, 0);
}
