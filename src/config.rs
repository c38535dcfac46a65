use std::env;
use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;

use crate::error::NotegrabError;

/// Fixed application subfolder under both the persistent downloads area and
/// the platform temp directory.
pub const APP_DIR: &str = "notegrab";

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Directory configuration, injected into everything that touches disk.
/// There is no ambient process-wide directory state.
#[derive(Debug, Clone)]
pub struct Locations {
    pub download_root: Utf8PathBuf,
    pub scratch_root: Utf8PathBuf,
    pub retention: Duration,
}

impl Locations {
    /// Platform defaults: `~/Downloads/notegrab` for persistent files and
    /// `<temp>/notegrab` for the scratch area, with a 24 hour retention
    /// window.
    pub fn discover() -> Result<Self, NotegrabError> {
        let download_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join("Downloads").join(APP_DIR)).ok()
            })
            .ok_or_else(|| {
                NotegrabError::Filesystem("unable to resolve home downloads directory".to_string())
            })?;

        let scratch_root = Utf8PathBuf::from_path_buf(env::temp_dir().join(APP_DIR))
            .map_err(|_| NotegrabError::Filesystem("non-UTF-8 temp directory".to_string()))?;

        Ok(Self {
            download_root,
            scratch_root,
            retention: DEFAULT_RETENTION,
        })
    }

    pub fn with_roots(download_root: Utf8PathBuf, scratch_root: Utf8PathBuf) -> Self {
        Self {
            download_root,
            scratch_root,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Idempotent; a pre-existing directory is not an error.
    pub fn ensure_download_root(&self) -> Result<(), NotegrabError> {
        fs::create_dir_all(self.download_root.as_std_path())
            .map_err(|err| NotegrabError::storage(self.download_root.clone(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_uses_app_subfolders() {
        let locations = Locations::discover().unwrap();
        assert!(locations.download_root.as_str().ends_with(APP_DIR));
        assert!(locations.scratch_root.as_str().ends_with(APP_DIR));
        assert_eq!(locations.retention, DEFAULT_RETENTION);
    }

    #[test]
    fn retention_override() {
        let locations = Locations::with_roots("/tmp/a".into(), "/tmp/b".into())
            .retention(Duration::from_secs(60));
        assert_eq!(locations.retention, Duration::from_secs(60));
    }
}
