use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NotegrabError {
    #[error("storage unavailable at {path}: {message}")]
    StorageUnavailable { path: Utf8PathBuf, message: String },

    #[error("invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("transfer failed: {0}")]
    Transport(String),

    #[error("server returned status {status} for {url}")]
    TransportStatus { status: u16, url: String },

    #[error("i/o error on {path}: {message}")]
    Io { path: Utf8PathBuf, message: String },

    #[error("sidecar metadata unreadable at {path}: {message}")]
    MetadataCorrupt { path: Utf8PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl NotegrabError {
    pub fn io(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        NotegrabError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn storage(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        NotegrabError::StorageUnavailable {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
