use std::fs::{self, File};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::error::NotegrabError;

const CHUNK_SIZE: usize = 8192;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub bytes_transferred: u64,
    /// `None` when the server omits a content length; reporting then degrades
    /// to a plain byte counter.
    pub total_bytes: Option<u64>,
    pub elapsed: Duration,
}

pub trait ProgressObserver {
    fn progress(&self, progress: Progress);
}

/// Observer that drops all events.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn progress(&self, _progress: Progress) {}
}

#[derive(Debug, Clone)]
pub struct TransferInfo {
    pub bytes_transferred: u64,
    pub elapsed: Duration,
}

pub trait Transfer: Send + Sync {
    /// Streams the body of an HTTP GET to `destination`, invoking the
    /// observer after each chunk. A non-2xx status is a transport error.
    fn stream(
        &self,
        url: &str,
        destination: &Utf8Path,
        observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError>;
}

impl<T: Transfer + ?Sized> Transfer for &T {
    fn stream(
        &self,
        url: &str,
        destination: &Utf8Path,
        observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError> {
        (**self).stream(url, destination, observer)
    }
}

#[derive(Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new() -> Result<Self, NotegrabError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("notegrab/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NotegrabError::Transport(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| NotegrabError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transfer for HttpTransfer {
    fn stream(
        &self,
        url: &str,
        destination: &Utf8Path,
        observer: &dyn ProgressObserver,
    ) -> Result<TransferInfo, NotegrabError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| NotegrabError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(NotegrabError::TransportStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let total_bytes = response.content_length();
        debug!(url, path = %destination, ?total_bytes, "starting download");

        let mut reader = response;
        let mut file = File::create(destination.as_std_path())
            .map_err(|err| NotegrabError::io(destination, err))?;
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut transferred = 0u64;
        let start = Instant::now();

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) => {
                    discard_partial(destination);
                    return Err(NotegrabError::Transport(err.to_string()));
                }
            };
            if let Err(err) = file.write_all(&buffer[..read]) {
                discard_partial(destination);
                return Err(NotegrabError::io(destination, err));
            }
            transferred += read as u64;
            observer.progress(Progress {
                bytes_transferred: transferred,
                total_bytes,
                elapsed: start.elapsed(),
            });
        }

        Ok(TransferInfo {
            bytes_transferred: transferred,
            elapsed: start.elapsed(),
        })
    }
}

// Interrupted transfers do not leave partial files behind.
fn discard_partial(destination: &Utf8Path) {
    if let Err(err) = fs::remove_file(destination.as_std_path()) {
        warn!(path = %destination, error = %err, "could not remove partial download");
    }
}
