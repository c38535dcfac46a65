use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::NotegrabError;

/// Logical kind of a stored artifact. Determines which scratch subdirectory
/// a file lands in; `General` resolves to the scratch root itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Transcripts,
    Notes,
    Attachments,
    #[default]
    General,
}

impl FileCategory {
    pub const ALL: [FileCategory; 4] = [
        FileCategory::Transcripts,
        FileCategory::Notes,
        FileCategory::Attachments,
        FileCategory::General,
    ];

    /// Subdirectory name under the scratch root, or `None` for `General`,
    /// which stores files directly at the root.
    pub fn subdir(self) -> Option<&'static str> {
        match self {
            FileCategory::Transcripts => Some("transcripts"),
            FileCategory::Notes => Some("notes"),
            FileCategory::Attachments => Some("attachments"),
            FileCategory::General => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Transcripts => "transcripts",
            FileCategory::Notes => "notes",
            FileCategory::Attachments => "attachments",
            FileCategory::General => "general",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileCategory {
    type Err = Infallible;

    // Deliberately lenient: anything unrecognized lands in General rather
    // than erroring, so callers can pass through user-supplied type strings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_lowercase().as_str() {
            "transcripts" => FileCategory::Transcripts,
            "notes" => FileCategory::Notes,
            "attachments" => FileCategory::Attachments,
            _ => FileCategory::General,
        })
    }
}

/// Derives a local filename from a URL, percent-decoding the last path
/// segment. URLs without a usable segment (no name, or no extension) get a
/// generated `downloaded_file_<unix-ts>.txt` name.
pub fn filename_from_url(url: &str) -> Result<String, NotegrabError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|err| NotegrabError::InvalidUrl(err.to_string()))?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let decoded = percent_decode_str(segment).decode_utf8_lossy();

    if decoded.is_empty() || !decoded.contains('.') {
        return Ok(format!("downloaded_file_{}.txt", Utc::now().timestamp()));
    }
    Ok(decoded.into_owned())
}
