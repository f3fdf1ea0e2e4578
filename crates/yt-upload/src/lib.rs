//! Video upload client for the YouTube Data API v3.
//!
//! Holds the `videos.insert` resource types, the [`UploadObserver`] seam that
//! receives progress notifications, and [`ResumableUploader`], which speaks the
//! resumable upload protocol over `reqwest`.

mod resumable;

pub use resumable::{DEFAULT_CHUNK_SIZE, ResumableUploader};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource parts set by an insert request
pub const INSERT_PARTS: &str = "snippet,status";

/// MIME type declared for the uploaded media
pub const VIDEO_MIME_WILDCARD: &str = "video/*";

/// Visibility of an uploaded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Unlisted,
    Private,
    Public,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
            PrivacyStatus::Public => "public",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "private" => Ok(PrivacyStatus::Private),
            "public" => Ok(PrivacyStatus::Public),
            other => Err(format!(
                "unknown privacy status '{}' (expected unlisted, private or public)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    pub privacy_status: PrivacyStatus,
}

/// Metadata sent with an insert request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResource {
    pub snippet: VideoSnippet,
    pub status: VideoStatus,
}

/// Video resource returned once the upload is complete
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
    #[serde(default)]
    pub status: Option<VideoStatus>,
}

/// Progress notification emitted while an upload runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadProgress {
    /// Session is being initiated, no media bytes sent yet
    Starting,
    /// Server confirmed `bytes_sent` bytes so far
    Uploading { bytes_sent: u64 },
    /// All bytes were accepted
    Completed { bytes_sent: u64 },
    /// Upload stopped and will not continue
    Failed { bytes_sent: u64, error: String },
}

/// Receives upload notifications in order from a single task.
pub trait UploadObserver: Send {
    fn on_progress(&mut self, progress: &UploadProgress);

    /// Called once, only after the service accepted every byte.
    fn on_response(&mut self, video: &Video);
}

/// Media to upload. Owns the file handle so it is closed when the upload ends.
#[derive(Debug)]
pub struct UploadMedia {
    pub file: tokio::fs::File,
    pub total_size: u64,
    pub mime_type: String,
}

impl UploadMedia {
    pub fn new(file: tokio::fs::File, total_size: u64) -> Self {
        Self {
            file,
            total_size,
            mime_type: VIDEO_MIME_WILDCARD.to_string(),
        }
    }
}

/// Upload failure. May aggregate several underlying causes collected across retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upload failed: {}", causes.join("; "))]
pub struct UploadError {
    causes: Vec<String>,
}

impl UploadError {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            causes: vec![cause.into()],
        }
    }

    pub fn from_causes(causes: Vec<String>) -> Self {
        Self { causes }
    }

    pub fn causes(&self) -> &[String] {
        &self.causes
    }
}

/// Inserts a video. Implemented by [`ResumableUploader`] and by test stubs.
#[async_trait::async_trait]
pub trait VideoUploader: Send + Sync {
    async fn insert(
        &self,
        access_token: &str,
        resource: &VideoResource,
        media: UploadMedia,
        observer: &mut dyn UploadObserver,
    ) -> Result<Video, UploadError>;
}
