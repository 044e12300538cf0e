use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod youtube;

use crate::error::{BatchError, BatchResult};
use crate::input::InputEntry;

/// Normalized identity of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoReference {
    /// Platform video ID
    pub video_id: String,

    /// The input exactly as the user wrote it
    pub original_url: String,

    /// Playlist ID from a `list=` parameter, if any
    pub playlist_id: Option<String>,

    /// Playlist/category name carried over from the input list
    pub group: Option<String>,
}

impl VideoReference {
    /// Normalize a raw URL or ID
    pub fn parse(raw: &str) -> BatchResult<Self> {
        let extracted = youtube::YoutubeExtractor::extract(raw).ok_or_else(|| {
            BatchError::InvalidReference {
                input: raw.to_string(),
            }
        })?;

        Ok(Self {
            video_id: extracted.video_id,
            original_url: raw.to_string(),
            playlist_id: extracted.playlist_id,
            group: None,
        })
    }

    /// Normalize an input entry, keeping its group
    pub fn from_entry(entry: &InputEntry) -> BatchResult<Self> {
        let mut reference = Self::parse(&entry.raw)?;
        reference.group = entry.group.clone();
        Ok(reference)
    }

    /// Canonical watch URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.video_id)
    }
}

/// Downloads the video file itself next to its transcript
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoDownloader: Send + Sync {
    /// Download `video` into `directory`, naming it after `file_stem`
    async fn download(
        &self,
        video: &VideoReference,
        directory: &Path,
        file_stem: &str,
    ) -> BatchResult<PathBuf>;
}
