use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod retry;

pub use client::TranscriptApiClient;
pub use retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};

use crate::error::BatchResult;
use crate::extractors::VideoReference;

/// A fetched transcript with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Video title (falls back to `Transcript <id>`)
    pub title: String,

    /// Platform video ID
    pub video_id: String,

    /// Detected language code
    pub language: String,

    /// Transcript text
    pub body: TranscriptBody,

    /// Link the user supplied
    pub source_url: String,

    /// Channel name, when the provider sent metadata
    pub channel: Option<String>,

    /// Channel URL, when the provider sent metadata
    pub channel_url: Option<String>,
}

/// Transcript content: timed segments or one text blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptBody {
    Segments(Vec<TranscriptSegment>),
    Text(String),
}

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Segment text
    pub text: String,

    /// Start time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,

    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl TranscriptBody {
    pub fn is_empty(&self) -> bool {
        match self {
            TranscriptBody::Segments(segments) => segments.is_empty(),
            TranscriptBody::Text(text) => text.trim().is_empty(),
        }
    }
}

/// Fetches one transcript from a provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Issue a single request for `video`
    async fn fetch(&self, video: &VideoReference) -> BatchResult<TranscriptResult>;
}
