use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading, fetching or writing a single batch item.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("Failed to read input at line {line}: {reason}")]
    Input { line: usize, reason: String },

    #[error("Not a recognizable YouTube URL or video ID: {input}")]
    InvalidReference { input: String },

    #[error("Unauthorized: {message}. Check your TRANSCRIPT_API_KEY.")]
    Auth { message: String },

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transcript unavailable for {video_id} (video not found, private or without captions)")]
    NotFound { video_id: String },

    #[error("Network error: {message}")]
    TransientNetwork { message: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected API response: {message}")]
    InvalidResponse { message: String },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video download failed for {video_id}: {reason}")]
    VideoDownload { video_id: String, reason: String },
}

/// Coarse classification of a [`BatchError`], kept in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputNotFound,
    Input,
    InvalidReference,
    Auth,
    RateLimited,
    NotFound,
    TransientNetwork,
    Api,
    InvalidResponse,
    Write,
    Config,
    VideoDownload,
}

impl BatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound { .. } => ErrorKind::InputNotFound,
            Self::Input { .. } => ErrorKind::Input,
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            Self::Api { .. } => ErrorKind::Api,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::Write { .. } => ErrorKind::Write,
            Self::Config(_) => ErrorKind::Config,
            Self::VideoDownload { .. } => ErrorKind::VideoDownload,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl ErrorKind {
    /// Rate limits and network hiccups are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::TransientNetwork)
    }

    /// Errors that make every remaining item pointless.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::Auth | ErrorKind::InputNotFound | ErrorKind::Config
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InputNotFound => "input_not_found",
            ErrorKind::Input => "input",
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Api => "api",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::Write => "write",
            ErrorKind::Config => "config",
            ErrorKind::VideoDownload => "video_download",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(BatchError::RateLimited { retry_after: None }.is_retryable());
        assert!(BatchError::TransientNetwork { message: "reset".into() }.is_retryable());
        assert!(!BatchError::NotFound { video_id: "abc".into() }.is_retryable());
        assert!(!BatchError::Auth { message: "bad key".into() }.is_retryable());
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(BatchError::Auth { message: "bad key".into() }.is_fatal());
        assert!(!BatchError::InvalidReference { input: "x".into() }.is_fatal());
        assert!(!BatchError::Api { status: 400, message: "bad".into() }.is_fatal());
    }

    #[test]
    fn test_auth_message_mentions_env_var() {
        let err = BatchError::Auth { message: "Invalid or missing API key".into() };
        assert!(err.to_string().contains("TRANSCRIPT_API_KEY"));
    }
}
