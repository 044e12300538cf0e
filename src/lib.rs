//! yt-transcripts - batch-download YouTube transcripts from a list of URLs
//!
//! This library reads YouTube URLs or IDs from a list file, fetches each
//! transcript through TranscriptAPI.com with bounded retries, and writes
//! Markdown, JSON or plain text files organized by channel or playlist.

pub mod cli;
pub mod config;
pub mod error;
pub mod extractors;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod transcript;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use error::{BatchError, ErrorKind};
pub use extractors::VideoReference;
pub use input::{InputEntry, InputLoader};
pub use output::OutputWriter;
pub use pipeline::{BatchPipeline, RunSummary};
pub use transcript::{TranscriptApiClient, TranscriptFetcher, TranscriptResult};

/// Result type used throughout the application layer
pub type Result<T> = anyhow::Result<T>;
