use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "yt-transcripts",
    about = "Batch-download YouTube transcripts through TranscriptAPI.com",
    version,
    long_about = "Reads YouTube URLs or video IDs from a list file, downloads each transcript through TranscriptAPI.com and writes Markdown, JSON or plain text files organized by channel or playlist."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download transcripts for every entry of a list file
    Download {
        /// List of URLs or IDs (.txt one per line, or .csv with a header row)
        #[arg(value_name = "INPUT", default_value = "list.txt")]
        input: PathBuf,

        /// TranscriptAPI.com API key
        #[arg(long, env = "TRANSCRIPT_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Root output directory
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Attempts per video before giving up (first call included)
        #[arg(long, value_name = "COUNT")]
        max_attempts: Option<u32>,

        /// Pause between videos in milliseconds
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,

        /// Write into a new timestamped output folder
        #[arg(long)]
        timestamped: bool,

        /// Also download each video with yt-dlp
        #[arg(long)]
        with_video: bool,

        /// Proxy list, one proxy URL per line
        #[arg(long, value_name = "FILE")]
        proxies: Option<PathBuf>,

        /// CSV column holding the URL or ID
        #[arg(long, value_name = "NAME")]
        url_column: Option<String>,

        /// CSV column holding the playlist/category name
        #[arg(long, value_name = "NAME")]
        group_column: Option<String>,
    },

    /// Show the video ID each entry of a list resolves to, without downloading
    Resolve {
        /// List of URLs or IDs
        #[arg(value_name = "INPUT", default_value = "list.txt")]
        input: PathBuf,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown with a metadata header
    #[value(alias = "md")]
    Markdown,
    /// Structured JSON object
    Json,
    /// Transcript body only
    #[value(alias = "txt")]
    Text,
}

impl OutputFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}
