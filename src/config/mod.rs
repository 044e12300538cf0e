use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::OutputFormat;
use crate::input::{read_line_list, CsvColumns};
use crate::transcript::RetryPolicy;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transcript provider settings
    pub api: ApiConfig,

    /// Retry and backoff settings
    pub retry: RetryConfig,

    /// Output layout settings
    pub output: OutputConfig,

    /// Batch loop settings
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Transcript endpoint
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Ask the provider for segment timestamps
    pub include_timestamp: bool,

    /// Ask the provider for title/channel metadata
    pub send_metadata: bool,

    /// Proxy list, used when the file exists
    pub proxies_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per video, first call included
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,

    /// Add random jitter to backoff delays
    pub jitter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for transcripts
    pub directory: PathBuf,

    /// Output format
    pub format: OutputFormat,

    /// Aggregate file name inside the root directory
    pub aggregate_file: String,

    /// Append a run timestamp to the root directory name
    pub timestamped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between videos in milliseconds
    pub request_delay_ms: u64,

    /// CSV column holding the URL or ID
    pub url_column: String,

    /// CSV column holding the playlist/category name
    pub group_column: Option<String>,

    /// Download the video file with yt-dlp as well
    pub download_video: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://transcriptapi.com/api/v2/youtube/transcript".to_string(),
            timeout_secs: 30,
            include_timestamp: true,
            send_metadata: true,
            proxies_file: PathBuf::from("proxies.txt"),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("transcripts"),
            format: OutputFormat::Markdown,
            aggregate_file: "all_transcripts.txt".to_string(),
            timestamped: false,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 500,
            url_column: "url".to_string(),
            group_column: Some("playlist".to_string()),
            download_video: false,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, the default locations, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().ok().filter(|path| path.exists()),
        };

        let config = match path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                let content =
                    fs_err::read_to_string(&path).context("Failed to read config file")?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config file")
    }

    /// Save configuration to `path`, or to the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("yt-transcripts").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("API base URL must use HTTP or HTTPS protocol");
        }

        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than zero");
        }

        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }

        if self.output.aggregate_file.trim().is_empty() {
            anyhow::bail!("output.aggregate_file must not be empty");
        }

        Ok(())
    }

    /// Read the proxy list; a missing default file just means no proxies
    pub fn load_proxies(&self, explicit: Option<&Path>) -> Result<Vec<String>> {
        let path = explicit.unwrap_or(self.api.proxies_file.as_path());

        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Proxy file not found: {}", path.display());
            }
            return Ok(Vec::new());
        }

        let proxies = read_line_list(path)
            .with_context(|| format!("Failed to read proxy file {}", path.display()))?;
        tracing::info!("Loaded {} proxies from {}", proxies.len(), path.display());

        Ok(proxies)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.batch.request_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            jitter: self.retry.jitter,
        }
    }

    pub fn csv_columns(&self) -> CsvColumns {
        CsvColumns {
            url: self.batch.url_column.clone(),
            group: self.batch.group_column.clone(),
        }
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API Endpoint: {}", self.api.base_url);
        println!("  Timeout: {}s", self.api.timeout_secs);
        println!("  Timestamps: {}", self.api.include_timestamp);
        println!("  Metadata: {}", self.api.send_metadata);
        println!("  Proxy File: {}", self.api.proxies_file.display());
        println!(
            "  Retries: {} attempts, {}ms base delay, {}ms max delay{}",
            self.retry.max_attempts,
            self.retry.base_delay_ms,
            self.retry.max_delay_ms,
            if self.retry.jitter { ", jitter" } else { "" }
        );
        println!("  Output Directory: {}", self.output.directory.display());
        println!("  Output Format: {}", self.output.format);
        println!("  Aggregate File: {}", self.output.aggregate_file);
        println!("  Timestamped Folders: {}", self.output.timestamped);
        println!("  Delay Between Videos: {}ms", self.batch.request_delay_ms);
        println!("  Download Video: {}", self.batch.download_video);
    }
}
