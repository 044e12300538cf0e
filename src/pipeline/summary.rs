use console::style;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{BatchError, ErrorKind};
use crate::extractors::VideoReference;
use crate::input::InputEntry;
use crate::utils::format_duration;

/// One item that did not produce a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Raw input as written in the list
    pub input: String,

    /// Line in the list file
    pub line: usize,

    /// Video ID, when the input could be normalized
    pub video_id: Option<String>,

    pub kind: ErrorKind,

    pub message: String,

    /// Fetch attempts made before giving up
    pub attempts: u32,
}

impl FailureRecord {
    pub fn new(entry: &InputEntry, video: Option<&VideoReference>, error: &BatchError, attempts: u32) -> Self {
        Self {
            input: entry.raw.clone(),
            line: entry.line,
            video_id: video.map(|v| v.video_id.clone()),
            kind: error.kind(),
            message: error.to_string(),
            attempts,
        }
    }

    /// Failure that happened before an entry could be read
    pub fn unreadable(error: &BatchError) -> Self {
        let line = match error {
            BatchError::Input { line, .. } => *line,
            _ => 0,
        };

        Self {
            input: String::new(),
            line,
            video_id: None,
            kind: error.kind(),
            message: error.to_string(),
            attempts: 0,
        }
    }
}

/// Aggregate counters for one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<FailureRecord>,
    pub skips: Vec<FailureRecord>,
    /// The error that stopped the run early, if any
    pub aborted: Option<FailureRecord>,
    pub videos_downloaded: usize,
    pub video_failures: Vec<FailureRecord>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failed += 1;
        self.failures.push(record);
    }

    pub fn record_skip(&mut self, record: FailureRecord) {
        self.skipped += 1;
        self.skips.push(record);
    }

    /// Record the fatal error and mark the run as aborted
    pub fn record_abort(&mut self, record: FailureRecord) {
        self.aborted = Some(record.clone());
        self.record_failure(record);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Print the final report to standard output
    pub fn print(&self, output_root: &Path) {
        let rule = "=".repeat(60);

        println!("\n{}", rule);
        println!("{}", style("Run summary").bold());
        println!("{}", rule);
        println!("{} {}", style("Attempted:").bold(), self.attempted);
        println!("{} {}", style("Succeeded:").green().bold(), self.succeeded);
        println!("{} {}", style("Failed:").red().bold(), self.failed);
        println!("{} {}", style("Skipped:").yellow().bold(), self.skipped);
        if self.videos_downloaded > 0 || !self.video_failures.is_empty() {
            println!(
                "{} {} downloaded, {} failed",
                style("Videos:").bold(),
                self.videos_downloaded,
                self.video_failures.len()
            );
        }
        println!("{} {}", style("Output:").bold(), output_root.display());
        println!(
            "{} {}",
            style("Elapsed:").bold(),
            format_duration(self.elapsed.as_secs_f64())
        );

        if !self.failures.is_empty() {
            println!("\n{}", style("Failures:").red().bold());
            for failure in &self.failures {
                let attempts = if failure.attempts > 1 {
                    format!(" after {} attempts", failure.attempts)
                } else {
                    String::new()
                };
                println!(
                    "  • line {}: {} [{}{}] {}",
                    failure.line,
                    failure.video_id.as_deref().unwrap_or(&failure.input),
                    failure.kind,
                    attempts,
                    failure.message
                );
            }
        }

        if !self.skips.is_empty() {
            println!("\n{}", style("Skipped (not a YouTube URL or ID):").yellow().bold());
            for skip in &self.skips {
                println!("  • line {}: {}", skip.line, skip.input);
            }
        }

        for failure in &self.video_failures {
            println!(
                "  {} video {}: {}",
                style("!").yellow(),
                failure.video_id.as_deref().unwrap_or(&failure.input),
                failure.message
            );
        }

        if let Some(abort) = &self.aborted {
            println!(
                "\n{} {}",
                style("Run aborted:").red().bold(),
                abort.message
            );
        }

        println!("{}\n", rule);
    }
}
