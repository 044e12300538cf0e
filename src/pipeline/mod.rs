use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub mod summary;

pub use summary::{FailureRecord, RunSummary};

use crate::error::BatchResult;
use crate::extractors::{VideoDownloader, VideoReference};
use crate::input::InputEntry;
use crate::output::OutputWriter;
use crate::transcript::{RetryPolicy, Sleeper, TokioSleeper, TranscriptFetcher};

/// Sequential batch runner: normalize → fetch (with retries) → write, one entry at a time
pub struct BatchPipeline {
    fetcher: Box<dyn TranscriptFetcher>,
    writer: OutputWriter,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
    video_downloader: Option<Box<dyn VideoDownloader>>,
    request_delay: Duration,
    show_progress: bool,
}

impl BatchPipeline {
    pub fn new(fetcher: Box<dyn TranscriptFetcher>, writer: OutputWriter, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            writer,
            policy,
            sleeper: Box::new(TokioSleeper),
            video_downloader: None,
            request_delay: Duration::ZERO,
            show_progress: true,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_video_downloader(mut self, downloader: Box<dyn VideoDownloader>) -> Self {
        self.video_downloader = Some(downloader);
        self
    }

    /// Pause inserted between consecutive fetches
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Process every entry in order and return the run summary.
    ///
    /// Invalid references are skipped, per-item failures are recorded, and an
    /// authentication failure stops the batch with `aborted` set.
    pub async fn run<I>(&mut self, entries: I) -> RunSummary
    where
        I: IntoIterator<Item = BatchResult<InputEntry>>,
    {
        let started = Instant::now();
        let entries = entries.into_iter();
        let progress = self.progress_bar(entries.size_hint());

        let mut summary = RunSummary::default();

        for entry in entries {
            progress.inc(1);

            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::error!("{}", error);
                    summary.record_failure(FailureRecord::unreadable(&error));
                    continue;
                }
            };

            let video = match VideoReference::from_entry(&entry) {
                Ok(video) => video,
                Err(error) => {
                    tracing::warn!("Skipping line {}: {}", entry.line, error);
                    summary.record_skip(FailureRecord::new(&entry, None, &error, 0));
                    continue;
                }
            };

            if summary.attempted > 0 && !self.request_delay.is_zero() {
                self.sleeper.sleep(self.request_delay).await;
            }

            progress.set_message(format!("Fetching {}", video.video_id));
            tracing::info!("Processing line {}: {}", entry.line, video.original_url);

            summary.attempted += 1;
            if !self.process(&entry, &video, &mut summary).await {
                break;
            }
        }

        summary.elapsed = started.elapsed();

        if summary.is_aborted() {
            progress.abandon_with_message("Run aborted");
        } else {
            progress.finish_with_message(format!(
                "Done: {} succeeded, {} failed, {} skipped",
                summary.succeeded, summary.failed, summary.skipped
            ));
        }

        summary
    }

    /// Handle one normalized entry; returns `false` when the run must stop
    async fn process(&mut self, entry: &InputEntry, video: &VideoReference, summary: &mut RunSummary) -> bool {
        let outcome = self
            .policy
            .fetch(self.fetcher.as_ref(), self.sleeper.as_ref(), video)
            .await;
        let attempts = outcome.attempts();

        let result = match outcome.result {
            Ok(result) => result,
            Err(error) if error.is_fatal() => {
                tracing::error!("Fatal error, stopping the run: {}", error);
                summary.record_abort(FailureRecord::new(entry, Some(video), &error, attempts));
                return false;
            }
            Err(error) => {
                tracing::error!("Failed {}: {}", video.video_id, error);
                summary.record_failure(FailureRecord::new(entry, Some(video), &error, attempts));
                return true;
            }
        };

        let written = match self.writer.write(&result, video) {
            Ok(written) => written,
            Err(error) => {
                tracing::error!("Failed to save {}: {}", video.video_id, error);
                summary.record_failure(FailureRecord::new(entry, Some(video), &error, attempts));
                return true;
            }
        };

        tracing::info!("Saved transcript: {}", written.path.display());
        summary.record_success();

        if let Some(downloader) = &self.video_downloader {
            match downloader
                .download(video, &written.directory, &written.file_stem)
                .await
            {
                Ok(path) => {
                    tracing::info!("Saved video: {}", path.display());
                    summary.videos_downloaded += 1;
                }
                Err(error) => {
                    tracing::warn!("{}", error);
                    summary
                        .video_failures
                        .push(FailureRecord::new(entry, Some(video), &error, 1));
                }
            }
        }

        true
    }

    fn progress_bar(&self, size_hint: (usize, Option<usize>)) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        match size_hint {
            (lower, Some(upper)) if lower == upper => {
                let progress = ProgressBar::new(upper as u64);
                progress.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                progress
            }
            _ => {
                let progress = ProgressBar::new_spinner();
                progress.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {pos} entries {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                progress.enable_steady_tick(Duration::from_millis(120));
                progress
            }
        }
    }
}
