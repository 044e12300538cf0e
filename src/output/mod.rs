use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::error::{BatchError, BatchResult};
use crate::extractors::VideoReference;
use crate::transcript::TranscriptResult;
use crate::utils::sanitize_filename;

pub mod formatters;

pub use formatters::*;

/// Folder used when neither the input nor the provider names a channel or playlist
pub const UNCATEGORIZED: &str = "uncategorized";

/// Where a transcript ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTranscript {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub file_stem: String,
}

/// Writes transcripts under `<root>/<folder>/<title>.<ext>` plus a run-wide aggregate file
pub struct OutputWriter {
    root: PathBuf,
    format: OutputFormat,
    aggregate_path: PathBuf,
    /// Paths written during this run, with the video that owns each
    written: HashMap<PathBuf, String>,
}

impl OutputWriter {
    /// Create the root directory and start a fresh aggregate file
    pub fn create(root: &Path, format: OutputFormat, aggregate_file: &str) -> BatchResult<Self> {
        fs_err::create_dir_all(root).map_err(|e| write_error(root, e))?;

        let aggregate_path = root.join(aggregate_file);
        fs_err::File::create(&aggregate_path).map_err(|e| write_error(&aggregate_path, e))?;

        tracing::debug!(
            "Writing {} transcripts under {}",
            format,
            root.display()
        );

        Ok(Self {
            root: root.to_path_buf(),
            format,
            aggregate_path,
            written: HashMap::new(),
        })
    }

    /// Folder name: input group, then channel, then playlist, else `uncategorized`
    pub fn folder_name(result: &TranscriptResult, video: &VideoReference) -> String {
        let playlist = video
            .playlist_id
            .as_ref()
            .map(|id| format!("playlist-{}", id));

        [video.group.clone(), result.channel.clone(), playlist]
            .into_iter()
            .flatten()
            .map(|name| sanitize_filename(&name))
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }

    /// File stem derived from the title, falling back to the video ID
    pub fn file_stem(result: &TranscriptResult) -> String {
        let stem = sanitize_filename(&result.title);
        if stem.is_empty() {
            format!("transcript_{}", result.video_id)
        } else {
            stem
        }
    }

    /// Target path, disambiguated when another video of this run already took it
    fn target(&self, result: &TranscriptResult, video: &VideoReference) -> WrittenTranscript {
        let directory = self.root.join(Self::folder_name(result, video));
        let extension = self.format.extension();

        let mut file_stem = Self::file_stem(result);
        let mut path = directory.join(format!("{}.{}", file_stem, extension));

        if let Some(owner) = self.written.get(&path) {
            if owner != &result.video_id {
                file_stem = format!("{} [{}]", file_stem, result.video_id);
                path = directory.join(format!("{}.{}", file_stem, extension));
            }
        }

        WrittenTranscript {
            path,
            directory,
            file_stem,
        }
    }

    /// Render and write one transcript, then append it to the aggregate file.
    ///
    /// Only a failure to write the transcript itself is an error.
    pub fn write(
        &mut self,
        result: &TranscriptResult,
        video: &VideoReference,
    ) -> BatchResult<WrittenTranscript> {
        let target = self.target(result, video);

        let content = render(result, self.format).map_err(|e| write_error(&target.path, e.into()))?;

        fs_err::create_dir_all(&target.directory).map_err(|e| write_error(&target.directory, e))?;
        write_atomic(&target.path, content.as_bytes())?;
        self.written
            .insert(target.path.clone(), result.video_id.clone());

        // The transcript is on disk; a missing aggregate entry is only reported
        if let Err(error) = self.append_aggregate(result) {
            tracing::warn!("Transcript {} kept, aggregate not updated: {}", result.video_id, error);
        }

        tracing::debug!("Wrote {}", target.path.display());
        Ok(target)
    }

    fn append_aggregate(&self, result: &TranscriptResult) -> BatchResult<()> {
        let mut file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.aggregate_path)
            .map_err(|e| write_error(&self.aggregate_path, e))?;

        file.write_all(format_aggregate_entry(result).as_bytes())
            .map_err(|e| write_error(&self.aggregate_path, e))
    }
}

/// Write through a temporary file in the target directory, then move it into place
fn write_atomic(path: &Path, content: &[u8]) -> BatchResult<()> {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(directory).map_err(|e| write_error(path, e))?;
    temp.write_all(content).map_err(|e| write_error(path, e))?;
    temp.flush().map_err(|e| write_error(path, e))?;
    temp.persist(path).map_err(|e| write_error(path, e.error))?;

    Ok(())
}

fn write_error(path: &Path, source: std::io::Error) -> BatchError {
    BatchError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// `transcripts` → `transcripts_2024-05-01_13-45-10`
pub fn timestamped_root(base: &Path, now: DateTime<Local>) -> PathBuf {
    let name = base
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcripts".to_string());
    let stamped = format!("{}_{}", name, now.format("%Y-%m-%d_%H-%M-%S"));

    match base.parent() {
        Some(parent) => parent.join(stamped),
        None => PathBuf::from(stamped),
    }
}
