use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

use super::{VideoDownloader, VideoReference};
use crate::error::{BatchError, BatchResult};

/// Length of a bare YouTube video ID
const BARE_ID_LEN: usize = 11;

/// Upper bound for IDs pulled out of a recognised URL shape
const MAX_EMBEDDED_ID_LEN: usize = 64;

/// Path prefixes that carry the video ID as the next segment
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live", "e"];

/// Video and playlist IDs found in a raw input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedId {
    pub video_id: String,
    pub playlist_id: Option<String>,
}

/// Recognizes YouTube URL shapes and pulls out the video ID
pub struct YoutubeExtractor;

impl YoutubeExtractor {
    /// Extract the video ID (and playlist ID, when present) from a URL or bare ID
    pub fn extract(raw: &str) -> Option<ExtractedId> {
        let raw = raw.trim();

        if is_bare_id(raw) {
            return Some(ExtractedId {
                video_id: raw.to_string(),
                playlist_id: None,
            });
        }

        let url = parse_loose(raw)?;
        let host = url.host_str()?.to_ascii_lowercase();
        if !is_youtube_host(&host) {
            return None;
        }

        let query = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| is_embedded_id(v))
        };

        let playlist_id = query("list");

        let video_id = if host == "youtu.be" {
            url.path_segments()
                .and_then(|mut segs| segs.next())
                .map(str::to_string)
        } else if url.path().trim_end_matches('/') == "/watch" {
            query("v")
        } else {
            url.path_segments().and_then(|mut segs| {
                let prefix = segs.next()?;
                let id = segs.next()?;
                ID_PATH_PREFIXES.contains(&prefix).then(|| id.to_string())
            })
        };

        let video_id = video_id.filter(|id| is_embedded_id(id))?;

        Some(ExtractedId {
            video_id,
            playlist_id,
        })
    }
}

/// Parse a URL, accepting scheme-less YouTube links such as `youtu.be/ID`
fn parse_loose(raw: &str) -> Option<Url> {
    if raw.contains("://") {
        return Url::parse(raw).ok();
    }

    let lower = raw.to_ascii_lowercase();
    if lower.contains("youtube.com/")
        || lower.contains("youtu.be/")
        || lower.contains("youtube-nocookie.com/")
    {
        return Url::parse(&format!("https://{}", raw)).ok();
    }

    None
}

pub fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtube.com"
        || host == "youtu.be"
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube.com")
        || host.ends_with(".youtube-nocookie.com")
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// A bare ID is exactly eleven characters of the ID alphabet
fn is_bare_id(s: &str) -> bool {
    s.len() == BARE_ID_LEN && s.chars().all(is_id_char)
}

fn is_embedded_id(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_EMBEDDED_ID_LEN && s.chars().all(is_id_char)
}

/// Video downloader backed by yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }
}

#[async_trait]
impl VideoDownloader for YtDlpDownloader {
    async fn download(
        &self,
        video: &VideoReference,
        directory: &Path,
        file_stem: &str,
    ) -> BatchResult<PathBuf> {
        tracing::debug!("Downloading video {} with yt-dlp", video.video_id);

        let template = directory.join(format!("{}.%(ext)s", file_stem));
        let output_arg = template.to_string_lossy().into_owned();
        let watch_url = video.watch_url();

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                output_arg.as_str(),
                "--format",
                "bv*+ba/b",
                "--no-playlist",
                "--force-overwrites",
                "--print",
                "after_move:filepath",
                "--no-simulate",
                watch_url.as_str(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BatchError::VideoDownload {
                video_id: video.video_id.clone(),
                reason: format!("could not run yt-dlp: {}", e),
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(BatchError::VideoDownload {
                video_id: video.video_id.clone(),
                reason: error.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .unwrap_or(template);

        Ok(path)
    }
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}
