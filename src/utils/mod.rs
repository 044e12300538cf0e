/// Longest file or folder name produced by [`sanitize_filename`], in UTF-8 bytes.
///
/// Filesystems limit names to 255 bytes; the rest is left for a ` [<id>]`
/// suffix and the extension.
pub const MAX_FILENAME_BYTES: usize = 180;

/// Suffix YouTube appends to page titles
const YOUTUBE_TITLE_SUFFIX: &str = " - YouTube";

/// Sanitize a title for use as a file or folder name.
///
/// Substitution table:
///
/// | input                  | output |
/// |------------------------|--------|
/// | `/` `\` `\|`           | `-`    |
/// | `:`                    | ` -`   |
/// | `"`                    | `'`    |
/// | `*` `?` `<` `>`        | removed |
/// | control characters     | removed |
///
/// Runs of whitespace collapse to one space, leading/trailing spaces and
/// trailing dots are trimmed, and the result is capped at
/// [`MAX_FILENAME_BYTES`] on a character boundary. Returns an empty string when nothing usable is left.
pub fn sanitize_filename(title: &str) -> String {
    let title = title.trim();
    let title = title.strip_suffix(YOUTUBE_TITLE_SUFFIX).unwrap_or(title);

    let mut replaced = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '/' | '\\' | '|' => replaced.push('-'),
            ':' => replaced.push_str(" -"),
            '"' => replaced.push('\''),
            '*' | '?' | '<' | '>' => {}
            c if c.is_control() => {}
            c => replaced.push(c),
        }
    }

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped = truncate_bytes(&collapsed, MAX_FILENAME_BYTES);

    capped
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_start()
        .to_string()
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }

    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format a transcript offset as `[12.34s]`
pub fn format_offset(seconds: f64) -> String {
    format!("[{:.2}s]", seconds)
}

/// Check if the current environment has the tools the run needs
pub async fn check_dependencies(with_video: bool) -> Vec<String> {
    let mut missing = Vec::new();

    if with_video && !check_command_available("yt-dlp").await {
        missing.push("yt-dlp - required for --with-video".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
