use serde::Serialize;

use crate::cli::OutputFormat;
use crate::transcript::{TranscriptBody, TranscriptResult};
use crate::utils::format_offset;

/// JSON shape of a written transcript
#[derive(Debug, Serialize)]
struct JsonTranscript<'a> {
    title: &'a str,
    link: &'a str,
    video_id: &'a str,
    language: &'a str,
    channel: Option<&'a str>,
    channel_url: Option<&'a str>,
    transcript: &'a TranscriptBody,
}

/// Render a transcript in the selected format
pub fn render(result: &TranscriptResult, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Markdown => Ok(format_as_markdown(result)),
        OutputFormat::Json => format_as_json(result),
        OutputFormat::Text => Ok(format_as_text(result)),
    }
}

/// Transcript body as readable lines, with `[12.34s]` offsets when known
pub fn format_body(body: &TranscriptBody) -> String {
    match body {
        TranscriptBody::Segments(segments) => segments
            .iter()
            .map(|segment| match segment.start {
                Some(start) => format!("{} {}", format_offset(start), segment.text.trim()),
                None => segment.text.trim().to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        TranscriptBody::Text(text) => text.trim().to_string(),
    }
}

/// Markdown document: heading, link, ID, language, then the transcript
pub fn format_as_markdown(result: &TranscriptResult) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", result.title));
    output.push_str(&format!("**Original Link:** {}\n", result.source_url));
    output.push_str(&format!("**Video ID:** {}\n", result.video_id));
    output.push_str(&format!("**Detected Language:** {}\n\n", result.language));
    output.push_str("---\n\n");
    output.push_str("## Transcript\n\n");
    output.push_str(&format_body(&result.body));
    output.push('\n');

    if let Some(channel) = &result.channel {
        output.push_str(&format!("\n**Channel:** {}", channel));
        if let Some(url) = &result.channel_url {
            output.push_str(&format!(" ({})", url));
        }
        output.push('\n');
    }

    output
}

pub fn format_as_json(result: &TranscriptResult) -> serde_json::Result<String> {
    let json = JsonTranscript {
        title: &result.title,
        link: &result.source_url,
        video_id: &result.video_id,
        language: &result.language,
        channel: result.channel.as_deref(),
        channel_url: result.channel_url.as_deref(),
        transcript: &result.body,
    };

    let mut output = serde_json::to_string_pretty(&json)?;
    output.push('\n');
    Ok(output)
}

/// Transcript body only
pub fn format_as_text(result: &TranscriptResult) -> String {
    let mut output = format_body(&result.body);
    output.push('\n');
    output
}

/// Entry appended to the run-wide aggregate file
pub fn format_aggregate_entry(result: &TranscriptResult) -> String {
    let rule = "=".repeat(60);
    format!(
        "{rule}\n{title}\n{link}\nVideo ID: {id} | Language: {language}\n{rule}\n\n{body}\n\n",
        rule = rule,
        title = result.title,
        link = result.source_url,
        id = result.video_id,
        language = result.language,
        body = format_body(&result.body),
    )
}
