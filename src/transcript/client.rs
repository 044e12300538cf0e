use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{TranscriptBody, TranscriptFetcher, TranscriptResult, TranscriptSegment};
use crate::config::ApiConfig;
use crate::error::{BatchError, BatchResult};
use crate::extractors::VideoReference;

/// TranscriptAPI.com response body
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    transcript: Option<RawTranscript>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    metadata: Option<ApiMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTranscript {
    Segments(Vec<RawSegment>),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSegment {
    Timed(TranscriptSegment),
    Plain(String),
}

#[derive(Debug, Default, Deserialize)]
struct ApiMetadata {
    title: Option<String>,
    author_name: Option<String>,
    author_url: Option<String>,
}

/// HTTP client for the TranscriptAPI.com transcript endpoint
pub struct TranscriptApiClient {
    /// One client per proxy, or a single direct client
    clients: Vec<Client>,
    next_client: AtomicUsize,
    api_key: String,
    base_url: String,
    include_timestamp: bool,
    send_metadata: bool,
}

impl TranscriptApiClient {
    /// Build a client; the key is passed in, never read from the environment here
    pub fn new(api_key: impl Into<String>, config: &ApiConfig, proxies: &[String]) -> BatchResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BatchError::Auth {
                message: "API key is required".to_string(),
            });
        }

        let timeout = config.timeout();

        let clients = if proxies.is_empty() {
            vec![build_client(timeout, None)?]
        } else {
            proxies
                .iter()
                .map(|proxy| build_client(timeout, Some(proxy)))
                .collect::<BatchResult<Vec<_>>>()?
        };

        Ok(Self::with_clients(clients, api_key, config))
    }

    fn with_clients(clients: Vec<Client>, api_key: String, config: &ApiConfig) -> Self {
        Self {
            clients,
            next_client: AtomicUsize::new(0),
            api_key,
            base_url: config.base_url.clone(),
            include_timestamp: config.include_timestamp,
            send_metadata: config.send_metadata,
        }
    }

    /// Number of outbound routes (proxies, or one direct route)
    pub fn route_count(&self) -> usize {
        self.clients.len()
    }

    /// Round-robin over the configured routes
    fn client(&self) -> &Client {
        let index = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }
}

fn build_client(timeout: Duration, proxy: Option<&str>) -> BatchResult<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("yt-transcripts/", env!("CARGO_PKG_VERSION")));

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| BatchError::Config(format!("Invalid proxy '{}': {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| BatchError::Config(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl TranscriptFetcher for TranscriptApiClient {
    async fn fetch(&self, video: &VideoReference) -> BatchResult<TranscriptResult> {
        tracing::debug!("Requesting transcript for {}", video.video_id);

        let response = self
            .client()
            .get(&self.base_url)
            .bearer_auth(&self.api_key)
            .query(&[
                ("video_url", video.watch_url()),
                ("format", "json".to_string()),
                ("include_timestamp", self.include_timestamp.to_string()),
                ("send_metadata", self.send_metadata.to_string()),
            ])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.map_err(network_error)?;

        if status == StatusCode::OK {
            parse_response(video, &body)
        } else {
            Err(classify_status(status, retry_after, &body, video))
        }
    }
}

fn network_error(error: reqwest::Error) -> BatchError {
    BatchError::TransientNetwork {
        message: error.to_string(),
    }
}

/// Map a non-200 response onto the error taxonomy
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    video: &VideoReference,
) -> BatchError {
    match status.as_u16() {
        401 | 403 => BatchError::Auth {
            message: "Invalid or missing API key".to_string(),
        },
        402 => BatchError::Auth {
            message: format!("Payment required: {}", error_detail(body)),
        },
        404 => BatchError::NotFound {
            video_id: video.video_id.clone(),
        },
        422 => BatchError::InvalidReference {
            input: video.original_url.clone(),
        },
        429 => BatchError::RateLimited { retry_after },
        408 | 500..=599 => BatchError::TransientNetwork {
            message: format!("HTTP {}: {}", status.as_u16(), error_detail(body)),
        },
        code => BatchError::Api {
            status: code,
            message: error_detail(body),
        },
    }
}

/// Pull `detail` out of an error body, falling back to the raw text
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned())
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        });

    match detail {
        Some(detail) => detail,
        None if body.trim().is_empty() => "Unknown error".to_string(),
        None => body.trim().to_string(),
    }
}

/// Decode a successful response into a [`TranscriptResult`]
pub(crate) fn parse_response(video: &VideoReference, body: &str) -> BatchResult<TranscriptResult> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| BatchError::InvalidResponse {
            message: e.to_string(),
        })?;

    let body = match response.transcript {
        Some(RawTranscript::Segments(segments)) => TranscriptBody::Segments(
            segments
                .into_iter()
                .map(|segment| match segment {
                    RawSegment::Timed(segment) => segment,
                    RawSegment::Plain(text) => TranscriptSegment {
                        text,
                        start: None,
                        duration: None,
                    },
                })
                .collect(),
        ),
        Some(RawTranscript::Text(text)) => TranscriptBody::Text(text),
        None => TranscriptBody::Segments(Vec::new()),
    };

    if body.is_empty() {
        return Err(BatchError::NotFound {
            video_id: video.video_id.clone(),
        });
    }

    let metadata = response.metadata.unwrap_or_default();
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    Ok(TranscriptResult {
        title: non_empty(metadata.title)
            .unwrap_or_else(|| format!("Transcript {}", video.video_id)),
        video_id: video.video_id.clone(),
        language: non_empty(response.language).unwrap_or_else(|| "unknown".to_string()),
        body,
        source_url: video.original_url.clone(),
        channel: non_empty(metadata.author_name),
        channel_url: non_empty(metadata.author_url),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::retry::{RecordingSleeper, RetryPolicy};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn video() -> VideoReference {
        VideoReference::parse("https://youtu.be/dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_parse_segments_with_metadata() {
        let body = r#"{
            "video_id": "dQw4w9WgXcQ",
            "language": "en",
            "transcript": [
                {"text": "Never gonna", "start": 0.0, "duration": 1.5},
                {"text": "give you up", "start": 1.5, "duration": 2.0},
                "plain line"
            ],
            "metadata": {"title": "Rick Astley - Never Gonna Give You Up", "author_name": "Rick Astley", "author_url": "https://www.youtube.com/@RickAstleyYT"}
        }"#;

        let result = parse_response(&video(), body).unwrap();
        assert_eq!(result.title, "Rick Astley - Never Gonna Give You Up");
        assert_eq!(result.language, "en");
        assert_eq!(result.channel.as_deref(), Some("Rick Astley"));
        assert_eq!(result.source_url, "https://youtu.be/dQw4w9WgXcQ");

        let TranscriptBody::Segments(segments) = result.body else {
            panic!("expected segments");
        };
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].start, Some(1.5));
        assert_eq!(segments[2].text, "plain line");
        assert_eq!(segments[2].start, None);
    }

    #[test]
    fn test_parse_text_without_metadata() {
        let body = r#"{"transcript": "hello world"}"#;

        let result = parse_response(&video(), body).unwrap();
        assert_eq!(result.title, "Transcript dQw4w9WgXcQ");
        assert_eq!(result.language, "unknown");
        assert_eq!(result.channel, None);
        assert_eq!(result.body, TranscriptBody::Text("hello world".to_string()));
    }

    #[test]
    fn test_empty_transcript_is_not_found() {
        let err = parse_response(&video(), r#"{"transcript": []}"#).unwrap_err();
        assert!(matches!(err, BatchError::NotFound { .. }));
    }

    #[test]
    fn test_garbage_body_is_invalid_response() {
        let err = parse_response(&video(), "<html>oops</html>").unwrap_err();
        assert!(matches!(err, BatchError::InvalidResponse { .. }));
    }

    #[test]
    fn test_status_classification() {
        let v = video();
        let classify = |code: u16, body: &str| {
            classify_status(StatusCode::from_u16(code).unwrap(), None, body, &v)
        };

        assert!(matches!(classify(401, ""), BatchError::Auth { .. }));
        assert!(matches!(classify(402, r#"{"detail":"no credits"}"#), BatchError::Auth { ref message } if message.contains("no credits")));
        assert!(matches!(classify(404, ""), BatchError::NotFound { .. }));
        assert!(matches!(classify(422, ""), BatchError::InvalidReference { .. }));
        assert!(matches!(classify(429, ""), BatchError::RateLimited { retry_after: None }));
        assert!(matches!(classify(503, "busy"), BatchError::TransientNetwork { .. }));
        assert!(matches!(
            classify(400, r#"{"detail":"bad params"}"#),
            BatchError::Api { status: 400, ref message } if message == "bad params"
        ));
    }

    #[test]
    fn test_rate_limit_keeps_retry_after() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            "",
            &video(),
        );
        assert!(matches!(err, BatchError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)));
    }

    #[test]
    fn test_empty_key_is_auth_error() {
        let result = TranscriptApiClient::new("  ", &ApiConfig::default(), &[]);
        assert!(matches!(result, Err(BatchError::Auth { .. })));
    }

    #[test]
    fn test_one_route_per_proxy() {
        let proxies = vec![
            "http://127.0.0.1:8080".to_string(),
            "http://127.0.0.1:8081".to_string(),
        ];
        let client = TranscriptApiClient::new("key", &ApiConfig::default(), &proxies).unwrap();
        assert_eq!(client.route_count(), 2);

        let direct = TranscriptApiClient::new("key", &ApiConfig::default(), &[]).unwrap();
        assert_eq!(direct.route_count(), 1);
    }

    fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut response = format!("HTTP/1.1 {}\r\n", status);
        for (name, value) in headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));
        response
    }

    /// Answer one connection per canned response; the handle yields the raw requests
    async fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!(
            "http://{}/api/v2/youtube/transcript",
            listener.local_addr().unwrap()
        );

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    request.extend_from_slice(&buf[..n]);
                    if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                requests.push(String::from_utf8_lossy(&request).into_owned());
            }
            requests
        });

        (base_url, handle)
    }

    fn local_client(base_url: String) -> TranscriptApiClient {
        let config = ApiConfig {
            base_url,
            timeout_secs: 5,
            ..ApiConfig::default()
        };
        // Bypass any proxy from the environment for loopback requests
        let direct = Client::builder().no_proxy().build().unwrap();
        TranscriptApiClient::with_clients(vec![direct], "test-key".to_string(), &config)
    }

    #[tokio::test]
    async fn test_fetch_sends_query_and_bearer_token() {
        let body = r#"{"language":"en","transcript":[{"text":"hi","start":0.5,"duration":1.0}],"metadata":{"title":"Hello"}}"#;
        let (base_url, server) = serve(vec![http_response(
            "200 OK",
            &[("Content-Type", "application/json")],
            body,
        )])
        .await;

        let result = local_client(base_url).fetch(&video()).await.unwrap();
        assert_eq!(result.title, "Hello");
        assert_eq!(result.language, "en");

        let requests = server.await.unwrap();
        let request = requests[0].to_ascii_lowercase();
        assert!(request.starts_with("get /api/v2/youtube/transcript?"));
        assert!(request.contains("video_url=https%3a%2f%2fwww.youtube.com%2fwatch%3fv%3ddqw4w9wgxcq"));
        assert!(request.contains("format=json"));
        assert!(request.contains("include_timestamp=true"));
        assert!(request.contains("send_metadata=true"));
        assert!(request.contains("\r\nauthorization: bearer test-key\r\n"));
    }

    #[tokio::test]
    async fn test_fetch_reads_retry_after_header() {
        let (base_url, server) = serve(vec![http_response(
            "429 Too Many Requests",
            &[("Retry-After", "7")],
            "",
        )])
        .await;

        let err = local_client(base_url).fetch(&video()).await.unwrap_err();
        assert!(matches!(
            err,
            BatchError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_waits_for_server_retry_after() {
        let (base_url, server) = serve(vec![
            http_response("429 Too Many Requests", &[("Retry-After", "7")], ""),
            http_response("200 OK", &[], r#"{"transcript":"hello"}"#),
        ])
        .await;

        let client = local_client(base_url);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            jitter: false,
        };

        let outcome = policy.fetch(&client, &sleeper, &video()).await;
        assert!(outcome.result.is_ok());
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(7)]);
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/transcript", listener.local_addr().unwrap());
        drop(listener);

        let err = local_client(base_url).fetch(&video()).await.unwrap_err();
        assert!(matches!(err, BatchError::TransientNetwork { .. }));
    }
}
