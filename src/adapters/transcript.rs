//! YouTube transcript scraper.
//!
//! Posts the video URL to a transcript-rendering upstream and extracts the
//! segment list from the returned HTML. Title and author are optional garnish;
//! their absence is not a failure. A missing segment container means the video
//! has no captions and is reported as 404.

use crate::adapters::static_selector;
use crate::error::ApiError;
use reqwest::Client;
use scraper::Html;
use serde::Serialize;

/// Prefix the upstream prepends to the page heading.
const TITLE_PREFIX: &str = "Transcript of ";

/// One timed caption segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    /// Caption text.
    pub text: String,
    /// Segment start time in seconds.
    pub start: f64,
    /// Segment duration in seconds.
    pub duration: f64,
}

/// Complete transcript record for one video.
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    /// Video title, empty when the heading is absent.
    pub title: String,
    /// Channel author, empty when the author link is absent.
    pub author: String,
    /// All segment texts joined with spaces.
    pub transcript: String,
    /// Timed segments in page order.
    pub segments: Vec<TranscriptSegment>,
    /// Number of segments extracted.
    #[serde(rename = "totalSegments")]
    pub total_segments: usize,
    /// The video URL the transcript was requested for.
    pub url: String,
}

/// HTTP client for the transcript upstream.
pub struct TranscriptClient {
    client: Client,
    base_url: String,
}

impl TranscriptClient {
    /// Build a client against the given upstream base URL.
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Fetch and parse the transcript for the video at `url`.
    ///
    /// A failing upstream fetch propagates the literal upstream status with the
    /// status folded into the message; timeouts are 408.
    pub async fn fetch(&self, url: &str) -> Result<Transcript, ApiError> {
        let response = self
            .client
            .post(format!("{}/transcript", self.base_url))
            .form(&[("youtube_url", url)])
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ApiError::timeout("Request timeout while fetching transcript")
                } else {
                    ApiError::from(err)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::upstream(
                format!("Failed to fetch transcript: HTTP {}", status.as_u16()),
                status,
            ));
        }

        let html = response.text().await?;
        parse_transcript(&html, url)
    }
}

/// Extract the segment container, segments, and optional title/author.
fn parse_transcript(html: &str, url: &str) -> Result<Transcript, ApiError> {
    let document = Html::parse_document(html);

    let container = document
        .select(&static_selector("#transcript"))
        .next()
        .ok_or_else(|| {
            ApiError::not_found("Transcript not found - video may not have captions")
        })?;

    let segments: Vec<TranscriptSegment> = container
        .select(&static_selector(".transcript-segment"))
        .map(|segment| TranscriptSegment {
            text: segment.text().collect::<String>().trim().to_string(),
            start: parse_seconds(segment.value().attr("data-start")),
            duration: parse_seconds(segment.value().attr("data-duration")),
        })
        .collect();

    let transcript = segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    let title = document
        .select(&static_selector("h1.card-title"))
        .next()
        .map(|heading| {
            let text = heading.text().collect::<String>();
            text.trim()
                .strip_prefix(TITLE_PREFIX)
                .unwrap_or(text.trim())
                .to_string()
        })
        .unwrap_or_default();

    let author = document
        .select(&static_selector(
            r#"a[data-ph-capture-attribute-element="author-link"]"#,
        ))
        .next()
        .map(|link| link.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let total_segments = segments.len();
    Ok(Transcript {
        title,
        author,
        transcript,
        segments,
        total_segments,
        url: url.to_string(),
    })
}

fn parse_seconds(attr: Option<&str>) -> f64 {
    attr.and_then(|value| value.parse().ok()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use httpmock::{Method::POST, MockServer};

    const PAGE: &str = r#"
        <html><body>
          <h1 class="card-title">Transcript of Some Talk</h1>
          <a data-ph-capture-attribute-element="author-link">Some Channel</a>
          <div id="transcript">
            <span class="transcript-segment" data-start="0.0" data-duration="1.5">Hello</span>
            <span class="transcript-segment" data-start="1.5" data-duration="2.0">world again</span>
          </div>
        </body></html>"#;

    #[test]
    fn extracts_segments_title_and_author() {
        let result = parse_transcript(PAGE, "https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(result.title, "Some Talk");
        assert_eq!(result.author, "Some Channel");
        assert_eq!(result.total_segments, 2);
        assert_eq!(result.transcript, "Hello world again");
        assert_eq!(
            result.segments[1],
            TranscriptSegment {
                text: "world again".to_string(),
                start: 1.5,
                duration: 2.0,
            }
        );
        assert_eq!(result.url, "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn missing_container_means_no_captions() {
        let err = parse_transcript("<html><body></body></html>", "u").unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(
            err.message,
            "Transcript not found - video may not have captions"
        );
    }

    #[test]
    fn title_and_author_default_to_empty() {
        let html = r#"<div id="transcript">
            <span class="transcript-segment" data-start="0" data-duration="1">Hi</span>
        </div>"#;
        let result = parse_transcript(html, "u").unwrap();
        assert_eq!(result.title, "");
        assert_eq!(result.author, "");
        assert_eq!(result.total_segments, 1);
    }

    #[test]
    fn unparseable_times_default_to_zero() {
        let html = r#"<div id="transcript">
            <span class="transcript-segment">Hi</span>
        </div>"#;
        let result = parse_transcript(html, "u").unwrap();
        assert_eq!(result.segments[0].start, 0.0);
        assert_eq!(result.segments[0].duration, 0.0);
    }

    #[tokio::test]
    async fn posts_video_url_as_form_field() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/transcript")
                    .body_contains("youtube_url=");
                then.status(200).body(PAGE);
            })
            .await;

        let client = TranscriptClient::new(Client::new(), server.base_url());
        let result = client
            .fetch("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();
        assert_eq!(result.total_segments, 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_status_folds_into_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/transcript");
                then.status(502);
            })
            .await;

        let client = TranscriptClient::new(Client::new(), server.base_url());
        let err = client.fetch("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message, "Failed to fetch transcript: HTTP 502");
    }
}
