//! Upstream service adapters.
//!
//! One adapter per third-party service. Each performs exactly one outbound call
//! (or a small fixed sequence), bounded by the configured timeout, and translates
//! upstream failure modes into classified [`ApiError`]s at its boundary. Upstream
//! results are complete records or errors, never partial; nothing is cached and
//! nothing is retried.

/// Gemini chat relay.
pub mod gemini;
/// Image-processing relay returning raw bytes.
pub mod imagetools;
/// Pixeldrain page-scraping mirror resolver.
pub mod pixeldrain;
/// YouTube transcript scraper.
pub mod transcript;
/// Videy URL-rewriting mirror resolver.
pub mod videy;

use crate::config::Config;
use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::Selector;
use std::time::Duration;

pub use imagetools::ProcessedImage;
pub use pixeldrain::MirrorFile;
pub use transcript::{Transcript, TranscriptSegment};

/// Build the shared outbound HTTP client with the gateway's timeout bound.
pub fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .user_agent(concat!("relayhub/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .expect("Failed to build outbound HTTP client")
}

/// Parse a selector known at compile time.
pub(crate) fn static_selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

/// The five upstream operations exposed to the HTTP surface.
///
/// Handlers are generic over this trait so tests can substitute stubs without
/// touching the network.
#[async_trait]
pub trait Upstreams: Send + Sync {
    /// Relay a prompt to the Gemini API with the caller-supplied credential.
    async fn gemini_chat(&self, text: &str, api_key: &str) -> Result<String, ApiError>;

    /// Rewrite a Videy share URL into its CDN download URL.
    fn videy_resolve(&self, url: &str) -> Result<String, ApiError>;

    /// Scrape a Pixeldrain page for the filename and direct-download URL.
    async fn pixeldrain_resolve(&self, url: &str) -> Result<MirrorFile, ApiError>;

    /// Run an image through the processing upstream and return the result bytes.
    async fn image_process(&self, img_url: &str, tool: &str) -> Result<ProcessedImage, ApiError>;

    /// Scrape the transcript of a YouTube video.
    async fn transcript(&self, url: &str) -> Result<Transcript, ApiError>;
}

/// Production [`Upstreams`] implementation composing the real adapters.
pub struct UpstreamService {
    gemini: gemini::GeminiClient,
    pixeldrain: pixeldrain::PixeldrainClient,
    imagetools: imagetools::ImagetoolsClient,
    transcript: transcript::TranscriptClient,
}

impl UpstreamService {
    /// Build the adapter set from loaded configuration, sharing one HTTP client.
    pub fn from_config(config: &Config) -> Self {
        let client = build_http_client(config.upstream_timeout);
        tracing::debug!(
            timeout_secs = config.upstream_timeout.as_secs(),
            "Initialized upstream HTTP client"
        );
        Self {
            gemini: gemini::GeminiClient::new(client.clone(), config.gemini_base_url.clone()),
            pixeldrain: pixeldrain::PixeldrainClient::new(client.clone()),
            imagetools: imagetools::ImagetoolsClient::new(
                client.clone(),
                config.imagetools_base_url.clone(),
            ),
            transcript: transcript::TranscriptClient::new(
                client,
                config.transcript_base_url.clone(),
            ),
        }
    }
}

#[async_trait]
impl Upstreams for UpstreamService {
    async fn gemini_chat(&self, text: &str, api_key: &str) -> Result<String, ApiError> {
        self.gemini.chat(text, api_key).await
    }

    fn videy_resolve(&self, url: &str) -> Result<String, ApiError> {
        videy::resolve(url)
    }

    async fn pixeldrain_resolve(&self, url: &str) -> Result<MirrorFile, ApiError> {
        self.pixeldrain.resolve(url).await
    }

    async fn image_process(&self, img_url: &str, tool: &str) -> Result<ProcessedImage, ApiError> {
        self.imagetools.process(img_url, tool).await
    }

    async fn transcript(&self, url: &str) -> Result<Transcript, ApiError> {
        self.transcript.fetch(url).await
    }
}
