//! Pixeldrain mirror resolver.
//!
//! Derives the direct-download URL by path rewriting, then scrapes the share page
//! to recover the filename from its `<title>`. Page-structure dependent: a missing
//! title marker means the layout changed or the file is gone, and is reported as a
//! first-class 404, never a crash.

use crate::adapters::static_selector;
use crate::error::ApiError;
use reqwest::Client;
use scraper::Html;
use serde::Serialize;

/// Marker suffix Pixeldrain appends to every file page title.
const TITLE_MARKER: &str = " ~ pixeldrain";

/// Resolved mirror file: display name plus direct-download URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorFile {
    /// Filename as shown on the share page.
    pub filename: String,
    /// Direct-download URL derived from the share URL.
    pub fileurl: String,
}

/// HTTP client for Pixeldrain share pages.
pub struct PixeldrainClient {
    client: Client,
}

impl PixeldrainClient {
    /// Build a resolver around the shared outbound client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the share page at `url` and resolve its filename and download URL.
    ///
    /// A failing page fetch propagates the literal upstream status; a title
    /// without the marker suffix is a 404.
    pub async fn resolve(&self, url: &str) -> Result<MirrorFile, ApiError> {
        let fileurl = url.replace("/u/", "/api/file/");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::upstream("Failed to fetch Pixeldrain page", status));
        }

        let html = response.text().await?;
        let filename = extract_filename(&html)?;
        Ok(MirrorFile { filename, fileurl })
    }
}

/// Read the page `<title>` and strip the marker suffix.
fn extract_filename(html: &str) -> Result<String, ApiError> {
    let document = Html::parse_document(html);
    let title = document
        .select(&static_selector("title"))
        .next()
        .map(|element| element.text().collect::<String>())
        .unwrap_or_default();

    match title.split_once(TITLE_MARKER) {
        Some((filename, _)) => Ok(filename.to_string()),
        None => Err(ApiError::not_found(
            "Pixeldrain file not found or invalid title",
        )),
    }
}
