//! Image-processing relay.
//!
//! Fetches the caller's source image, re-packages it as a multipart upload with
//! the requested tool type, posts it to the processing upstream, locates the
//! result element in the returned HTML, and fetches the final bytes. The one
//! adapter whose result is a byte stream rather than a structured record.

use crate::adapters::static_selector;
use crate::error::ApiError;
use axum::http::StatusCode;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use scraper::Html;

/// Raw processed-image payload plus its content type.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Image bytes returned by the upstream.
    pub bytes: Bytes,
    /// Content type to stream back to the caller.
    pub content_type: &'static str,
}

/// HTTP client for the image-processing upstream.
pub struct ImagetoolsClient {
    client: Client,
    base_url: String,
}

impl ImagetoolsClient {
    /// Build a client against the given upstream base URL.
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Run the image at `img_url` through `tool` and return the processed bytes.
    ///
    /// An unreachable source image is the caller's fault (400); a response
    /// missing the result element means the upstream changed shape (500);
    /// timeouts anywhere in the sequence are 408.
    pub async fn process(&self, img_url: &str, tool: &str) -> Result<ProcessedImage, ApiError> {
        let source = self
            .client
            .get(img_url)
            .send()
            .await
            .map_err(classify_transport)?;
        if !source.status().is_success() {
            return Err(ApiError::bad_request("Failed to fetch image from URL"));
        }
        let image = source.bytes().await.map_err(classify_transport)?;

        let form = Form::new()
            .part("file", Part::bytes(image.to_vec()).file_name("image.png"))
            .text("type", tool.to_string());

        let upload = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport)?;
        let upload_status = upload.status();
        if !upload_status.is_success() {
            return Err(ApiError::new(
                format!("Image processing error: HTTP {}", upload_status.as_u16()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
        let html = upload.text().await.map_err(classify_transport)?;
        let result_url = extract_result_url(&html)?;

        let processed = self
            .client
            .get(&result_url)
            .send()
            .await
            .map_err(classify_transport)?;
        if !processed.status().is_success() {
            return Err(ApiError::new(
                "Failed to fetch processed image",
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
        let bytes = processed.bytes().await.map_err(classify_transport)?;

        Ok(ProcessedImage {
            bytes,
            content_type: "image/png",
        })
    }
}

fn classify_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::timeout("Image processing timeout")
    } else {
        ApiError::from(err)
    }
}

/// Locate the `#result` element in the upstream HTML and read its `src`.
///
/// An absent element or attribute means the upstream changed shape: an
/// anticipated failure whose message is safe to surface to the caller.
fn extract_result_url(html: &str) -> Result<String, ApiError> {
    let document = Html::parse_document(html);
    let result = document
        .select(&static_selector("#result"))
        .next()
        .ok_or_else(|| {
            ApiError::new(
                "Failed to process image - result not found",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

    result.value().attr("src").map(str::to_string).ok_or_else(|| {
        ApiError::new(
            "Processed image URL not found",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })
}
