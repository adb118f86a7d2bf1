//! Gemini chat relay.
//!
//! Calls the generative model with the caller-supplied credential and extracts the
//! first available reply text from a response that may take several shapes.

use crate::error::ApiError;
use axum::http::StatusCode;
use reqwest::Client;
use serde_json::{Value, json};

const MODEL: &str = "gemini-2.0-flash-exp";

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    /// Build a client against the given API base URL.
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Send `text` to the model using `api_key` and return the reply text.
    ///
    /// Credential rejections surface as 401; any other upstream failure becomes a
    /// 500 with the upstream message attached.
    pub async fn chat(&self, text: &str, api_key: &str) -> Result<String, ApiError> {
        let endpoint = format!("{}/v1beta/models/{MODEL}:generateContent", self.base_url);
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }]
        });

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED
                || status == StatusCode::FORBIDDEN
                || detail.contains("API key")
            {
                return Err(ApiError::unauthorized("Invalid or expired API key"));
            }
            return Err(ApiError::new(
                format!("Gemini API error: HTTP {}: {detail}", status.as_u16()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }

        let payload: Value = response.json().await?;
        Ok(extract_reply(&payload))
    }
}

/// Pull the reply text out of whichever shape the upstream chose.
///
/// Preference order: the candidate parts array, a top-level `text` field, and as a
/// last resort the full serialized response.
fn extract_reply(payload: &Value) -> String {
    if let Some(parts) = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    {
        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect();
        if !text.is_empty() {
            return text;
        }
    }

    if let Some(text) = payload.get("text").and_then(Value::as_str) {
        return text.to_string();
    }

    payload.to_string()
}
