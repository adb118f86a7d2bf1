//! Pure request validators.
//!
//! Each validator inspects the query map and either passes the request through
//! unchanged or raises a 400 [`ApiError`] before any adapter runs. No validator
//! touches the network or mutates state.

use crate::error::ApiError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

/// Query parameters of one inbound request.
pub type Query = HashMap<String, String>;

/// Tool types accepted by the image-processing endpoint.
pub const IMAGE_TOOL_TYPES: [&str; 5] = ["removebg", "enhance", "upscale", "restore", "colorize"];

/// Require every named field to be present and non-blank.
///
/// The failure message lists every missing field by name, joined, so a caller can
/// fix all of them in one round trip.
pub fn require_fields(query: &Query, names: &[&str]) -> Result<(), ApiError> {
    let missing: Vec<&str> = names
        .iter()
        .filter(|name| {
            query
                .get(**name)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Require the named field to parse as a well-formed URL.
pub fn require_url(query: &Query, field: &str) -> Result<(), ApiError> {
    let value = query
        .get(field)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("Missing '{field}' parameter")))?;

    Url::parse(value)
        .map(|_| ())
        .map_err(|_| ApiError::bad_request(format!("Invalid URL format for '{field}'")))
}

fn youtube_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Accepted shapes: youtu.be/<id>, youtube.com/watch?v=<id>, /embed/, /shorts/,
        // /live/, /v/, with optional scheme and www/m/gaming subdomain, 11-char id.
        Regex::new(
            r"(?i)^((?:https?:)?//)?((?:www|m|gaming)\.)?((?:youtu\.be|youtube\.com)(?:/(?:[\w-]+\?v=|embed/|shorts/|live/|v/)?))([\w-]{11})(\S+)?$",
        )
        .expect("YouTube pattern compiles")
    })
}

/// Require the `url` field to look like a YouTube video URL.
pub fn require_youtube_url(query: &Query) -> Result<(), ApiError> {
    let url = query
        .get("url")
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing YouTube URL"))?;

    if youtube_pattern().is_match(url) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid YouTube URL format"))
    }
}

/// Require the `type` field to be one of the accepted image tool types.
///
/// The failure message lists the full enumeration.
pub fn require_image_tool_type(query: &Query) -> Result<(), ApiError> {
    let tool = query
        .get("type")
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing type parameter"))?;

    if IMAGE_TOOL_TYPES.contains(&tool.as_str()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Invalid type. Must be one of: {}",
            IMAGE_TOOL_TYPES.join(", ")
        )))
    }
}
