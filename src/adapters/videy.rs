//! Videy mirror resolver.
//!
//! Purely deterministic: the share URL carries the video identifier after its `=`
//! delimiter, and the download URL lives on a fixed CDN host. No network call.

use crate::error::ApiError;

const CDN_BASE: &str = "https://cdn.videy.co";

/// Rewrite a Videy share URL (`https://videy.co/?v=<id>`) into its CDN download URL.
pub fn resolve(url: &str) -> Result<String, ApiError> {
    let video_id = url
        .split('=')
        .nth(1)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid Videy URL format"))?;

    Ok(format!("{CDN_BASE}/{video_id}.mp4"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn extracts_video_id_into_cdn_url() {
        let result = resolve("https://videy.co/?v=abc123def").unwrap();
        assert_eq!(result, "https://cdn.videy.co/abc123def.mp4");
    }

    #[test]
    fn rejects_url_without_identifier() {
        let err = resolve("https://videy.co/invalid").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid Videy URL format");
    }

    #[test]
    fn rejects_empty_identifier() {
        let err = resolve("https://videy.co/?v=").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
