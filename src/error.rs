//! The classified error carried by every failing code path.
//!
//! One concrete record rather than an error hierarchy: specific kinds (timeout,
//! unauthorized, not-found) are distinguished by the status code and built through
//! factory constructors. Conversion into an HTTP response is the central error
//! handler: it decides what to reveal to the caller and hands the original error
//! to the access log via the response extensions.

use crate::config::{RunMode, get_config};
use crate::envelope;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Classified gateway error: a message, an HTTP status, and an operational marker.
///
/// `operational == true` marks failures that are anticipated and safe to surface
/// verbatim to the caller (bad parameters, missing upstream resources). Anything
/// else is treated as an internal fault whose message is suppressed outside
/// development mode.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Human-readable description of the failure.
    pub message: String,
    /// HTTP status attached to the error envelope.
    pub status: StatusCode,
    /// Whether the message may be revealed to the caller as-is.
    pub operational: bool,
}

impl ApiError {
    /// Build an operational error with an explicit status code.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            message: message.into(),
            status,
            operational: true,
        }
    }

    /// Client supplied missing or malformed input (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// Upstream rejected the caller-supplied credential (401).
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    /// Route or upstream resource absent (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    /// An outbound call exceeded its bound (408).
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::REQUEST_TIMEOUT)
    }

    /// A rate-limit tier rejected the request (429).
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::TOO_MANY_REQUESTS)
    }

    /// Propagate the literal status an upstream returned, when meaningful.
    pub fn upstream(message: impl Into<String>, status: StatusCode) -> Self {
        Self::new(message, status)
    }

    /// Unexpected internal fault (500). The message is logged but suppressed in
    /// production-like contexts.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            operational: false,
        }
    }

    /// Derived classification label: `fail` for client-caused 4xx, `error` otherwise.
    pub fn status_label(&self) -> &'static str {
        if self.status.is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Message revealed to the caller, honoring the operational marker.
    fn public_message(&self, run_mode: RunMode) -> String {
        if self.operational || run_mode == RunMode::Development {
            self.message.clone()
        } else {
            "Internal server error".to_string()
        }
    }
}

/// Classify a transport-level failure from the outbound HTTP client.
///
/// Timeouts map to 408; everything else is an internal 500 with the client error
/// attached. Upstream status codes are handled at each adapter boundary, not here.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("Upstream request timeout")
        } else {
            Self::internal(format!("Upstream request failed: {err}"))
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ApiError {}

/// Central handler: every error, synchronous or raised inside an adapter future,
/// funnels through this conversion before a response is written.
///
/// The original error is attached to the response extensions so the access-log
/// middleware, which knows the request method and URL, can write the error line.
/// In development mode the envelope additionally carries a capture of the call
/// stack at conversion time.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let run_mode = get_config().run_mode;
        let stack = (run_mode == RunMode::Development)
            .then(|| std::backtrace::Backtrace::force_capture().to_string());
        let body = envelope::error_with_stack(self.public_message(run_mode), self.status, stack);
        let mut response = (self.status, Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
