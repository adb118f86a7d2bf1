//! Uniform response envelopes.
//!
//! Every JSON response leaving the gateway is one of three shapes: success, error,
//! or paginated success. Exactly one envelope is emitted per request and `success`
//! is always present and boolean.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Success envelope wrapping an adapter result.
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope {
    /// Always `true`.
    pub success: bool,
    /// Short human-readable status message.
    pub message: String,
    /// Adapter-specific payload.
    pub data: Value,
    /// RFC3339 UTC timestamp of envelope creation.
    pub timestamp: String,
}

/// Error envelope emitted by the central handler.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub error: String,
    /// Numeric HTTP status carried in the body for client convenience.
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Diagnostic trace, attached only in development mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// RFC3339 UTC timestamp of envelope creation.
    pub timestamp: String,
}

/// Pagination counters attached to a paginated envelope.
#[derive(Debug, Serialize)]
pub struct Pagination {
    /// Current page number (1-based).
    pub page: u64,
    /// Page size used for the computation.
    pub limit: u64,
    /// Total number of items across all pages.
    pub total: u64,
    /// Number of pages needed to hold `total` items.
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
    /// Whether a later page exists.
    #[serde(rename = "hasNext")]
    pub has_next: bool,
    /// Whether an earlier page exists.
    #[serde(rename = "hasPrev")]
    pub has_prev: bool,
}

/// Success envelope carrying a page of items plus pagination counters.
#[derive(Debug, Serialize)]
pub struct PaginatedEnvelope {
    /// Always `true`.
    pub success: bool,
    /// Page of items.
    pub data: Value,
    /// Derived pagination counters.
    pub pagination: Pagination,
    /// RFC3339 UTC timestamp of envelope creation.
    pub timestamp: String,
}

/// Current time as an RFC3339 UTC string, the timestamp format of every envelope.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Build a success envelope around `data`.
pub fn success(message: impl Into<String>, data: Value) -> SuccessEnvelope {
    SuccessEnvelope {
        success: true,
        message: message.into(),
        data,
        timestamp: now_rfc3339(),
    }
}

/// Build an error envelope for the given message and status.
pub fn error(message: impl Into<String>, status: StatusCode) -> ErrorEnvelope {
    error_with_stack(message, status, None)
}

/// Build an error envelope carrying an optional diagnostic trace.
pub fn error_with_stack(
    message: impl Into<String>,
    status: StatusCode,
    stack: Option<String>,
) -> ErrorEnvelope {
    ErrorEnvelope {
        success: false,
        error: message.into(),
        status_code: status.as_u16(),
        stack,
        timestamp: now_rfc3339(),
    }
}

/// Build a paginated envelope, deriving the page counters from `total` and `limit`.
pub fn paginated(data: Value, page: u64, limit: u64, total: u64) -> PaginatedEnvelope {
    let limit = limit.max(1);
    let total_pages = total.div_ceil(limit);
    PaginatedEnvelope {
        success: true,
        data,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
            has_next: page * limit < total,
            has_prev: page > 1,
        },
        timestamp: now_rfc3339(),
    }
}
