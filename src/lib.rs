#![deny(missing_docs)]

//! Core library for the relayhub HTTP gateway.

/// Upstream service adapters (AI chat, file mirrors, image processing, transcripts).
pub mod adapters;
/// HTTP routing, middleware chain, and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Uniform success/error/paginated response envelopes.
pub mod envelope;
/// Classified error type and central error handling.
pub mod error;
/// Tiered per-address rate limiting.
pub mod limiter;
/// Structured logging and tracing setup.
pub mod logging;
/// Pure request validators.
pub mod validate;
