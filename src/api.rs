//! HTTP surface of the gateway.
//!
//! This module wires the fixed middleware chain and the three route groups:
//!
//! - `GET /api/ai/gemini` – relay a prompt to Gemini with a caller-supplied key.
//! - `GET /api/downloader/videy` – rewrite a Videy share URL into its CDN URL.
//! - `GET /api/downloader/pixeldrain` – scrape a Pixeldrain page for filename and
//!   direct-download URL.
//! - `GET /api/tools/imagetools` – run an image through the processing upstream
//!   and stream back the raw bytes.
//! - `GET /api/tools/yt-transcript` – scrape the transcript of a YouTube video.
//!
//! Plus the non-API surface: `/health` (never rate limited), `/` (front-end
//! document), and `/apis.json` (machine-readable endpoint catalog). Middleware
//! order per request: security headers → compression → CORS → body-size ceiling
//! → access logging → global rate limit → group rate limit → validators →
//! controller → envelope.

use crate::adapters::Upstreams;
use crate::envelope;
use crate::error::ApiError;
use crate::limiter::{RateLimiter, Tier, enforce};
use crate::validate;
use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::set_header::SetResponseHeaderLayer;

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Build the full router: middleware chain, API route groups, and web surface.
///
/// The limiter is injected rather than global so its store can be swapped
/// without touching call sites.
pub fn create_router<S>(service: Arc<S>, limiter: Arc<RateLimiter>) -> Router
where
    S: Upstreams + 'static,
{
    PROCESS_START.get_or_init(Instant::now);
    let config = crate::config::get_config();

    let ai = Router::new()
        .route("/gemini", get(gemini_chat::<S>))
        .layer(middleware::from_fn_with_state(
            (limiter.clone(), Tier::Ai),
            enforce,
        ));

    let downloader = Router::new()
        .route("/videy", get(videy_download::<S>))
        .route("/pixeldrain", get(pixeldrain_download::<S>))
        .layer(middleware::from_fn_with_state(
            (limiter.clone(), Tier::Downloader),
            enforce,
        ));

    let tools = Router::new()
        .route("/imagetools", get(image_tools::<S>))
        .route("/yt-transcript", get(youtube_transcript::<S>));

    let api = Router::new()
        .route("/", get(api_info))
        .nest("/ai", ai)
        .nest("/downloader", downloader)
        .nest("/tools", tools)
        .fallback(api_not_found);

    Router::new()
        .route("/health", get(health))
        .route("/apis.json", get(endpoint_catalog))
        .route_service(
            "/",
            ServeFile::new(format!("{}/index.html", config.asset_dir)),
        )
        .nest("/api", api)
        .fallback(web_not_found)
        .with_state(service)
        .layer(middleware::from_fn_with_state(
            (limiter, Tier::Global),
            enforce,
        ))
        .layer(middleware::from_fn(access_log))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(&config.cors_origin))
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ]);
    if origin == "*" {
        layer.allow_origin(Any)
    } else {
        match origin.parse::<HeaderValue>() {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                tracing::warn!(origin, "Invalid CORS origin; falling back to any");
                layer.allow_origin(Any)
            }
        }
    }
}

/// Access log middleware: one line per completed request.
///
/// Failed requests carry the original [`ApiError`] in the response extensions;
/// its full message is logged here together with the request line, even when the
/// body sent to the caller was redacted.
async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    match response.extensions().get::<ApiError>() {
        Some(err) => tracing::error!(
            %method,
            path,
            status = response.status().as_u16(),
            classification = err.status_label(),
            operational = err.operational,
            latency_ms,
            "{}",
            err.message
        ),
        None => tracing::info!(
            %method,
            path,
            status = response.status().as_u16(),
            latency_ms,
            "Request completed"
        ),
    }
    response
}

/// Liveness probe; exempt from every rate-limit tier.
async fn health() -> Json<serde_json::Value> {
    let uptime = PROCESS_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);
    Json(json!({
        "status": "OK",
        "timestamp": envelope::now_rfc3339(),
        "uptime": uptime,
    }))
}

/// Relay a prompt to Gemini and wrap the reply in a success envelope.
async fn gemini_chat<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<validate::Query>,
) -> Result<Json<envelope::SuccessEnvelope>, ApiError>
where
    S: Upstreams,
{
    validate::require_fields(&query, &["text", "apikey"])?;
    let reply = service
        .gemini_chat(&query["text"], &query["apikey"])
        .await?;
    Ok(Json(envelope::success("Success", json!({ "text": reply }))))
}

/// Resolve a Videy share URL into its CDN download URL.
async fn videy_download<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<validate::Query>,
) -> Result<Json<envelope::SuccessEnvelope>, ApiError>
where
    S: Upstreams,
{
    validate::require_url(&query, "url")?;
    let fileurl = service.videy_resolve(&query["url"])?;
    Ok(Json(envelope::success(
        "Success",
        json!({ "fileurl": fileurl }),
    )))
}

/// Resolve a Pixeldrain share URL into filename and direct-download URL.
async fn pixeldrain_download<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<validate::Query>,
) -> Result<Json<envelope::SuccessEnvelope>, ApiError>
where
    S: Upstreams,
{
    validate::require_url(&query, "url")?;
    let file = service.pixeldrain_resolve(&query["url"]).await?;
    Ok(Json(envelope::success("Success", serialize(file)?)))
}

/// Run an image through the processing upstream and stream back the raw bytes.
///
/// The one handler that bypasses the JSON envelope: the payload is written with
/// its image content type and length.
async fn image_tools<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<validate::Query>,
) -> Result<Response, ApiError>
where
    S: Upstreams,
{
    validate::require_fields(&query, &["imgurl", "type"])?;
    validate::require_image_tool_type(&query)?;
    let image = service.image_process(&query["imgurl"], &query["type"]).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.content_type.to_string()),
            (header::CONTENT_LENGTH, image.bytes.len().to_string()),
        ],
        image.bytes,
    )
        .into_response())
}

/// Scrape and return the transcript of a YouTube video.
async fn youtube_transcript<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<validate::Query>,
) -> Result<Json<envelope::SuccessEnvelope>, ApiError>
where
    S: Upstreams,
{
    validate::require_youtube_url(&query)?;
    let transcript = service.transcript(&query["url"]).await?;
    Ok(Json(envelope::success("Success", serialize(transcript)?)))
}

fn serialize<T: Serialize>(value: T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value)
        .map_err(|err| ApiError::internal(format!("Failed to serialize adapter result: {err}")))
}

/// API info envelope listing the three route groups.
async fn api_info() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "relayhub gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ai": "/api/ai",
            "downloader": "/api/downloader",
            "tools": "/api/tools"
        },
        "documentation": "/apis.json"
    }))
}

/// Descriptor for a single endpoint in the discovery catalog.
#[derive(Serialize)]
struct EndpointDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    params: &'static [&'static str],
    description: &'static str,
}

/// Machine-readable endpoint catalog served at `/apis.json`.
async fn endpoint_catalog() -> Json<serde_json::Value> {
    let endpoints = vec![
        EndpointDescriptor {
            name: "gemini",
            method: "GET",
            path: "/api/ai/gemini",
            params: &["text", "apikey"],
            description: "Relay a prompt to Gemini using the caller-supplied API key.",
        },
        EndpointDescriptor {
            name: "videy",
            method: "GET",
            path: "/api/downloader/videy",
            params: &["url"],
            description: "Resolve a Videy share URL into its CDN download URL.",
        },
        EndpointDescriptor {
            name: "pixeldrain",
            method: "GET",
            path: "/api/downloader/pixeldrain",
            params: &["url"],
            description: "Resolve a Pixeldrain share URL into filename and download URL.",
        },
        EndpointDescriptor {
            name: "imagetools",
            method: "GET",
            path: "/api/tools/imagetools",
            params: &["imgurl", "type"],
            description: "Process an image (removebg, enhance, upscale, restore, colorize) and return the result bytes.",
        },
        EndpointDescriptor {
            name: "yt-transcript",
            method: "GET",
            path: "/api/tools/yt-transcript",
            params: &["url"],
            description: "Scrape the transcript of a YouTube video.",
        },
    ];
    Json(json!({
        "name": "relayhub",
        "version": env!("CARGO_PKG_VERSION"),
        "categories": ["ai", "downloader", "tools"],
        "endpoints": endpoints,
    }))
}

/// 404 envelope for unmatched API paths, enumerating the valid route groups.
async fn api_not_found(
    axum::extract::OriginalUri(uri): axum::extract::OriginalUri,
    request: Request,
) -> Response {
    let body = json!({
        "success": false,
        "error": "Endpoint not found",
        "path": uri.path(),
        "method": request.method().as_str(),
        "availableEndpoints": {
            "ai": ["/api/ai/gemini"],
            "downloader": ["/api/downloader/videy", "/api/downloader/pixeldrain"],
            "tools": ["/api/tools/imagetools", "/api/tools/yt-transcript"]
        },
        "documentation": "/apis.json"
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Static not-found page for unmatched non-API paths.
async fn web_not_found() -> Response {
    let page = format!("{}/404.html", crate::config::get_config().asset_dir);
    let body = tokio::fs::read_to_string(&page)
        .await
        .unwrap_or_else(|_| "<html><body><h1>404 - Page Not Found</h1></body></html>".to_string());
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MirrorFile, ProcessedImage, Transcript, TranscriptSegment, Upstreams};
    use crate::config::{CONFIG, Config};
    use crate::limiter::RateLimiter;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request as HttpRequest;
    use bytes::Bytes;
    use std::sync::Once;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config::from_env().expect("default config"));
        });
    }

    #[derive(Default)]
    struct StubUpstreams {
        calls: Mutex<Vec<String>>,
    }

    impl StubUpstreams {
        async fn recorded_calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: impl Into<String>) {
            self.calls.lock().await.push(call.into());
        }
    }

    #[async_trait]
    impl Upstreams for StubUpstreams {
        async fn gemini_chat(&self, text: &str, _api_key: &str) -> Result<String, ApiError> {
            self.record(format!("gemini:{text}")).await;
            Ok("stub reply".to_string())
        }

        fn videy_resolve(&self, url: &str) -> Result<String, ApiError> {
            crate::adapters::videy::resolve(url)
        }

        async fn pixeldrain_resolve(&self, url: &str) -> Result<MirrorFile, ApiError> {
            self.record(format!("pixeldrain:{url}")).await;
            Ok(MirrorFile {
                filename: "test.pdf".to_string(),
                fileurl: "https://pixeldrain.com/api/file/test123".to_string(),
            })
        }

        async fn image_process(
            &self,
            img_url: &str,
            tool: &str,
        ) -> Result<ProcessedImage, ApiError> {
            self.record(format!("imagetools:{img_url}:{tool}")).await;
            Ok(ProcessedImage {
                bytes: Bytes::from_static(&[1, 2, 3]),
                content_type: "image/png",
            })
        }

        async fn transcript(&self, url: &str) -> Result<Transcript, ApiError> {
            self.record(format!("transcript:{url}")).await;
            Ok(Transcript {
                title: "Some Talk".to_string(),
                author: "Some Channel".to_string(),
                transcript: "Hello world".to_string(),
                segments: vec![TranscriptSegment {
                    text: "Hello world".to_string(),
                    start: 0.0,
                    duration: 1.0,
                }],
                total_segments: 1,
                url: url.to_string(),
            })
        }
    }

    fn router_with(service: Arc<StubUpstreams>, limiter: RateLimiter) -> Router {
        ensure_test_config();
        create_router(service, Arc::new(limiter))
    }

    fn default_router(service: Arc<StubUpstreams>) -> Router {
        ensure_test_config();
        let limiter = RateLimiter::from_config(crate::config::get_config());
        router_with(service, limiter)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn missing_fields_yield_400_naming_each_one() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service.clone());
        let (status, body) = get_json(app, "/api/ai/gemini").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing required fields: text, apikey");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn gemini_success_wraps_reply_in_envelope() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service.clone());
        let (status, body) = get_json(app, "/api/ai/gemini?text=hi&apikey=k").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["text"], "stub reply");
        assert!(body["timestamp"].is_string());
        assert_eq!(service.recorded_calls().await, vec!["gemini:hi"]);
    }

    #[tokio::test]
    async fn non_url_input_is_rejected_before_the_adapter() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service.clone());
        let (status, body) = get_json(app, "/api/downloader/pixeldrain?url=not%20a%20url").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid URL format for 'url'");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn development_errors_carry_a_diagnostic_stack() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) = get_json(app, "/api/downloader/videy?url=notaurl").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid URL format for 'url'");
        assert!(body["stack"].is_string());
    }

    #[tokio::test]
    async fn videy_resolution_round_trips_through_the_envelope() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) =
            get_json(app, "/api/downloader/videy?url=https://videy.co/?v=abc123def").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["fileurl"], "https://cdn.videy.co/abc123def.mp4");
    }

    #[tokio::test]
    async fn invalid_image_tool_type_lists_the_enumeration() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service.clone());
        let (status, body) =
            get_json(app, "/api/tools/imagetools?imgurl=https://x.test/a.png&type=sharpen").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Invalid type. Must be one of: removebg, enhance, upscale, restore, colorize"
        );
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn image_tools_streams_raw_bytes_with_content_type() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/tools/imagetools?imgurl=https://x.test/a.png&type=removebg")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn transcript_success_carries_the_full_record() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) = get_json(
            app,
            "/api/tools/yt-transcript?url=https://youtu.be/dQw4w9WgXcQ",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "Some Talk");
        assert_eq!(body["data"]["totalSegments"], 1);
        assert_eq!(body["data"]["segments"][0]["start"], 0.0);
    }

    #[tokio::test]
    async fn non_youtube_url_is_rejected() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service.clone());
        let (status, body) =
            get_json(app, "/api/tools/yt-transcript?url=https://vimeo.com/123").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid YouTube URL format");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_api_path_returns_the_catalog_404() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) = get_json(app, "/api/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Endpoint not found");
        assert!(body["availableEndpoints"]["downloader"].is_array());
    }

    #[tokio::test]
    async fn health_reports_ok_with_uptime() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert!(body["uptime"].is_number());
    }

    #[tokio::test]
    async fn api_info_lists_route_groups() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) = get_json(app, "/api").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["endpoints"]["ai"], "/api/ai");
    }

    #[tokio::test]
    async fn endpoint_catalog_enumerates_all_routes() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service);
        let (status, body) = get_json(app, "/apis.json").await;
        assert_eq!(status, StatusCode::OK);
        let endpoints = body["endpoints"].as_array().expect("endpoints array");
        assert_eq!(endpoints.len(), 5);
        assert!(
            endpoints
                .iter()
                .any(|e| e["path"] == "/api/tools/yt-transcript")
        );
    }

    #[tokio::test]
    async fn throttled_tier_rejects_excess_requests_but_health_is_exempt() {
        use crate::config::TierLimit;
        use std::time::Duration;

        let tight = TierLimit {
            window: Duration::from_secs(60),
            max: 2,
        };
        let service = Arc::new(StubUpstreams::default());
        let app = router_with(service, RateLimiter::new(tight, tight, tight));

        for _ in 0..2 {
            let (status, _) = get_json(
                app.clone(),
                "/api/downloader/videy?url=https://videy.co/?v=abc123def",
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = get_json(
            app.clone(),
            "/api/downloader/videy?url=https://videy.co/?v=abc123def",
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["success"], false);

        // health probes bypass every tier regardless of volume
        for _ in 0..10 {
            let (status, _) = get_json(app.clone(), "/health").await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn repeated_valid_requests_hit_the_adapter_each_time() {
        let service = Arc::new(StubUpstreams::default());
        let app = default_router(service.clone());
        for _ in 0..2 {
            let (status, _) = get_json(
                app.clone(),
                "/api/downloader/pixeldrain?url=https://pixeldrain.com/u/test123",
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        assert_eq!(service.recorded_calls().await.len(), 2);
    }
}
