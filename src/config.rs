use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Execution mode controlling how much error detail is revealed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Local development: error responses carry diagnostic detail.
    Development,
    /// Production-like: internal error messages are suppressed.
    Production,
}

/// Window length and request ceiling for one rate-limit tier.
#[derive(Clone, Copy, Debug)]
pub struct TierLimit {
    /// Sliding-window length.
    pub window: Duration,
    /// Maximum requests allowed per client address within one window.
    pub max: u32,
}

/// Runtime configuration for the gateway.
#[derive(Debug)]
pub struct Config {
    /// Execution mode (development or production).
    pub run_mode: RunMode,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Allowed CORS origin (`*` by default).
    pub cors_origin: String,
    /// Whether a trusted reverse proxy sits in front of the gateway. Only then
    /// is `x-forwarded-for` honored for rate-limit bucketing.
    pub trust_proxy: bool,
    /// Directory holding the static front-end documents.
    pub asset_dir: String,
    /// Upper bound applied to every outbound upstream call.
    pub upstream_timeout: Duration,
    /// Global tier applied to all routes except the skip list.
    pub global_limit: TierLimit,
    /// Stricter tier layered on the AI route group.
    pub ai_limit: TierLimit,
    /// Moderate tier layered on the downloader route group.
    pub downloader_limit: TierLimit,
    /// Base URL of the Gemini API.
    pub gemini_base_url: String,
    /// Base URL of the image-processing upstream.
    pub imagetools_base_url: String,
    /// Base URL of the transcript-scraping upstream.
    pub transcript_base_url: String,
}

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            run_mode: match load_env_optional("RUN_MODE").as_deref() {
                Some("production") => RunMode::Production,
                _ => RunMode::Development,
            },
            server_port: parse_optional("PORT")?,
            cors_origin: load_env_optional("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
            trust_proxy: parse_optional("TRUST_PROXY")?.unwrap_or(false),
            asset_dir: load_env_optional("ASSET_DIR").unwrap_or_else(|| "public".to_string()),
            upstream_timeout: Duration::from_secs(
                parse_optional("UPSTREAM_TIMEOUT_SECS")?.unwrap_or(30),
            ),
            global_limit: TierLimit {
                window: window_from_env("RATE_LIMIT_WINDOW_SECS")?,
                max: parse_optional("RATE_LIMIT_MAX")?.unwrap_or(100),
            },
            ai_limit: TierLimit {
                window: window_from_env("AI_RATE_LIMIT_WINDOW_SECS")?,
                max: parse_optional("AI_RATE_LIMIT_MAX")?.unwrap_or(20),
            },
            downloader_limit: TierLimit {
                window: window_from_env("DOWNLOADER_RATE_LIMIT_WINDOW_SECS")?,
                max: parse_optional("DOWNLOADER_RATE_LIMIT_MAX")?.unwrap_or(50),
            },
            gemini_base_url: load_env_optional("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            imagetools_base_url: load_env_optional("IMAGETOOLS_BASE_URL")
                .unwrap_or_else(|| "https://imagetools.rapikzyeah.biz.id".to_string()),
            transcript_base_url: load_env_optional("TRANSCRIPT_BASE_URL")
                .unwrap_or_else(|| "https://youtubetotranscript.com".to_string()),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn window_from_env(key: &str) -> Result<Duration, ConfigError> {
    Ok(parse_optional(key)?
        .map(Duration::from_secs)
        .unwrap_or(FIFTEEN_MINUTES))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        run_mode = ?config.run_mode,
        server_port = ?config.server_port,
        upstream_timeout_secs = config.upstream_timeout.as_secs(),
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_defaults_match_policy() {
        let config = Config::from_env().expect("defaults load");
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert_eq!(config.global_limit.max, 100);
        assert_eq!(config.ai_limit.max, 20);
        assert_eq!(config.downloader_limit.max, 50);
        assert_eq!(config.global_limit.window, FIFTEEN_MINUTES);
        assert!(config.ai_limit.max < config.downloader_limit.max);
    }

    #[test]
    fn proxies_are_untrusted_and_assets_local_by_default() {
        let config = Config::from_env().expect("defaults load");
        assert!(!config.trust_proxy);
        assert_eq!(config.asset_dir, "public");
    }
}
