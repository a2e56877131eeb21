//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vastcast_media::{FontSpec, DEFAULT_CTA_TEXT, DEFAULT_FONT_FAMILY, DEFAULT_RENDER_TIMEOUT};
use vastcast_models::EncodingConfig;
use vastcast_resolver::{DEFAULT_MAX_REDIRECTS, DEFAULT_RESOLVE_TIMEOUT};
use vastcast_vast::DEFAULT_FETCH_TIMEOUT;

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_RATE_LIMIT_RPS: u32 = 2;
const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
const DEFAULT_BACKGROUND_IMAGE: &str = "static/images/background-kerv.jpg";
const OUTPUT_DIR_NAME: &str = "vast_converter_generated";

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Conversions per second per client IP
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Expose `/metrics`
    pub metrics_enabled: bool,
    pub conversion: ConversionConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            environment: "development".to_string(),
            metrics_enabled: true,
            conversion: ConversionConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("API_PORT").unwrap_or(DEFAULT_PORT),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(DEFAULT_RATE_LIMIT_RPS),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(DEFAULT_MAX_BODY_SIZE),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            conversion: ConversionConfig::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Settings for the conversion pipeline.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Shared directory for generated artifacts
    pub output_dir: PathBuf,
    pub background_image: PathBuf,
    pub font: FontSpec,
    pub cta_text: String,
    pub render_timeout: Duration,
    pub resolve_timeout: Duration,
    pub max_redirects: usize,
    pub fetch_timeout: Duration,
    /// Explicit encoder path; discovered when unset
    pub ffmpeg_path: Option<PathBuf>,
    pub encoding: EncodingConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join(OUTPUT_DIR_NAME),
            background_image: PathBuf::from(DEFAULT_BACKGROUND_IMAGE),
            font: FontSpec::default(),
            cta_text: DEFAULT_CTA_TEXT.to_string(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            ffmpeg_path: None,
            encoding: EncodingConfig::default(),
        }
    }
}

impl ConversionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let font = match env_nonempty("VASTCAST_FONT_FILE") {
            Some(path) => FontSpec::File(PathBuf::from(path)),
            None => FontSpec::Family(
                env_nonempty("VASTCAST_FONT_FAMILY").unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            ),
        };

        Self {
            output_dir: env_nonempty("VASTCAST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            background_image: env_nonempty("VASTCAST_BACKGROUND_IMAGE")
                .map(PathBuf::from)
                .unwrap_or(defaults.background_image),
            font,
            cta_text: env_nonempty("VASTCAST_CTA_TEXT").unwrap_or(defaults.cta_text),
            render_timeout: env_parse("VASTCAST_RENDER_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.render_timeout),
            resolve_timeout: env_parse("VASTCAST_RESOLVE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.resolve_timeout),
            max_redirects: env_parse("VASTCAST_MAX_REDIRECTS").unwrap_or(defaults.max_redirects),
            fetch_timeout: env_parse("VASTCAST_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            ffmpeg_path: env_nonempty("FFMPEG_PATH").map(PathBuf::from),
            encoding: defaults.encoding,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 5001);
        assert_eq!(config.rate_limit_rps, 2);
        assert!(!config.is_production());

        let conversion = config.conversion;
        assert!(conversion.output_dir.ends_with("vast_converter_generated"));
        assert_eq!(conversion.render_timeout, Duration::from_secs(120));
        assert_eq!(conversion.resolve_timeout, Duration::from_secs(20));
        assert_eq!(conversion.max_redirects, 10);
        assert_eq!(conversion.fetch_timeout, Duration::from_secs(10));
        assert_eq!(conversion.cta_text, "SCAN QR CODE FOR MORE.");
        assert_eq!(conversion.font, FontSpec::Family("Arial".to_string()));
    }

    #[test]
    fn test_production_flag_is_case_insensitive() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.is_production());
    }
}
