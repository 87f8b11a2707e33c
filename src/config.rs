use axum::http::{header, HeaderValue, Method};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use validator::Validate;

const CONFIG_DIR: &str = "config";
const DEFAULT_ENV: &str = "development";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// Allow permissive CORS outside development (explicit opt-in)
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Wastage percentage applied when MRP callers supply none
    #[validate(range(min = 0.0, max = 100.0))]
    pub default_wastage_pct: f64,

    /// Capacity of the domain event channel
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Config carries the wastage default as a plain float; MRP math uses
    /// `Decimal`, so convert once here.
    pub fn default_wastage_decimal(&self) -> Decimal {
        Decimal::try_from(self.default_wastage_pct).unwrap_or(crate::mrp::DEFAULT_WASTAGE_PCT)
    }
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("default_wastage_pct", 5.0)?
        .set_default("event_channel_capacity", 1024)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;
    Ok(app_config)
}

/// Builds the CORS layer from config.
///
/// tower-http rejects `Any` methods/headers together with
/// `Access-Control-Allow-Credentials: true` (it panics when the layer is
/// applied), so the credentialed path uses explicit lists.
pub fn build_cors_layer(cfg: &AppConfig) -> Result<CorsLayer, ConfigError> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => {
            let layer = CorsLayer::new().allow_origin(origins);
            if cfg.cors_allow_credentials {
                Ok(layer
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_credentials(true))
            } else {
                Ok(layer.allow_methods(Any).allow_headers(Any))
            }
        }
        None if cfg.should_allow_permissive_cors() => {
            info!(
                "Using permissive CORS because explicit origins were not configured ({})",
                if cfg.is_development() {
                    "development environment"
                } else {
                    "explicit override enabled"
                }
            );
            Ok(CorsLayer::permissive())
        }
        None => Err(ConfigError::Message(
            "missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true".to_string(),
        )),
    }
}

pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("stitchflow_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter_directive));
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "production".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            cors_allowed_origins: None,
            cors_allow_credentials: false,
            cors_allow_any_origin: false,
            default_wastage_pct: 5.0,
            event_channel_capacity: 16,
        }
    }

    #[test]
    fn defaults_load_without_files() {
        let cfg = load_config().expect("defaults should load");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.environment, "development");
        assert_eq!(cfg.default_wastage_decimal(), dec!(5.0));
        assert!(cfg.should_allow_permissive_cors());
    }

    #[test]
    fn cors_requires_origins_outside_development() {
        assert!(build_cors_layer(&base_config()).is_err());

        let mut dev = base_config();
        dev.environment = "development".to_string();
        assert!(build_cors_layer(&dev).is_ok());
    }

    #[tokio::test]
    async fn credentialed_cors_layer_serves_requests() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use axum::{routing::get, Router};
        use tower::ServiceExt;

        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://app.example.com".to_string());
        cfg.cors_allow_credentials = true;

        let layer = build_cors_layer(&cfg).expect("explicit origins with credentials");
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(layer);

        // tower-http validates the rule combination when the layer is
        // applied; this request would panic with Any methods/headers
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .and_then(|v| v.to_str().ok()),
            Some("true")
        );
    }
}
