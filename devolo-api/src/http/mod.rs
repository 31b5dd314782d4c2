// Module: http
// HTTP surface: HLS proxy, playback URLs and health check

pub mod error;
pub mod health;
pub mod hls;
pub mod playback;

use std::sync::Arc;

use axum::{http::HeaderValue, Router};
use devolo_core::{config::CorsConfig, Config, PlaybackUrls};
use devolo_proxy::{HlsProxy, HlsProxyConfig};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hls_proxy: Arc<HlsProxy>,
    pub playback: Arc<PlaybackUrls>,
}

impl AppState {
    pub fn new(hls_proxy: HlsProxy, playback: PlaybackUrls) -> Self {
        Self {
            hls_proxy: Arc::new(hls_proxy),
            playback: Arc::new(playback),
        }
    }

    /// Build the state from the loaded configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let proxy_config =
            HlsProxyConfig::new(config.hls.upstream_base_url.clone()).with_timeout(config.hls.timeout());
        let hls_proxy = HlsProxy::new(proxy_config)
            .map_err(|e| anyhow::anyhow!("Failed to create HLS proxy: {e}"))?;

        Ok(Self::new(
            hls_proxy,
            PlaybackUrls::new(config.hls.public_base_url.clone()),
        ))
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    // The proxy sets its own `Access-Control-Allow-Origin: *`, so the
    // origin-restricted CORS layer only wraps the JSON routes.
    let api = Router::new()
        .merge(health::create_health_router())
        .merge(playback::create_playback_router())
        .layer(cors_layer(cors));

    Router::new()
        .merge(hls::create_hls_router())
        .merge(api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::not_found("Not found")
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
