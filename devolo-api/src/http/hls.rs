//! HLS proxy HTTP endpoint
//!
//! Relays playlists and segments from the media origin so players can fetch
//! them from the API's own origin.
//!
//! Endpoints:
//! - GET /hls/{*path} - playlist or segment, `Range` forwarded
//! - HEAD /hls/{*path} - same, answered from an upstream HEAD
//! - OPTIONS /hls/{*path} - CORS preflight
//!
//! The route is unauthenticated: `<video>`-style players cannot attach
//! bearer tokens.

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use devolo_proxy::{ProxyError, ProxyOutcome, ProxyRequest, RejectedResponse, RelayedResponse};
use tracing::debug;

use crate::http::AppState;

/// Create the HLS proxy router
///
/// The wildcard route keeps nested variant paths such as
/// `abc123_720p2628kbs/index.m3u8` in one piece.
pub fn create_hls_router() -> Router<AppState> {
    Router::new().route("/hls/{*path}", get(proxy_hls).options(hls_preflight))
}

/// GET /hls/{*path} - Proxy a playlist or segment from the media origin
pub async fn proxy_hls(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    // Forward the path still percent-encoded; a decoded `%3F` or `%23`
    // would otherwise turn into a query or fragment upstream.
    let path = uri
        .path()
        .strip_prefix("/hls/")
        .unwrap_or_default()
        .to_string();

    debug!(path = %path, has_range = headers.contains_key(header::RANGE), "HLS proxy request");

    let request = ProxyRequest {
        method,
        path,
        query,
        range: headers.get(header::RANGE).cloned(),
    };

    match state.hls_proxy.fetch(request).await {
        Ok(ProxyOutcome::Relayed(relayed)) => relayed_response(relayed),
        Ok(ProxyOutcome::Rejected(rejected)) => rejected_response(rejected),
        Err(e) => error_response(&e),
    }
}

/// OPTIONS /hls/{*path} - CORS preflight
pub async fn hls_preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Range"),
            (header::ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}

fn relayed_response(relayed: RelayedResponse) -> Response {
    let mut response = Response::new(Body::from_stream(relayed.body));
    *response.status_mut() = relayed.status;
    *response.headers_mut() = relayed.headers;
    response
}

// Plain text on purpose: a player must never parse an origin error page as media
fn rejected_response(rejected: RejectedResponse) -> Response {
    (
        rejected.status,
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        rejected.body,
    )
        .into_response()
}

fn error_response(err: &ProxyError) -> Response {
    (
        err.status_code(),
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        err.to_string(),
    )
        .into_response()
}
