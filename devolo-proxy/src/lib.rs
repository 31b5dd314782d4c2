//! HLS reverse proxy
//!
//! Forwards playlist and segment requests to the media origin and relays
//! the answer with player-friendly headers. The proxy is stateless: one
//! inbound request maps to exactly one upstream GET (or HEAD), with no retries and
//! no coalescing of concurrent requests for the same segment.
//!
//! The HTTP adapter in `devolo-api` turns a [`ProxyOutcome`] or a
//! [`ProxyError`] into the wire response.

mod error;

pub use error::ProxyError;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tracing::{debug, warn};

/// Connect and read timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Origin error bodies are diagnostics, not media; anything past this is dropped.
pub const MAX_REJECTED_BODY_BYTES: usize = 4 * 1024;

/// Upstream headers copied onto a successful response.
const RELAYED_HEADERS: [HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
    header::CACHE_CONTROL,
];

/// Immutable proxy settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct HlsProxyConfig {
    /// Base URL of the media origin, e.g. `http://localhost:8080/hls`.
    pub upstream_base_url: String,
    /// Bound on connecting, on waiting for response headers and on each body read.
    pub timeout: Duration,
}

impl HlsProxyConfig {
    pub fn new(upstream_base_url: impl Into<String>) -> Self {
        Self {
            upstream_base_url: upstream_base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One inbound player request.
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    /// `GET`, or `HEAD` to fetch headers only.
    pub method: Method,
    /// Route tail after `/hls/`, possibly nested (`key_720p/index.m3u8`),
    /// still percent-encoded as received.
    pub path: String,
    /// Raw query string, forwarded verbatim.
    pub query: Option<String>,
    /// Client `Range` header, forwarded unchanged when present.
    pub range: Option<HeaderValue>,
}

pub type BodyStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// Upstream answered with a status below 400.
pub struct RelayedResponse {
    pub status: StatusCode,
    /// Already rewritten for the player (content type, caching, CORS).
    pub headers: HeaderMap,
    /// Upstream body, streamed chunk by chunk.
    pub body: BodyStream,
}

impl fmt::Debug for RelayedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Upstream itself rejected the request (404 missing segment, 5xx, ...).
#[derive(Debug)]
pub struct RejectedResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug)]
pub enum ProxyOutcome {
    Relayed(RelayedResponse),
    Rejected(RejectedResponse),
}

impl ProxyOutcome {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Relayed(r) => r.status,
            Self::Rejected(r) => r.status,
        }
    }
}

/// Reverse proxy towards a single media origin.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HlsProxy {
    client: reqwest::Client,
    upstream_base: String,
    timeout: Duration,
}

impl HlsProxy {
    pub fn new(config: HlsProxyConfig) -> Result<Self, ProxyError> {
        let parsed =
            url::Url::parse(&config.upstream_base_url).map_err(|e| ProxyError::InvalidUpstream {
                url: config.upstream_base_url.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidUpstream {
                url: config.upstream_base_url,
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self {
            client,
            upstream_base: config.upstream_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    #[must_use]
    pub fn upstream_base(&self) -> &str {
        &self.upstream_base
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `request` from the origin.
    ///
    /// Dropping the returned future, or the body stream of a relayed
    /// response, aborts the upstream transfer.
    pub async fn fetch(&self, request: ProxyRequest) -> Result<ProxyOutcome, ProxyError> {
        let url = upstream_url(&self.upstream_base, &request.path, request.query.as_deref());

        let method = if request.method == Method::HEAD {
            Method::HEAD
        } else {
            Method::GET
        };
        let mut outbound = self.client.request(method, &url);
        if let Some(range) = request.range {
            outbound = outbound.header(header::RANGE, range);
        }

        let response = match tokio::time::timeout(self.timeout, outbound.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(upstream = %url, error = %e, "HLS upstream request failed");
                return Err(ProxyError::UpstreamUnreachable(e.without_url()));
            }
            Err(_) => {
                warn!(upstream = %url, timeout = ?self.timeout, "HLS upstream timed out");
                return Err(ProxyError::UpstreamTimeout(self.timeout));
            }
        };

        let status = response.status();

        if status.as_u16() >= 400 {
            let body = read_capped(response, MAX_REJECTED_BODY_BYTES)
                .await
                .map_err(|e| {
                    warn!(upstream = %url, error = %e, "Failed to read HLS upstream error body");
                    ProxyError::UpstreamUnreachable(e.without_url())
                })?;
            debug!(path = %request.path, status = status.as_u16(), "HLS upstream rejected request");
            return Ok(ProxyOutcome::Rejected(RejectedResponse { status, body }));
        }

        let headers = relay_headers(&request.path, response.headers());
        debug!(path = %request.path, status = status.as_u16(), "Relaying HLS upstream response");

        Ok(ProxyOutcome::Relayed(RelayedResponse {
            status,
            headers,
            body: response.bytes_stream().boxed(),
        }))
    }
}

/// Read at most `limit` bytes of `response`, then drop the rest of the transfer.
async fn read_capped(response: reqwest::Response, limit: usize) -> Result<Bytes, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(body))
}

/// Join the origin base, the captured path and the query string.
///
/// Path segments are passed through as-is, `..` included.
#[must_use]
pub fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Content type derived from the file extension. The origin's own
/// `Content-Type` is ignored since some origins mislabel playlists.
#[must_use]
pub fn content_type_for(path: &str) -> &'static str {
    let path = path.to_ascii_lowercase();
    if path.ends_with(".m3u8") {
        PLAYLIST_CONTENT_TYPE
    } else if path.ends_with(".ts") {
        SEGMENT_CONTENT_TYPE
    } else {
        FALLBACK_CONTENT_TYPE
    }
}

/// Headers for a successful response.
///
/// `Content-Length` is carried over so segments are not re-framed as chunked.
/// `Cache-Control` falls back to `no-cache` only when the origin sent none;
/// a stale live playlist points at expired segments.
#[must_use]
pub fn relay_headers(path: &str, upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(path)),
    );

    for name in &RELAYED_HEADERS {
        for value in upstream.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-cache"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_joins_with_single_slash() {
        assert_eq!(
            upstream_url("http://origin/hls/", "/key_720p/index.m3u8", None),
            "http://origin/hls/key_720p/index.m3u8"
        );
        assert_eq!(
            upstream_url("http://origin/hls", "key.m3u8", None),
            "http://origin/hls/key.m3u8"
        );
    }

    #[test]
    fn test_upstream_url_appends_query_verbatim() {
        assert_eq!(
            upstream_url("http://origin/hls", "seg-1.ts", Some("token=a%20b&t=1")),
            "http://origin/hls/seg-1.ts?token=a%20b&t=1"
        );
        assert_eq!(
            upstream_url("http://origin/hls", "seg-1.ts", Some("")),
            "http://origin/hls/seg-1.ts"
        );
    }

    #[test]
    fn test_upstream_url_keeps_dot_segments() {
        assert_eq!(
            upstream_url("http://origin/hls", "a/../b/index.m3u8", None),
            "http://origin/hls/a/../b/index.m3u8"
        );
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("key/index.m3u8"), PLAYLIST_CONTENT_TYPE);
        assert_eq!(content_type_for("KEY/INDEX.M3U8"), PLAYLIST_CONTENT_TYPE);
        assert_eq!(content_type_for("key_720p/seg-12.ts"), SEGMENT_CONTENT_TYPE);
        assert_eq!(content_type_for("key/Seg.TS"), SEGMENT_CONTENT_TYPE);
        assert_eq!(content_type_for("key/meta.json"), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for("key/init.mp4"), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for("playlist.m3u8.bak"), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_relay_headers_filters_and_defaults() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        upstream.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        upstream.insert(header::SERVER, HeaderValue::from_static("nginx"));
        upstream.insert(header::SET_COOKIE, HeaderValue::from_static("sid=1"));

        let headers = relay_headers("key/index.m3u8", &upstream);

        assert_eq!(headers[header::CONTENT_TYPE], PLAYLIST_CONTENT_TYPE);
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::SERVER).is_none());
        assert!(headers.get(header::SET_COOKIE).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_relay_headers_keeps_content_length() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("500"));

        let headers = relay_headers("key/seg-1.ts", &upstream);

        assert_eq!(headers[header::CONTENT_LENGTH], "500");
    }

    #[test]
    fn test_relay_headers_keeps_upstream_cache_control() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=2"));

        let headers = relay_headers("key/seg-1.ts", &upstream);

        let values: Vec<_> = headers.get_all(header::CACHE_CONTROL).iter().collect();
        assert_eq!(values, vec!["max-age=2"]);
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let err = HlsProxy::new(HlsProxyConfig::new("localhost:8080/hls")).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidUpstream { .. }));

        let err = HlsProxy::new(HlsProxyConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidUpstream { .. }));
    }

    #[test]
    fn test_new_trims_base_url() {
        let proxy = HlsProxy::new(
            HlsProxyConfig::new("http://localhost:8080/hls/").with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(proxy.upstream_base(), "http://localhost:8080/hls");
        assert_eq!(proxy.timeout(), Duration::from_secs(5));
    }
}
