use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Failures the proxy converts into a response instead of relaying
/// anything from the upstream.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream base URL {url:?}: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection refused, DNS or TLS failure, or a body read that failed
    /// before anything was relayed.
    #[error("HLS upstream unavailable: {0}")]
    UpstreamUnreachable(#[source] reqwest::Error),

    #[error("HLS upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

impl ProxyError {
    /// Status code presented to the player for this failure.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamUnreachable(_) | Self::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidUpstream { .. } | Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_bad_gateway() {
        let err = ProxyError::UpstreamTimeout(Duration::from_millis(250));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "HLS upstream did not respond within 250ms");
    }

    #[test]
    fn test_configuration_errors_are_internal() {
        let err = ProxyError::InvalidUpstream {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
