//! Player-facing playback URLs
//!
//! Players never talk to the media origin directly; every playlist URL
//! handed out points at this API's `/hls/` proxy route.

/// Builds playback URLs rooted at the API's public base URL.
#[derive(Debug, Clone)]
pub struct PlaybackUrls {
    public_base: String,
}

impl PlaybackUrls {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        let public_base = public_base_url.into().trim_end_matches('/').to_string();
        Self { public_base }
    }

    /// Master playlist URL for a channel's stream key.
    #[must_use]
    pub fn playlist_url(&self, stream_key: &str) -> String {
        format!("{}/hls/{}.m3u8", self.public_base, stream_key)
    }

    #[must_use]
    pub fn public_base(&self) -> &str {
        &self.public_base
    }
}
