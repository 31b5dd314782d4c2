//! Playback URL endpoint
//!
//! Hands players the proxied playlist URL for a stream key.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackResponse {
    pub stream_key: String,
    pub playback_url: String,
}

pub fn create_playback_router() -> Router<AppState> {
    Router::new().route("/api/playback/{stream_key}", get(get_playback))
}

/// GET /api/playback/{stream_key}
pub async fn get_playback(
    State(state): State<AppState>,
    Path(stream_key): Path<String>,
) -> AppResult<Json<PlaybackResponse>> {
    if !is_valid_stream_key(&stream_key) {
        return Err(AppError::bad_request(
            "Stream key may only contain letters, digits, '-' and '_'",
        ));
    }

    let playback_url = state.playback.playlist_url(&stream_key);
    Ok(Json(PlaybackResponse {
        stream_key,
        playback_url,
    }))
}

fn is_valid_stream_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
