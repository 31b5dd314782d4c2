//! Shared configuration, logging and URL helpers for the DEVOLO backend.

pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod playback;

pub use self::config::Config;
pub use playback::PlaybackUrls;
