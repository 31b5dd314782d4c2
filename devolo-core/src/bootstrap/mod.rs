//! Bootstrap helpers for starting the DEVOLO API server

pub mod config;

pub use config::load_config;
