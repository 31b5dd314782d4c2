use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub hls: HlsConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// HLS upstream and playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HlsConfig {
    /// Media origin that actually serves playlists and segments,
    /// e.g. an nginx-rtmp `hls_path` exposed at `http://localhost:8080/hls`
    pub upstream_base_url: String,
    /// Public base URL of this API, used to build player-facing playback URLs
    pub public_base_url: String,
    /// Connect and read timeout for upstream fetches
    pub timeout_seconds: u64,
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: "http://localhost:8080/hls".to_string(),
            public_base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl HlsConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Browser origins allowed to call the JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Load config file if provided
        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (DEVOLO_HLS__UPSTREAM_BASE_URL, etc.)
        builder = builder.add_source(
            Environment::with_prefix("DEVOLO")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cors.allowed_origins")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the loaded values, collecting every problem instead of
    /// stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be greater than 0".to_string());
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        for (key, value) in [
            ("hls.upstream_base_url", &self.hls.upstream_base_url),
            ("hls.public_base_url", &self.hls.public_base_url),
        ] {
            if let Err(e) = check_http_url(value) {
                errors.push(format!("{key}: {e}"));
            }
        }

        if self.hls.timeout_seconds == 0 {
            errors.push("hls.timeout_seconds must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

fn check_http_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL \"{raw}\": {e}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme \"{other}\" in \"{raw}\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.http_port, 8000);
        assert_eq!(config.hls.upstream_base_url, "http://localhost:8080/hls");
        assert_eq!(config.hls.timeout(), Duration::from_secs(30));
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_address() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                http_port: 9000,
            },
            ..Config::default()
        };

        assert_eq!(config.http_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = Config {
            logging: LoggingConfig {
                format: "xml".to_string(),
                ..LoggingConfig::default()
            },
            hls: HlsConfig {
                upstream_base_url: "not a url".to_string(),
                public_base_url: "ftp://media.example.com".to_string(),
                timeout_seconds: 0,
            },
            ..Config::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.starts_with("logging.format")));
        assert!(errors.iter().any(|e| e.starts_with("hls.upstream_base_url")));
        assert!(errors.iter().any(|e| e.contains("unsupported scheme \"ftp\"")));
        assert!(errors.iter().any(|e| e.starts_with("hls.timeout_seconds")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "hls:\n  upstream_base_url: http://origin.internal:8080/live\n  timeout_seconds: 5\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.hls.upstream_base_url, "http://origin.internal:8080/live");
        assert_eq!(config.hls.timeout_seconds, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.hls.public_base_url, "http://localhost:8000");
        assert_eq!(config.server.http_port, 8000);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load(Some("/nonexistent/devolo.yaml")).unwrap();
        assert_eq!(config.logging.level, "info");
    }
}
