//! Configuration module for loading environment variables and settings.

use crate::error::ConfigError;

/// Default upstream API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.seedream.ai";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default directory for downloaded images.
pub const DEFAULT_DOWNLOAD_DIR: &str = "./generated_images";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seedream API key. Absence is not a startup error; each API call
    /// fails fast when no key is configured.
    pub api_key: Option<String>,
    /// Upstream API base URL
    pub base_url: String,
    /// Per-call request timeout in seconds
    pub timeout_secs: u64,
    /// Directory used for downloads when the caller does not choose one
    pub default_download_dir: String,
    /// HTTP server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables and .env file.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if REQUEST_TIMEOUT or PORT is
    /// set but not a valid number.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_key = std::env::var("SEEDREAM_API_KEY").ok().filter(|k| !k.is_empty());

        let base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout_secs = match std::env::var("REQUEST_TIMEOUT") {
            Ok(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT".to_string(), raw.clone())
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let default_download_dir = std::env::var("DEFAULT_DOWNLOAD_DIR")
            .unwrap_or_else(|_| DEFAULT_DOWNLOAD_DIR.to_string());

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string(), raw.clone()))?,
            Err(_) => 8080,
        };

        Ok(Self {
            api_key,
            base_url,
            timeout_secs,
            default_download_dir,
            port,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_download_dir: DEFAULT_DOWNLOAD_DIR.to_string(),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.default_download_dir, DEFAULT_DOWNLOAD_DIR);
        assert_eq!(config.port, 8080);
    }
}
