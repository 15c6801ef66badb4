//! HTTP transport client for the Seedream upstream API.
//!
//! Issues exactly one request per call with the configured timeout. There
//! are no retries at this layer; failure classification lives in
//! [`crate::error::ToolError`].

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, ToolError};

/// Client for the upstream generation API and image downloads.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    /// Build a client from the loaded configuration.
    pub fn new(config: &Config) -> Self {
        // Construction must not fall back to a client without the
        // configured timeout.
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// The configured base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one API request and return the parsed JSON response.
    ///
    /// Fails fast with a `ConfigMissing` error when no API key is
    /// configured; no network attempt is made in that case.
    ///
    /// # Errors
    /// - `ConfigMissing` when the credential is absent
    /// - `Upstream` on a non-2xx response, with the status mapped to a
    ///   remediation hint and the upstream message/code carried through
    /// - `Network` on DNS, connection, or timeout failures
    pub async fn call_api(
        &self,
        endpoint: &str,
        method: Method,
        query: Option<&[(&str, String)]>,
        body: Option<&Value>,
    ) -> Result<Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ToolError::config_missing("SEEDREAM_API_KEY"))?;

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!(url = %url, method = %method, "Calling Seedream API");

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json");

        if let Some(query) = query {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::from_response(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::from_transport(&e))
    }

    /// Fetch raw bytes from a URL, following redirects.
    ///
    /// # Errors
    /// - `Upstream` on a non-2xx response
    /// - `Network` on DNS, connection, or timeout failures
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url = %url, "Fetching image bytes");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::from_response(status.as_u16(), ""));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ToolError::from_transport(&e))?;
        Ok(bytes.to_vec())
    }
}
