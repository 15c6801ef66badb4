//! Error types for the Seedream MCP server.
//!
//! All tool-facing failures are represented by a single structured
//! [`ToolError`] carrying a human message, an actionable suggestion, a
//! machine-readable code, and the upstream HTTP status when one exists.
//! Infrastructure-only failures (bad environment values) use the separate
//! [`ConfigError`] enum.

use std::fmt;

use thiserror::Error;

/// Machine-readable classification of a [`ToolError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    /// The API credential is not configured
    ConfigMissing,
    /// Input validation failed before any network call
    Validation,
    /// Network-level failure (DNS, connection, timeout)
    Network,
    /// Upstream API error; carries the upstream's own error code when the
    /// response body supplied one
    Upstream(Option<String>),
    /// Download failed due to filesystem permissions
    Permission,
    /// Download failed because the disk is full
    DiskSpace,
    /// Any other download failure
    Download,
    /// Unexpected failure wrapped at the orchestration boundary
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ConfigMissing => write!(f, "CONFIG_MISSING"),
            ErrorCode::Validation => write!(f, "VALIDATION_ERROR"),
            ErrorCode::Network => write!(f, "NETWORK_ERROR"),
            ErrorCode::Upstream(Some(code)) => write!(f, "{}", code),
            ErrorCode::Upstream(None) => write!(f, "API_ERROR"),
            ErrorCode::Permission => write!(f, "PERMISSION_ERROR"),
            ErrorCode::DiskSpace => write!(f, "DISK_SPACE_ERROR"),
            ErrorCode::Download => write!(f, "DOWNLOAD_ERROR"),
            ErrorCode::Internal => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Structured error returned by every tool operation.
#[derive(Debug, Clone)]
pub struct ToolError {
    /// Human-readable failure description
    pub message: String,
    /// Actionable remediation hint
    pub suggestion: Option<String>,
    /// Machine-readable classification
    pub code: Option<ErrorCode>,
    /// HTTP status returned by the upstream API, when applicable
    pub status: Option<u16>,
}

impl ToolError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            code: None,
            status: None,
        }
    }

    /// Attach a remediation suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a machine-readable code.
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach the upstream HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Missing-credential error, raised before any network attempt.
    pub fn config_missing(var: &str) -> Self {
        Self::new("API key is not configured")
            .with_suggestion(format!(
                "Set the {} environment variable or add it to a .env file",
                var
            ))
            .with_code(ErrorCode::ConfigMissing)
    }

    /// Input validation error, raised before any network attempt.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message)
            .with_suggestion("Check the request parameters and try again")
            .with_code(ErrorCode::Validation)
    }

    /// Wrap an unexpected failure at the orchestration boundary.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message)
            .with_suggestion("Check the prompt and API configuration, then retry")
            .with_code(ErrorCode::Internal)
    }

    /// True when this error was raised by input validation.
    pub fn is_validation(&self) -> bool {
        matches!(self.code, Some(ErrorCode::Validation))
    }

    /// Classify a non-2xx upstream response.
    ///
    /// Extracts the upstream's own `message` and `error_code` from the body
    /// when it is parseable JSON, and maps the status to a fixed remediation
    /// hint.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (message, upstream_code) = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => {
                let message = json
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("API request failed with status {}", status));
                let code = json
                    .get("error_code")
                    .and_then(|c| c.as_str())
                    .map(str::to_string);
                (message, code)
            }
            Err(_) => (format!("API request failed with status {}", status), None),
        };

        Self::new(message)
            .with_suggestion(suggestion_for_status(status))
            .with_code(ErrorCode::Upstream(upstream_code))
            .with_status(status)
    }

    /// Classify a network-level transport failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Request timed out: {}", err)
        } else {
            format!("Network request failed: {}", err)
        };
        Self::new(message)
            .with_suggestion("Check the network connection and the API server status")
            .with_code(ErrorCode::Network)
    }

    /// Classify an I/O failure from the download side-path.
    ///
    /// Disk exhaustion is detected by the structured `StorageFull` kind
    /// first, with a message match as fallback for platforms that surface
    /// the condition only as a generic error.
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::PermissionDenied => {
                Self::new(format!("Permission denied: {}", err))
                    .with_suggestion("Ensure the download directory is writable")
                    .with_code(ErrorCode::Permission)
            }
            ErrorKind::StorageFull => {
                Self::new(format!("Insufficient disk space: {}", err))
                    .with_suggestion("Free up disk space or choose another download directory")
                    .with_code(ErrorCode::DiskSpace)
            }
            _ if err.to_string().contains("No space left on device") => {
                Self::new(format!("Insufficient disk space: {}", err))
                    .with_suggestion("Free up disk space or choose another download directory")
                    .with_code(ErrorCode::DiskSpace)
            }
            _ => {
                Self::new(format!("Image download failed: {}", err))
                    .with_suggestion(
                        "Check the network connection and ensure the download directory \
                         exists and is writable",
                    )
                    .with_code(ErrorCode::Download)
            }
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {}", suggestion)?;
        }
        if let Some(code) = &self.code {
            write!(f, "\nError Code: {}", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolError {}

impl From<ConfigError> for ToolError {
    fn from(err: ConfigError) -> Self {
        ToolError::new(err.to_string())
            .with_suggestion("Check the environment configuration")
            .with_code(ErrorCode::ConfigMissing)
    }
}

/// Fixed remediation table for upstream HTTP statuses.
pub fn suggestion_for_status(status: u16) -> &'static str {
    match status {
        401 => "Check that the API key is configured correctly",
        403 => "Insufficient permissions; check the API key's access rights",
        404 => "The requested resource does not exist; check the endpoint path",
        429 => "Too many requests; retry later or increase the request interval",
        500.. => "Server-side error; retry later",
        _ => "Check that the request parameters are correct",
    }
}

/// Configuration errors from loading environment values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Result type alias using the tool error.
pub type Result<T> = std::result::Result<T, ToolError>;
