//! Seedream MCP Common Library
//!
//! Shared utilities for configuration, the upstream API transport client,
//! the image download side-path, error handling, tracing, and the MCP
//! server bootstrap.

pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod server;
pub mod tracing;
pub mod transport;

pub use api::ApiClient;
pub use config::Config;
pub use error::{ConfigError, ErrorCode, Result, ToolError};
pub use server::{McpServerBuilder, ServerError, shutdown_channel};
pub use transport::{Transport, TransportArgs, TransportMode};
