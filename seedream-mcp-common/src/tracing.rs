//! Tracing initialization for the Seedream MCP server.
//!
//! Filtering is controlled through the `RUST_LOG` environment variable,
//! e.g. `RUST_LOG=seedream_mcp_image=debug`.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE)
        // Stdout carries the MCP protocol in stdio mode; logs go to stderr.
        .with_writer(std::io::stderr)
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Defaults to `info` when `RUST_LOG` is not set.
///
/// # Panics
/// Panics if a global subscriber was already installed.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer())
        .init();
}

/// Try to initialize tracing, returning `Err` if already initialized.
///
/// Useful in tests where initialization may happen more than once.
pub fn try_init_tracing() -> Result<(), ()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer())
        .try_init()
        .map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_init_tracing_does_not_panic() {
        // May succeed or fail depending on test order, but never panics.
        let _ = try_init_tracing();
        let _ = try_init_tracing();
    }
}
