//! Seedream MCP Image Server
//!
//! MCP server for text-to-image generation using the Seedream API.

use anyhow::Result;
use clap::Parser;
use seedream_mcp_common::{Config, McpServerBuilder, TransportArgs};
use seedream_mcp_image::SeedreamServer;

/// Command-line arguments for the image server.
#[derive(Parser, Debug)]
#[command(name = "seedream-mcp-image")]
#[command(about = "MCP server for text-to-image generation using the Seedream API")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    seedream_mcp_common::tracing::init_tracing();

    tracing::info!("seedream-mcp-image server starting...");

    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        base_url = %config.base_url,
        timeout_secs = config.timeout_secs,
        api_key_present = config.api_key.is_some(),
        "Configuration loaded"
    );

    // Create the server handler
    let server = SeedreamServer::new(&config);

    // Build and run the MCP server
    let transport = args.transport.into_transport();

    McpServerBuilder::new(server)
        .with_transport(transport)
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
