//! Seedream MCP Image Server Library
//!
//! This library provides text-to-image generation through the Seedream API,
//! exposed as MCP tools.

pub mod formatter;
pub mod handler;
pub mod server;

pub use handler::{
    GenerateImageGroupParams, GenerateImageParams, GenerationOutcome, SeedreamHandler,
};
pub use server::SeedreamServer;
