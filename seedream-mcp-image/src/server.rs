//! MCP Server implementation for the Seedream image server.
//!
//! This module provides the MCP server handler that exposes:
//! - `generate_image` tool for single text-to-image generation
//! - `generate_image_group` tool for batched generation (1-10 prompts)

use crate::formatter::render;
use crate::handler::{
    DEFAULT_IMAGE_SIZE, DetailLevel, GenerateImageGroupParams, GenerateImageParams, OutputFormat,
    ResponseFormat, SeedreamHandler,
};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
};
use schemars::JsonSchema;
use seedream_mcp_common::config::Config;
use seedream_mcp_common::error::ToolError;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::info;

/// MCP Server for Seedream image generation.
#[derive(Clone)]
pub struct SeedreamServer {
    /// Handler for generation operations
    handler: Arc<SeedreamHandler>,
}

/// Tool parameters wrapper for generate_image.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageToolParams {
    /// Text prompt describing the image to generate (1-600 characters)
    pub prompt: String,
    /// Image size, e.g. "2048x2048", "1K", "2K", "4K" (default: "2048x2048")
    #[serde(default)]
    pub size: Option<String>,
    /// Result representation: "url", "b64_json", or "local_file" (default: "url")
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
    /// Download directory for local_file mode (default: configured directory)
    #[serde(default)]
    pub download_dir: Option<String>,
    /// Whether the API should optimize the prompt (default: true)
    #[serde(default)]
    pub optimize_prompt: Option<bool>,
    /// Output format: "json" or "markdown" (default: "json")
    #[serde(default)]
    pub format: Option<OutputFormat>,
    /// Detail level: "concise" or "detailed" (default: "concise")
    #[serde(default)]
    pub detail: Option<DetailLevel>,
}

impl From<GenerateImageToolParams> for GenerateImageParams {
    fn from(params: GenerateImageToolParams) -> Self {
        Self {
            prompt: params.prompt,
            size: params
                .size
                .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
            response_format: params.response_format.unwrap_or_default(),
            download_dir: params.download_dir,
            optimize_prompt: params.optimize_prompt.unwrap_or(true),
            format: params.format.unwrap_or_default(),
            detail: params.detail.unwrap_or_default(),
        }
    }
}

/// Tool parameters wrapper for generate_image_group.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateImageGroupToolParams {
    /// Prompts to generate images for, 1-10 entries (1-600 characters each)
    pub prompts: Vec<String>,
    /// Image size shared by all prompts (default: "2048x2048")
    #[serde(default)]
    pub size: Option<String>,
    /// Result representation: "url", "b64_json", or "local_file" (default: "local_file")
    #[serde(default)]
    pub response_format: Option<ResponseFormat>,
    /// Download directory for local_file mode (default: configured directory)
    #[serde(default)]
    pub download_dir: Option<String>,
    /// Whether the API should optimize the prompts (default: true)
    #[serde(default)]
    pub optimize_prompt: Option<bool>,
    /// Output format: "json" or "markdown" (default: "json")
    #[serde(default)]
    pub format: Option<OutputFormat>,
    /// Detail level: "concise" or "detailed" (default: "concise")
    #[serde(default)]
    pub detail: Option<DetailLevel>,
}

impl From<GenerateImageGroupToolParams> for GenerateImageGroupParams {
    fn from(params: GenerateImageGroupToolParams) -> Self {
        Self {
            prompts: params.prompts,
            size: params
                .size
                .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
            response_format: params.response_format.unwrap_or(ResponseFormat::LocalFile),
            download_dir: params.download_dir,
            optimize_prompt: params.optimize_prompt.unwrap_or(true),
            format: params.format.unwrap_or_default(),
            detail: params.detail.unwrap_or_default(),
        }
    }
}

fn tool_error_to_mcp(error: ToolError) -> McpError {
    if error.is_validation() {
        McpError::invalid_params(error.to_string(), None)
    } else {
        McpError::internal_error(error.to_string(), None)
    }
}

impl SeedreamServer {
    /// Create a new SeedreamServer with the given configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            handler: Arc::new(SeedreamHandler::new(config)),
        }
    }

    /// Create a server around an existing handler (used by tests).
    pub fn with_handler(handler: SeedreamHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Generate a single image from a text prompt.
    pub async fn generate_image(
        &self,
        params: GenerateImageToolParams,
    ) -> Result<CallToolResult, McpError> {
        info!(prompt_chars = params.prompt.chars().count(), "Generating image");

        let gen_params: GenerateImageParams = params.into();
        let format = gen_params.format;
        let detail = gen_params.detail;

        let outcome = self
            .handler
            .generate_image(gen_params)
            .await
            .map_err(tool_error_to_mcp)?;

        let rendered = render(&outcome, format, detail).map_err(tool_error_to_mcp)?;
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }

    /// Generate images for a batch of prompts.
    pub async fn generate_image_group(
        &self,
        params: GenerateImageGroupToolParams,
    ) -> Result<CallToolResult, McpError> {
        info!(prompts = params.prompts.len(), "Generating image group");

        let gen_params: GenerateImageGroupParams = params.into();
        let format = gen_params.format;
        let detail = gen_params.detail;

        let outcome = self
            .handler
            .generate_image_group(gen_params)
            .await
            .map_err(tool_error_to_mcp)?;

        let rendered = render(&outcome, format, detail).map_err(tool_error_to_mcp)?;
        Ok(CallToolResult::success(vec![Content::text(rendered)]))
    }
}

impl ServerHandler for SeedreamServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Text-to-image generation server using the Seedream API. \
                 Use generate_image to create one image from a prompt, \
                 and generate_image_group to create images for up to 10 prompts."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _params: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<rmcp::model::ListToolsResult, McpError>> + Send + '_
    {
        async move {
            use rmcp::model::{ListToolsResult, Tool};
            use schemars::schema_for;

            // generate_image tool
            let gen_schema = schema_for!(GenerateImageToolParams);
            let gen_schema_value = serde_json::to_value(&gen_schema).unwrap_or_default();
            let gen_input_schema = match gen_schema_value {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

            // generate_image_group tool
            let group_schema = schema_for!(GenerateImageGroupToolParams);
            let group_schema_value = serde_json::to_value(&group_schema).unwrap_or_default();
            let group_input_schema = match group_schema_value {
                serde_json::Value::Object(map) => Arc::new(map),
                _ => Arc::new(serde_json::Map::new()),
            };

            Ok(ListToolsResult {
                tools: vec![
                    Tool {
                        name: Cow::Borrowed("generate_image"),
                        description: Some(Cow::Borrowed(
                            "Generate one image from a text prompt using the Seedream API. \
                             Returns a remote URL, inline base64 data, or a downloaded local \
                             file path depending on response_format. Watermarking is always \
                             disabled.",
                        )),
                        input_schema: gen_input_schema,
                        annotations: None,
                        icons: None,
                        meta: None,
                        output_schema: None,
                        title: None,
                    },
                    Tool {
                        name: Cow::Borrowed("generate_image_group"),
                        description: Some(Cow::Borrowed(
                            "Generate images for 1-10 text prompts using the Seedream API. \
                             Prompts are processed in order; one prompt's failure never aborts \
                             the rest. Returns per-prompt results with success counts and \
                             aggregate token usage.",
                        )),
                        input_schema: group_input_schema,
                        annotations: None,
                        icons: None,
                        meta: None,
                        output_schema: None,
                        title: None,
                    },
                ],
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        params: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            match params.name.as_ref() {
                "generate_image" => {
                    let tool_params: GenerateImageToolParams = params
                        .arguments
                        .map(|args| serde_json::from_value(serde_json::Value::Object(args)))
                        .transpose()
                        .map_err(|e| {
                            McpError::invalid_params(format!("Invalid parameters: {}", e), None)
                        })?
                        .ok_or_else(|| McpError::invalid_params("Missing parameters", None))?;

                    self.generate_image(tool_params).await
                }
                "generate_image_group" => {
                    let tool_params: GenerateImageGroupToolParams = params
                        .arguments
                        .map(|args| serde_json::from_value(serde_json::Value::Object(args)))
                        .transpose()
                        .map_err(|e| {
                            McpError::invalid_params(format!("Invalid parameters: {}", e), None)
                        })?
                        .ok_or_else(|| McpError::invalid_params("Missing parameters", None))?;

                    self.generate_image_group(tool_params).await
                }
                _ => Err(McpError::invalid_params(
                    format!("Unknown tool: {}", params.name),
                    None,
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_info_advertises_tools() {
        let server = SeedreamServer::new(&Config::default());
        let info = server.get_info();
        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn single_tool_params_defaults() {
        let tool_params = GenerateImageToolParams {
            prompt: "A cat".to_string(),
            size: None,
            response_format: None,
            download_dir: None,
            optimize_prompt: None,
            format: None,
            detail: None,
        };

        let gen_params: GenerateImageParams = tool_params.into();
        assert_eq!(gen_params.size, DEFAULT_IMAGE_SIZE);
        assert_eq!(gen_params.response_format, ResponseFormat::Url);
        assert!(gen_params.optimize_prompt);
        assert_eq!(gen_params.format, OutputFormat::Json);
        assert_eq!(gen_params.detail, DetailLevel::Concise);
    }

    #[test]
    fn group_tool_params_default_to_local_file() {
        let tool_params = GenerateImageGroupToolParams {
            prompts: vec!["a".to_string(), "b".to_string()],
            size: None,
            response_format: None,
            download_dir: None,
            optimize_prompt: None,
            format: None,
            detail: None,
        };

        let gen_params: GenerateImageGroupParams = tool_params.into();
        assert_eq!(gen_params.response_format, ResponseFormat::LocalFile);
        assert_eq!(gen_params.prompts.len(), 2);
    }

    #[test]
    fn tool_params_explicit_values_pass_through() {
        let tool_params = GenerateImageToolParams {
            prompt: "A cat".to_string(),
            size: Some("4K".to_string()),
            response_format: Some(ResponseFormat::B64Json),
            download_dir: Some("/tmp/imgs".to_string()),
            optimize_prompt: Some(false),
            format: Some(OutputFormat::Markdown),
            detail: Some(DetailLevel::Detailed),
        };

        let gen_params: GenerateImageParams = tool_params.into();
        assert_eq!(gen_params.size, "4K");
        assert_eq!(gen_params.response_format, ResponseFormat::B64Json);
        assert_eq!(gen_params.download_dir.as_deref(), Some("/tmp/imgs"));
        assert!(!gen_params.optimize_prompt);
        assert_eq!(gen_params.format, OutputFormat::Markdown);
        assert_eq!(gen_params.detail, DetailLevel::Detailed);
    }

    #[test]
    fn validation_error_maps_to_invalid_params() {
        let err = tool_error_to_mcp(ToolError::validation("prompt: Prompt cannot be empty"));
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);

        let err = tool_error_to_mcp(ToolError::internal("boom"));
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn tool_params_deserialize_from_json_arguments() {
        let tool_params: GenerateImageToolParams = serde_json::from_value(serde_json::json!({
            "prompt": "a sunset over mountains",
            "response_format": "local_file",
            "detail": "detailed"
        }))
        .unwrap();

        assert_eq!(
            tool_params.response_format,
            Some(ResponseFormat::LocalFile)
        );
        assert_eq!(tool_params.detail, Some(DetailLevel::Detailed));
        assert!(tool_params.size.is_none());
    }
}
