//! Generation orchestrator for the Seedream MCP image server.
//!
//! This module provides the `SeedreamHandler` struct and parameter types
//! for single and batched text-to-image generation against the Seedream
//! API. Batch items are processed strictly in sequence, and a single
//! item's failure never aborts its siblings.

use reqwest::Method;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{info, instrument, warn};

use seedream_mcp_common::api::ApiClient;
use seedream_mcp_common::config::Config;
use seedream_mcp_common::download::download_image;
use seedream_mcp_common::error::{Result, ToolError};

/// Model used for all generation requests.
pub const MODEL_ID: &str = "doubao-seedream-4-0-250828";

/// Upstream generation endpoint, relative to the API base URL.
pub const GENERATIONS_ENDPOINT: &str = "api/v3/images/generations";

/// Minimum prompt length in characters.
pub const MIN_PROMPT_CHARS: usize = 1;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 600;

/// Minimum number of prompts in a batch.
pub const MIN_BATCH_PROMPTS: usize = 1;

/// Maximum number of prompts in a batch.
pub const MAX_BATCH_PROMPTS: usize = 10;

/// Default image size descriptor.
pub const DEFAULT_IMAGE_SIZE: &str = "2048x2048";

/// Caller-chosen representation of the generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Remote URL served by the upstream CDN
    #[default]
    Url,
    /// Inline base64-encoded payload
    B64Json,
    /// Downloaded local file; translated to `url` for the upstream call
    LocalFile,
}

/// Output format of the rendered response string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

/// Rendering granularity, independent of format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    #[default]
    Concise,
    Detailed,
}

/// Validation error details for generation parameters.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_prompt(field: &str, prompt: &str, errors: &mut Vec<ValidationError>) {
    let chars = prompt.chars().count();
    if chars < MIN_PROMPT_CHARS {
        errors.push(ValidationError {
            field: field.to_string(),
            message: "Prompt cannot be empty".to_string(),
        });
    } else if chars > MAX_PROMPT_CHARS {
        errors.push(ValidationError {
            field: field.to_string(),
            message: format!(
                "Prompt length {} exceeds maximum of {} characters",
                chars, MAX_PROMPT_CHARS
            ),
        });
    }
}

/// Single-prompt generation parameters.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GenerateImageParams {
    /// Text prompt describing the image (1-600 characters).
    pub prompt: String,

    /// Image size descriptor, e.g. "2048x2048" or a tier token like
    /// "1K"/"2K"/"4K".
    pub size: String,

    /// Representation of the generated image in the result.
    pub response_format: ResponseFormat,

    /// Target directory for downloads when `response_format` is
    /// `local_file`. Falls back to the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,

    /// Whether the upstream should optimize the prompt.
    pub optimize_prompt: bool,

    /// Output format of the rendered response.
    pub format: OutputFormat,

    /// Rendering granularity.
    pub detail: DetailLevel,
}

impl GenerateImageParams {
    /// Validate the parameters. Bounds are enforced before any network
    /// call is made.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        check_prompt("prompt", &self.prompt, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Batched generation parameters. All prompts share the remaining fields.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GenerateImageGroupParams {
    /// Ordered prompts, 1-10 entries, each 1-600 characters.
    pub prompts: Vec<String>,

    /// Image size descriptor shared by all prompts.
    pub size: String,

    /// Representation of the generated images in the result.
    pub response_format: ResponseFormat,

    /// Target directory for downloads when `response_format` is
    /// `local_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,

    /// Whether the upstream should optimize the prompts.
    pub optimize_prompt: bool,

    /// Output format of the rendered response.
    pub format: OutputFormat,

    /// Rendering granularity.
    pub detail: DetailLevel,
}

impl GenerateImageGroupParams {
    /// Validate the parameters. A single out-of-bounds prompt rejects the
    /// whole batch before any API call is made.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.prompts.len() < MIN_BATCH_PROMPTS {
            errors.push(ValidationError {
                field: "prompts".to_string(),
                message: "At least one prompt is required".to_string(),
            });
        } else if self.prompts.len() > MAX_BATCH_PROMPTS {
            errors.push(ValidationError {
                field: "prompts".to_string(),
                message: format!(
                    "At most {} prompts are allowed, got {}",
                    MAX_BATCH_PROMPTS,
                    self.prompts.len()
                ),
            });
        }

        for (i, prompt) in self.prompts.iter().enumerate() {
            check_prompt(&format!("prompts[{}]", i), prompt, &mut errors);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Result of a single-prompt generation.
#[derive(Debug, Clone, Serialize)]
pub struct SingleImageResult {
    /// Whether generation succeeded
    pub success: bool,
    /// Remote URL of the generated image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Inline base64 payload (b64_json representation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_b64: Option<String>,
    /// Requested size descriptor
    pub image_size: String,
    /// Tokens consumed by the upstream call
    pub token_usage: u64,
    /// RFC3339 creation timestamp
    pub created_at: String,
    /// Model identifier used for generation
    pub model_used: String,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: u64,
    /// Always false; watermarking is forced off
    pub watermark: bool,
    /// Absolute path of the downloaded file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    /// Whether the download side-path succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<bool>,
    /// Download failure detail; never fails the overall call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_error: Option<String>,
}

/// One prompt's outcome within a batch. Success and failure are
/// independent per item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchImageItem {
    /// Zero-based position in the batch
    pub index: usize,
    /// The prompt that produced this item
    pub prompt: String,
    /// Whether generation of this item succeeded
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_b64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_error: Option<String>,
    /// Generation failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchImageItem {
    fn succeeded(
        index: usize,
        prompt: &str,
        image_url: Option<String>,
        image_b64: Option<String>,
        size: &str,
        tokens: u64,
    ) -> Self {
        Self {
            index,
            prompt: prompt.to_string(),
            success: true,
            image_url,
            image_b64,
            image_size: Some(size.to_string()),
            token_usage: Some(tokens),
            watermark: Some(false),
            local_path: None,
            downloaded: None,
            download_error: None,
            error: None,
        }
    }

    fn failed(index: usize, prompt: &str, error: String) -> Self {
        Self {
            index,
            prompt: prompt.to_string(),
            success: false,
            image_url: None,
            image_b64: None,
            image_size: None,
            token_usage: None,
            watermark: None,
            local_path: None,
            downloaded: None,
            download_error: None,
            error: Some(error),
        }
    }
}

/// Aggregated result of a batched generation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchImageResult {
    /// True when at least one item succeeded
    pub success: bool,
    /// Number of prompts attempted
    pub total_images: usize,
    /// Number of items that generated successfully
    pub successful_images: usize,
    /// Per-item results, in prompt order
    pub images: Vec<BatchImageItem>,
    /// Summed token usage across successful items
    pub total_token_usage: u64,
    /// RFC3339 creation timestamp
    pub created_at: String,
    /// Model identifier used for generation
    pub model_used: String,
    /// Wall-clock duration of the whole batch in milliseconds
    pub processing_time_ms: u64,
    /// "Downloaded X/Y images" summary; local-file mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_summary: Option<String>,
    /// Target download directory; local-file mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
}

/// Tagged result shape, decided once at orchestration time and carried
/// explicitly through the response shaper.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Single(SingleImageResult),
    Batch(BatchImageResult),
    /// Escape hatch for results that are neither single nor batch shaped;
    /// the shaper applies a fixed field allow-list to these.
    Generic(Value),
}

/// Relevant fields of one upstream generation response.
struct UpstreamImage {
    url: Option<String>,
    b64: Option<String>,
    tokens: u64,
}

/// Image generation handler.
///
/// Drives single and batched generation against the Seedream API and the
/// download side-path. The default download directory is threaded in at
/// construction, never read from the environment at call time.
pub struct SeedreamHandler {
    api: ApiClient,
    default_download_dir: String,
}

impl SeedreamHandler {
    /// Create a handler from the loaded configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            api: ApiClient::new(config),
            default_download_dir: config.default_download_dir.clone(),
        }
    }

    /// Create a handler with a provided client (used by tests to point at
    /// a mock upstream).
    pub fn with_client(api: ApiClient, default_download_dir: impl Into<String>) -> Self {
        Self {
            api,
            default_download_dir: default_download_dir.into(),
        }
    }

    /// Build the upstream request payload for one prompt.
    ///
    /// Watermarking is always forced off. The upstream has no native
    /// local-file mode, so `local_file` is translated to `url` and the
    /// download happens as a side-path here.
    fn build_payload(
        prompt: &str,
        size: &str,
        response_format: ResponseFormat,
        optimize_prompt: bool,
    ) -> Value {
        let upstream_format = match response_format {
            ResponseFormat::B64Json => "b64_json",
            ResponseFormat::Url | ResponseFormat::LocalFile => "url",
        };
        json!({
            "model": MODEL_ID,
            "prompt": prompt,
            "size": size,
            "response_format": upstream_format,
            "watermark": false,
            "optimize_prompt": optimize_prompt,
        })
    }

    /// Issue one generation call and pull out the fields we care about.
    async fn call_generation(&self, payload: &Value) -> Result<UpstreamImage> {
        let response = self
            .api
            .call_api(GENERATIONS_ENDPOINT, Method::POST, None, Some(payload))
            .await?;

        let first = response.get("data").and_then(|d| d.get(0));
        let url = first
            .and_then(|d| d.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let b64 = first
            .and_then(|d| d.get("b64_json"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let tokens = response
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(UpstreamImage { url, b64, tokens })
    }

    fn download_dir<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.default_download_dir)
    }

    /// Generate one image from a text prompt.
    ///
    /// In `local_file` mode the image is additionally downloaded; a
    /// download failure is recorded on the result (`downloaded=false`,
    /// `download_error`) while the URL-based result is still returned.
    ///
    /// # Errors
    /// Validation errors abort before any network attempt; transport and
    /// upstream errors propagate unchanged.
    #[instrument(level = "info", name = "generate_image", skip(self, params), fields(size = %params.size))]
    pub async fn generate_image(&self, params: GenerateImageParams) -> Result<GenerationOutcome> {
        params.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ToolError::validation(messages.join("; "))
        })?;

        let start = Instant::now();
        let payload = Self::build_payload(
            &params.prompt,
            &params.size,
            params.response_format,
            params.optimize_prompt,
        );
        let upstream = self.call_generation(&payload).await?;

        info!(tokens = upstream.tokens, "Generated image");

        let mut result = SingleImageResult {
            success: true,
            image_url: upstream.url.clone(),
            image_b64: upstream.b64,
            image_size: params.size.clone(),
            token_usage: upstream.tokens,
            created_at: chrono::Utc::now().to_rfc3339(),
            model_used: MODEL_ID.to_string(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            watermark: false,
            local_path: None,
            downloaded: None,
            download_error: None,
        };

        if params.response_format == ResponseFormat::LocalFile {
            if let Some(url) = &upstream.url {
                let dir = self.download_dir(params.download_dir.as_deref());
                match download_image(&self.api, url, dir).await {
                    Ok(path) => {
                        result.local_path = Some(path.display().to_string());
                        result.downloaded = Some(true);
                    }
                    Err(e) => {
                        warn!(error = %e, "Image download failed");
                        result.downloaded = Some(false);
                        result.download_error = Some(e.to_string());
                    }
                }
            }
        }

        Ok(GenerationOutcome::Single(result))
    }

    /// Generate images for a batch of prompts, strictly in sequence.
    ///
    /// Each item's generation or download failure is caught and recorded
    /// on the item; it never aborts the remaining items. The outer error
    /// path only fires for validation failures raised before iteration
    /// begins.
    #[instrument(level = "info", name = "generate_image_group", skip(self, params), fields(prompts = params.prompts.len()))]
    pub async fn generate_image_group(
        &self,
        params: GenerateImageGroupParams,
    ) -> Result<GenerationOutcome> {
        params.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ToolError::validation(messages.join("; "))
        })?;

        let start = Instant::now();
        let local_file = params.response_format == ResponseFormat::LocalFile;
        let dir = self.download_dir(params.download_dir.as_deref()).to_string();

        let mut images: Vec<BatchImageItem> = Vec::with_capacity(params.prompts.len());
        let mut total_tokens = 0u64;

        for (index, prompt) in params.prompts.iter().enumerate() {
            let payload = Self::build_payload(
                prompt,
                &params.size,
                params.response_format,
                params.optimize_prompt,
            );

            match self.call_generation(&payload).await {
                Ok(upstream) => {
                    total_tokens += upstream.tokens;
                    let mut item = BatchImageItem::succeeded(
                        index,
                        prompt,
                        upstream.url.clone(),
                        upstream.b64,
                        &params.size,
                        upstream.tokens,
                    );

                    if local_file {
                        if let Some(url) = &upstream.url {
                            match download_image(&self.api, url, &dir).await {
                                Ok(path) => {
                                    item.local_path = Some(path.display().to_string());
                                    item.downloaded = Some(true);
                                }
                                Err(e) => {
                                    warn!(index, error = %e, "Batch item download failed");
                                    item.downloaded = Some(false);
                                    item.download_error = Some(e.to_string());
                                }
                            }
                        }
                    }

                    images.push(item);
                }
                Err(e) => {
                    warn!(index, error = %e, "Batch item generation failed");
                    images.push(BatchImageItem::failed(index, prompt, e.to_string()));
                }
            }
        }

        let total_images = params.prompts.len();
        let successful_images = images.iter().filter(|i| i.success).count();
        let downloaded_count = images
            .iter()
            .filter(|i| i.downloaded == Some(true))
            .count();

        info!(
            total = total_images,
            successful = successful_images,
            "Batch generation finished"
        );

        let mut result = BatchImageResult {
            success: successful_images > 0,
            total_images,
            successful_images,
            images,
            total_token_usage: total_tokens,
            created_at: chrono::Utc::now().to_rfc3339(),
            model_used: MODEL_ID.to_string(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            download_summary: None,
            download_dir: None,
        };

        if local_file {
            result.download_summary = Some(format!(
                "Downloaded {}/{} images",
                downloaded_count, total_images
            ));
            result.download_dir = Some(dir);
        }

        Ok(GenerationOutcome::Batch(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_params(prompt: &str) -> GenerateImageParams {
        GenerateImageParams {
            prompt: prompt.to_string(),
            size: DEFAULT_IMAGE_SIZE.to_string(),
            response_format: ResponseFormat::Url,
            download_dir: None,
            optimize_prompt: true,
            format: OutputFormat::Json,
            detail: DetailLevel::Concise,
        }
    }

    fn group_params(prompts: Vec<&str>) -> GenerateImageGroupParams {
        GenerateImageGroupParams {
            prompts: prompts.into_iter().map(str::to_string).collect(),
            size: DEFAULT_IMAGE_SIZE.to_string(),
            response_format: ResponseFormat::Url,
            download_dir: None,
            optimize_prompt: true,
            format: OutputFormat::Json,
            detail: DetailLevel::Concise,
        }
    }

    #[test]
    fn prompt_bounds_are_inclusive() {
        assert!(single_params("a").validate().is_ok());
        assert!(single_params(&"a".repeat(600)).validate().is_ok());

        let errors = single_params("").validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "prompt"));

        let errors = single_params(&"a".repeat(601)).validate().unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("601")));
    }

    #[test]
    fn prompt_length_counts_characters_not_bytes() {
        // 600 multi-byte characters are within bounds.
        let prompt = "猫".repeat(600);
        assert!(single_params(&prompt).validate().is_ok());
        assert!(single_params(&"猫".repeat(601)).validate().is_err());
    }

    #[test]
    fn batch_size_bounds() {
        assert!(group_params(vec!["a"]).validate().is_ok());
        assert!(group_params(vec!["a"; 10]).validate().is_ok());

        let errors = group_params(vec![]).validate().unwrap_err();
        assert!(errors.iter().any(|e| e.field == "prompts"));

        let errors = group_params(vec!["a"; 11]).validate().unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("10")));
    }

    #[test]
    fn one_bad_prompt_rejects_the_whole_batch() {
        let long = "a".repeat(601);
        let errors = group_params(vec!["ok", &long, "also ok"])
            .validate()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "prompts[1]");
    }

    #[test]
    fn payload_forces_watermark_off_and_translates_local_file() {
        let payload = SeedreamHandler::build_payload(
            "a cat",
            "2048x2048",
            ResponseFormat::LocalFile,
            true,
        );
        assert_eq!(payload["model"], MODEL_ID);
        assert_eq!(payload["watermark"], false);
        assert_eq!(payload["response_format"], "url");
        assert_eq!(payload["optimize_prompt"], true);

        let payload =
            SeedreamHandler::build_payload("a cat", "1K", ResponseFormat::B64Json, false);
        assert_eq!(payload["response_format"], "b64_json");
        assert_eq!(payload["size"], "1K");
    }

    #[test]
    fn response_format_serde_names() {
        assert_eq!(
            serde_json::to_string(&ResponseFormat::B64Json).unwrap(),
            "\"b64_json\""
        );
        assert_eq!(
            serde_json::from_str::<ResponseFormat>("\"local_file\"").unwrap(),
            ResponseFormat::LocalFile
        );
        assert_eq!(
            serde_json::from_str::<DetailLevel>("\"detailed\"").unwrap(),
            DetailLevel::Detailed
        );
        assert_eq!(
            serde_json::from_str::<OutputFormat>("\"markdown\"").unwrap(),
            OutputFormat::Markdown
        );
    }

    #[test]
    fn failed_batch_item_serializes_without_success_fields() {
        let item = BatchImageItem::failed(2, "broken", "Error: boom".to_string());
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["index"], 2);
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Error: boom");
        assert!(value.get("image_url").is_none());
        assert!(value.get("token_usage").is_none());
    }

    #[test]
    fn succeeded_batch_item_carries_usage_and_watermark() {
        let item = BatchImageItem::succeeded(
            0,
            "a cat",
            Some("https://cdn.example.com/cat.jpg".to_string()),
            None,
            "2K",
            42,
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["token_usage"], 42);
        assert_eq!(value["watermark"], false);
        assert!(value.get("error").is_none());
    }
}
