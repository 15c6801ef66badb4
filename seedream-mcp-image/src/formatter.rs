//! Response shaper.
//!
//! Renders a `GenerationOutcome` into one of four fixed representations
//! (json/markdown x concise/detailed) and enforces a character ceiling
//! with a deterministic continuation notice. The rendering branch is
//! selected from the outcome tag, never by sniffing field presence.

use serde_json::{Map, Value, json};

use seedream_mcp_common::error::{Result, ToolError};

use crate::handler::{BatchImageResult, DetailLevel, GenerationOutcome, OutputFormat, SingleImageResult};

/// Maximum rendered output size in characters (~25k tokens).
pub const CHARACTER_LIMIT: usize = 100_000;

/// Number of batch items shown in concise markdown before eliding.
const CONCISE_MARKDOWN_ITEMS: usize = 3;

const TRUNCATION_NOTICE: &str = "\n\n... [Response truncated due to length]\n\nTo get complete info:\n1. Use more specific filters\n2. Request smaller batches\n3. Use 'concise' detail level";

/// Render an outcome in the requested format and detail level.
///
/// The output never exceeds `CHARACTER_LIMIT` characters plus the fixed
/// continuation notice, regardless of format and detail.
pub fn render(
    outcome: &GenerationOutcome,
    format: OutputFormat,
    detail: DetailLevel,
) -> Result<String> {
    let rendered = match (format, detail) {
        (OutputFormat::Json, DetailLevel::Concise) => to_pretty_json(&concise_value(outcome))?,
        (OutputFormat::Json, DetailLevel::Detailed) => to_pretty_json(&full_value(outcome)?)?,
        (OutputFormat::Markdown, DetailLevel::Concise) => markdown_concise(outcome),
        (OutputFormat::Markdown, DetailLevel::Detailed) => markdown_detailed(outcome)?,
    };

    Ok(truncate_response(rendered))
}

fn to_pretty_json(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ToolError::internal(format!("Failed to serialize response: {e}")))
}

fn full_value(outcome: &GenerationOutcome) -> Result<Value> {
    let value = match outcome {
        GenerationOutcome::Single(result) => serde_json::to_value(result),
        GenerationOutcome::Batch(result) => serde_json::to_value(result),
        GenerationOutcome::Generic(value) => return Ok(value.clone()),
    };
    value.map_err(|e| ToolError::internal(format!("Failed to serialize response: {e}")))
}

/// Extract the concise field subset for JSON rendering.
fn concise_value(outcome: &GenerationOutcome) -> Value {
    match outcome {
        GenerationOutcome::Single(result) => concise_single(result),
        GenerationOutcome::Batch(result) => concise_batch(result),
        GenerationOutcome::Generic(value) => concise_generic(value),
    }
}

fn concise_single(result: &SingleImageResult) -> Value {
    let mut out = Map::new();
    out.insert("success".to_string(), json!(result.success));
    out.insert("token_usage".to_string(), json!(result.token_usage));

    // Prefer the local path once a download succeeded.
    if result.downloaded == Some(true) {
        if let Some(path) = &result.local_path {
            out.insert("downloaded".to_string(), json!(true));
            out.insert("local_path".to_string(), json!(path));
            return Value::Object(out);
        }
    }
    if let Some(url) = &result.image_url {
        out.insert("image_url".to_string(), json!(url));
    }
    Value::Object(out)
}

fn concise_batch(result: &BatchImageResult) -> Value {
    let mut out = Map::new();
    out.insert("success".to_string(), json!(result.success));
    out.insert("total_images".to_string(), json!(result.total_images));
    out.insert("token_usage".to_string(), json!(result.total_token_usage));

    let downloaded: Vec<&str> = result
        .images
        .iter()
        .filter(|img| img.downloaded == Some(true))
        .filter_map(|img| img.local_path.as_deref())
        .collect();

    if !downloaded.is_empty() {
        out.insert("downloaded_images".to_string(), json!(downloaded.len()));
        out.insert("downloaded_paths".to_string(), json!(downloaded));
    } else {
        let urls: Vec<Option<&str>> = result
            .images
            .iter()
            .map(|img| img.image_url.as_deref())
            .collect();
        out.insert("image_urls".to_string(), json!(urls));
    }
    Value::Object(out)
}

/// Fixed allow-list for result shapes that are neither single nor batch.
fn concise_generic(value: &Value) -> Value {
    let Some(map) = value.as_object() else {
        return value.clone();
    };

    let mut out = Map::new();
    for key in ["success", "message", "error", "token_usage"] {
        if let Some(v) = map.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    if let Some(downloaded) = map.get("downloaded") {
        out.insert("downloaded".to_string(), downloaded.clone());
        if let Some(path) = map.get("local_path") {
            out.insert("local_path".to_string(), path.clone());
        }
    }
    Value::Object(out)
}

fn markdown_concise(outcome: &GenerationOutcome) -> String {
    match outcome {
        GenerationOutcome::Single(result) => {
            let mut lines = vec!["# Image Generation Result".to_string(), String::new()];
            if result.downloaded == Some(true) && result.local_path.is_some() {
                lines.push("## Image downloaded".to_string());
                if let Some(path) = &result.local_path {
                    lines.push(format!("- Local path: {path}"));
                }
                if let Some(url) = &result.image_url {
                    lines.push(format!("- Source URL: {url}"));
                }
            } else {
                lines.push("## Image URL".to_string());
                lines.push(result.image_url.clone().unwrap_or_default());
            }
            lines.join("\n")
        }
        GenerationOutcome::Batch(result) => {
            let mut lines = vec!["# Image Generation Result".to_string(), String::new()];
            lines.push(format!("## Generated {} images", result.images.len()));
            for img in result.images.iter().take(CONCISE_MARKDOWN_ITEMS) {
                lines.push(format!("### Image {}", img.index + 1));
                if img.downloaded == Some(true) && img.local_path.is_some() {
                    lines.push("Downloaded successfully".to_string());
                    if let Some(path) = &img.local_path {
                        lines.push(format!("- Local path: {path}"));
                    }
                    if let Some(url) = &img.image_url {
                        lines.push(format!("- Source URL: {url}"));
                    }
                } else if let Some(error) = &img.error {
                    lines.push(format!("- Error: {error}"));
                } else {
                    lines.push(format!(
                        "- URL: {}",
                        img.image_url.as_deref().unwrap_or_default()
                    ));
                }
            }
            if result.images.len() > CONCISE_MARKDOWN_ITEMS {
                lines.push(format!(
                    "\n... {} more images",
                    result.images.len() - CONCISE_MARKDOWN_ITEMS
                ));
            }
            lines.join("\n")
        }
        GenerationOutcome::Generic(value) => {
            let mut lines = vec!["# Operation Result".to_string(), String::new()];
            if let Some(map) = concise_generic(value).as_object() {
                for (k, v) in map {
                    lines.push(format!("- **{k}**: {}", display_value(v)));
                }
            }
            lines.join("\n")
        }
    }
}

fn markdown_detailed(outcome: &GenerationOutcome) -> Result<String> {
    let rendered = match outcome {
        GenerationOutcome::Single(result) => {
            let mut lines = vec![
                "# Image Generation Details".to_string(),
                String::new(),
                "## Image".to_string(),
            ];
            if result.downloaded == Some(true) && result.local_path.is_some() {
                lines.push("**Downloaded successfully**".to_string());
                if let Some(path) = &result.local_path {
                    lines.push(format!("- **Local path**: {path}"));
                }
                if let Some(url) = &result.image_url {
                    lines.push(format!("- **Source URL**: {url}"));
                }
            } else {
                lines.push(format!(
                    "- **URL**: {}",
                    result.image_url.as_deref().unwrap_or_default()
                ));
            }
            lines.push(format!("- **Size**: {}", result.image_size));
            lines.push(format!(
                "- **Watermark**: {}",
                if result.watermark { "yes" } else { "no" }
            ));
            lines.push(format!("- **Token usage**: {}", result.token_usage));
            lines.push(format!("- **Created at**: {}", result.created_at));
            lines.push(format!("- **Model**: {}", result.model_used));
            lines.push(format!(
                "- **Processing time**: {} ms",
                result.processing_time_ms
            ));
            if result.downloaded == Some(false) {
                if let Some(error) = &result.download_error {
                    lines.push(format!("- **Download error**: {error}"));
                }
            }
            lines.join("\n")
        }
        GenerationOutcome::Batch(result) => {
            let mut lines = vec![
                "# Image Generation Details".to_string(),
                String::new(),
                "## Summary".to_string(),
            ];
            lines.push(format!("- **Total images**: {}", result.total_images));
            lines.push(format!(
                "- **Successful images**: {}",
                result.successful_images
            ));
            lines.push(format!("- **Token usage**: {}", result.total_token_usage));
            lines.push(format!("- **Created at**: {}", result.created_at));
            lines.push(format!("- **Model**: {}", result.model_used));
            lines.push(format!(
                "- **Processing time**: {} ms",
                result.processing_time_ms
            ));
            let downloaded = result
                .images
                .iter()
                .filter(|img| img.downloaded == Some(true))
                .count();
            if downloaded > 0 {
                lines.push(format!("- **Downloaded images**: {downloaded}"));
            }
            if let Some(dir) = &result.download_dir {
                lines.push(format!("- **Download directory**: {dir}"));
            }

            lines.push("\n## Images".to_string());
            for img in &result.images {
                lines.push(format!("### Image {}", img.index + 1));
                lines.push(format!("- **Prompt**: {}", img.prompt));
                if !img.success {
                    lines.push(format!(
                        "- **Error**: {}",
                        img.error.as_deref().unwrap_or_default()
                    ));
                    continue;
                }
                if img.downloaded == Some(true) && img.local_path.is_some() {
                    lines.push("**Downloaded successfully**".to_string());
                    if let Some(path) = &img.local_path {
                        lines.push(format!("- **Local path**: {path}"));
                    }
                    if let Some(url) = &img.image_url {
                        lines.push(format!("- **Source URL**: {url}"));
                    }
                } else {
                    lines.push(format!(
                        "- **URL**: {}",
                        img.image_url.as_deref().unwrap_or_default()
                    ));
                }
                if let Some(size) = &img.image_size {
                    lines.push(format!("- **Size**: {size}"));
                }
                if let Some(watermark) = img.watermark {
                    lines.push(format!(
                        "- **Watermark**: {}",
                        if watermark { "yes" } else { "no" }
                    ));
                }
                if img.downloaded == Some(false) {
                    if let Some(error) = &img.download_error {
                        lines.push(format!("- **Download error**: {error}"));
                    }
                }
            }
            lines.join("\n")
        }
        GenerationOutcome::Generic(value) => {
            let Some(map) = value.as_object() else {
                return to_pretty_json(value);
            };
            let mut lines = vec!["# Operation Details".to_string(), String::new()];
            for (k, v) in map {
                lines.push(format!("- **{k}**: {}", display_value(v)));
            }
            lines.join("\n")
        }
    };
    Ok(rendered)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Hard-truncate at the character ceiling and append the continuation
/// notice. Counting is in characters so a multi-byte boundary is never
/// split.
fn truncate_response(text: String) -> String {
    if text.chars().count() <= CHARACTER_LIMIT {
        return text;
    }
    let truncated: String = text.chars().take(CHARACTER_LIMIT).collect();
    format!("{truncated}{TRUNCATION_NOTICE}")
}
