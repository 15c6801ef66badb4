//! Image download side-path.
//!
//! Writes a fetched image into a caller-chosen directory under a
//! collision-resistant name and returns the absolute path. Generation
//! callers treat failures here as non-fatal; classification happens in
//! [`ToolError::from_io`].

use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::info;

use crate::api::ApiClient;
use crate::error::{Result, ToolError};

/// Fixed extension; the upstream always serves JPEG images.
const IMAGE_EXTENSION: &str = "jpg";

/// Synthesize a collision-resistant filename from the current epoch
/// second and a four-digit random suffix.
pub fn unique_filename() -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let suffix: u32 = rand::rng().random_range(1000..10000);
    format!("seedream_image_{}_{}.{}", timestamp, suffix, IMAGE_EXTENSION)
}

/// Download an image to the given directory and return its absolute path.
///
/// The directory is created recursively if it does not exist. Two
/// concurrent calls targeting the same directory produce independently
/// named files.
///
/// # Errors
/// - `Permission` / `DiskSpace` / `Download` for filesystem failures
/// - `Network` / `Upstream` for fetch failures
pub async fn download_image(client: &ApiClient, url: &str, dir: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ToolError::from_io(&e))?;

    let path = Path::new(dir).join(unique_filename());

    let bytes = client.fetch_bytes(url).await?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ToolError::from_io(&e))?;

    let absolute = std::path::absolute(&path).map_err(|e| ToolError::from_io(&e))?;
    info!(path = %absolute.display(), bytes = bytes.len(), "Downloaded image");
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_follow_the_expected_pattern() {
        let name = unique_filename();
        assert!(name.starts_with("seedream_image_"));
        assert!(name.ends_with(".jpg"));

        let stem = name
            .strip_prefix("seedream_image_")
            .and_then(|s| s.strip_suffix(".jpg"))
            .unwrap();
        let (timestamp, suffix) = stem.split_once('_').unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        let suffix: u32 = suffix.parse().unwrap();
        assert!((1000..10000).contains(&suffix));
    }

    #[test]
    fn consecutive_filenames_rarely_collide() {
        let names: std::collections::HashSet<String> =
            (0..50).map(|_| unique_filename()).collect();
        // 50 draws from a 9000-value space within one second may collide,
        // but most must be distinct.
        assert!(names.len() > 25);
    }
}
