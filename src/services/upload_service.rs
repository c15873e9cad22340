use std::path::Path;

use chrono::Utc;
use rand::Rng;
use tokio::fs;

use crate::error::{AppError, AppResult};

pub const MAX_IMAGES: usize = 10;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const PUBLIC_PREFIX: &str = "/uploads";

const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// An image received in a multipart body, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub fn validate(images: &[ImageUpload]) -> AppResult<()> {
    if images.len() > MAX_IMAGES {
        return Err(AppError::bad_request(format!(
            "At most {MAX_IMAGES} images are allowed"
        )));
    }
    for image in images {
        let content_type = image.content_type.as_deref().unwrap_or_default();
        if !ALLOWED_TYPES.contains(&content_type) {
            return Err(AppError::bad_request("Only image files are allowed!"));
        }
        if image.bytes.len() > MAX_IMAGE_BYTES {
            return Err(AppError::bad_request("Image exceeds the 5MB limit"));
        }
    }
    Ok(())
}

/// Writes every image to `upload_dir` and returns their public URLs in order.
/// Nothing is written unless all images pass validation.
pub async fn store_images(upload_dir: &str, images: Vec<ImageUpload>) -> AppResult<Vec<String>> {
    validate(&images)?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        let name = stored_name(image.file_name.as_deref());
        let path = Path::new(upload_dir).join(&name);
        fs::write(&path, &image.bytes)
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
        tracing::debug!(path = %path.display(), bytes = image.bytes.len(), "image stored");
        urls.push(format!("{PUBLIC_PREFIX}/{name}"));
    }
    Ok(urls)
}

/// Deletes files previously returned by [`store_images`]. Failures are only logged.
pub async fn remove_images(upload_dir: &str, urls: &[String]) {
    for url in urls {
        let Some(name) = url.strip_prefix(PUBLIC_PREFIX).and_then(|n| n.strip_prefix('/')) else {
            continue;
        };
        let path = Path::new(upload_dir).join(name);
        if let Err(err) = fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove stored image");
        }
    }
}

fn stored_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{suffix}{ext}", Utc::now().timestamp_millis())
}
