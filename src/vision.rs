//! Image classification collaborators
//!
//! The LLM-backed classifier only reads files under the configured image
//! directory. Every failure is reported as `VisualFinding::error()`.

use crate::llm::{ContentBlock, LlmRequest, LlmService};
use crate::model::VisualFinding;
use crate::runtime::ImageClassifier;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::time::timeout;

/// Maximum image size (5MB)
const MAX_IMAGE_SIZE: u64 = 5 * 1024 * 1024;

const CLASSIFY_PROMPT: &str = r#"You label photos of visible symptoms (skin, eyes, wounds, swelling).
Reply with a single JSON object and nothing else: {"label": "<short finding>", "confidence": <number between 0 and 1>}"#;

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("Invalid JSON object regex"));

#[derive(Debug, Error)]
enum VisionError {
    #[error("path escapes the image directory: {0}")]
    OutsideImageDir(String),
    #[error("not an image file: {0}")]
    Unsupported(String),
    #[error("image too large: {0} bytes")]
    TooLarge(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("model call failed: {0}")]
    Llm(String),
    #[error("model call timed out")]
    Timeout,
    #[error("no label in model reply")]
    Unparseable,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    label: String,
    confidence: f64,
}

/// Sends the image to a vision-capable model
pub struct LlmImageClassifier {
    llm: Arc<dyn LlmService>,
    image_dir: PathBuf,
    deadline: Duration,
}

impl LlmImageClassifier {
    pub fn new(llm: Arc<dyn LlmService>, image_dir: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            llm,
            image_dir: image_dir.into(),
            deadline,
        }
    }

    /// Resolve `path` against the image directory and refuse anything outside it
    async fn resolve(&self, path: &str) -> Result<PathBuf, VisionError> {
        let requested = Path::new(path.trim());
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.image_dir.join(requested)
        };

        let root = fs::canonicalize(&self.image_dir).await?;
        let resolved = fs::canonicalize(&joined).await?;
        if !resolved.starts_with(&root) {
            return Err(VisionError::OutsideImageDir(path.to_string()));
        }
        Ok(resolved)
    }

    async fn load(&self, path: &str) -> Result<(String, String), VisionError> {
        let resolved = self.resolve(path).await?;

        let media_type = mime_guess::from_path(&resolved)
            .first()
            .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .ok_or_else(|| VisionError::Unsupported(path.to_string()))?;

        let metadata = fs::metadata(&resolved).await?;
        if !metadata.is_file() {
            return Err(VisionError::Unsupported(path.to_string()));
        }
        if metadata.len() > MAX_IMAGE_SIZE {
            return Err(VisionError::TooLarge(metadata.len()));
        }

        let data = fs::read(&resolved).await?;
        Ok((media_type.essence_str().to_string(), BASE64.encode(&data)))
    }

    async fn try_classify(&self, path: &str) -> Result<VisualFinding, VisionError> {
        let (media_type, data) = self.load(path).await?;

        let request = LlmRequest::single(
            Some(CLASSIFY_PROMPT.to_string()),
            vec![
                ContentBlock::image(media_type, data),
                ContentBlock::text("Label this image."),
            ],
        )
        .with_max_tokens(100);

        let response = timeout(self.deadline, self.llm.complete(&request))
            .await
            .map_err(|_| VisionError::Timeout)?
            .map_err(|e| VisionError::Llm(e.message))?;

        parse_finding(&response.text()).ok_or(VisionError::Unparseable)
    }
}

/// Pull `{"label", "confidence"}` out of a model reply, tolerating surrounding prose
fn parse_finding(text: &str) -> Option<VisualFinding> {
    let object = JSON_OBJECT.find(text)?;
    let raw: RawFinding = serde_json::from_str(object.as_str()).ok()?;
    let label = raw.label.trim();
    if label.is_empty() {
        return None;
    }
    Some(VisualFinding::new(label, raw.confidence))
}

#[async_trait]
impl ImageClassifier for LlmImageClassifier {
    async fn classify(&self, path: &str) -> VisualFinding {
        match self.try_classify(path).await {
            Ok(finding) => finding,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Image classification failed");
                VisualFinding::error()
            }
        }
    }
}

/// Used when no model is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableImageClassifier;

#[async_trait]
impl ImageClassifier for UnavailableImageClassifier {
    async fn classify(&self, path: &str) -> VisualFinding {
        tracing::debug!(path = %path, "No image classifier configured");
        VisualFinding::error()
    }
}
